//! Discord platform adapter using the Bot REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use herald_core::secrets::BotToken;
use herald_core::types::{
    Attachment, ChannelId, ControlKind, MessageId, RoleId, SourceMessage, UserId,
};

use crate::events::Activation;
use crate::traits::{
    ChannelInfo, ControlRow, MessageDraft, Platform, PlatformError, PostedMessage,
};

mod gateway;

pub use gateway::DiscordGateway;

pub(crate) const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Ephemeral flag on interaction responses (visible only to the actor).
const EPHEMERAL: u64 = 1 << 6;

/// Button style constants.
mod button_style {
    /// Green "go" button.
    pub(super) const SUCCESS: u8 = 3;
    /// Red "stop" button.
    pub(super) const DANGER: u8 = 4;
}

/// Discord platform adapter.
pub struct DiscordPlatform {
    client: Client,
    token: BotToken,
}

impl DiscordPlatform {
    /// Create a new Discord platform handle.
    #[must_use]
    pub fn new(token: BotToken) -> Self {
        Self {
            client: Client::new(),
            token,
        }
    }

    /// Call a Discord API endpoint.
    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, PlatformError> {
        let url = format!("{DISCORD_API_BASE}{endpoint}");

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token.expose()))
            .header("Content-Type", "application/json");

        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check_status(endpoint, &response)?;

        response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))
    }

    /// Call Discord API without expecting a response body.
    async fn call_no_response(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&impl Serialize>,
    ) -> Result<(), PlatformError> {
        let url = format!("{DISCORD_API_BASE}{endpoint}");

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token.expose()))
            .header("Content-Type", "application/json");

        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        Self::check_status(endpoint, &response)
    }

    /// Map an unsuccessful HTTP status to a `PlatformError`.
    fn check_status(endpoint: &str, response: &reqwest::Response) -> Result<(), PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 | 403 => Err(PlatformError::AuthFailed(format!("{status} on {endpoint}"))),
            404 => Err(PlatformError::NotFound(endpoint.to_string())),
            429 => Err(PlatformError::RateLimited),
            _ => Err(PlatformError::Network(format!("{status} on {endpoint}"))),
        }
    }

    /// Fetch the bot's own user (connectivity probe).
    ///
    /// # Errors
    ///
    /// Returns error if the token is rejected or the request fails.
    pub async fn current_user(&self) -> Result<DiscordUser, PlatformError> {
        self.call(reqwest::Method::GET, "/users/@me", None::<&()>)
            .await
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        draft: MessageDraft,
    ) -> Result<PostedMessage, PlatformError> {
        let endpoint = format!("/channels/{channel}/messages");
        let params = build_message_params(&draft);

        let result: DiscordMessage = self
            .call(reqwest::Method::POST, &endpoint, Some(&params))
            .await?;

        Ok(PostedMessage {
            channel_id: channel.clone(),
            message_id: MessageId::new(result.id),
        })
    }

    async fn edit_controls(
        &self,
        message: &PostedMessage,
        controls: ControlRow,
    ) -> Result<(), PlatformError> {
        let endpoint = format!(
            "/channels/{}/messages/{}",
            message.channel_id, message.message_id
        );
        let params = EditMessageParams {
            components: vec![control_row(controls.enabled)],
        };

        let _edited: DiscordMessage = self
            .call(reqwest::Method::PATCH, &endpoint, Some(&params))
            .await?;
        Ok(())
    }

    async fn fetch_channel(&self, id: &ChannelId) -> Result<ChannelInfo, PlatformError> {
        let endpoint = format!("/channels/{id}");

        let channel: DiscordChannel = self
            .call(reqwest::Method::GET, &endpoint, None::<&()>)
            .await
            .map_err(|e| match e {
                PlatformError::NotFound(_) => PlatformError::ChannelNotFound(id.to_string()),
                other => other,
            })?;

        Ok(ChannelInfo {
            id: ChannelId::new(channel.id),
            name: channel.name,
        })
    }

    async fn actor_has_role(
        &self,
        activation: &Activation,
        role: &RoleId,
    ) -> Result<bool, PlatformError> {
        // Interaction payloads carry the member's role list; the REST
        // lookup is only needed for payloads that omit it.
        if !activation.member_roles.is_empty() {
            return Ok(activation.member_roles.contains(role));
        }

        let Some(guild_id) = &activation.guild_id else {
            return Ok(false);
        };

        let endpoint = format!("/guilds/{guild_id}/members/{}", activation.user_id);
        let member: DiscordMember = self
            .call(reqwest::Method::GET, &endpoint, None::<&()>)
            .await?;

        Ok(member.roles.iter().any(|r| r == role.as_ref()))
    }

    async fn reply(
        &self,
        activation: &Activation,
        content: &str,
        private: bool,
    ) -> Result<(), PlatformError> {
        let endpoint = format!(
            "/interactions/{}/{}/callback",
            activation.id, activation.token
        );
        let params = InteractionCallback {
            kind: 4, // CHANNEL_MESSAGE_WITH_SOURCE
            data: InteractionCallbackData {
                content: content.to_string(),
                flags: if private { EPHEMERAL } else { 0 },
            },
        };

        self.call_no_response(reqwest::Method::POST, &endpoint, Some(&params))
            .await
    }
}

/// Build the Announce/Cancel action row.
pub(crate) fn control_row(enabled: bool) -> ActionRow {
    ActionRow {
        kind: 1,
        components: vec![
            ButtonComponent {
                kind: 2,
                style: button_style::SUCCESS,
                label: "Announce".to_string(),
                custom_id: ControlKind::Announce.custom_id().to_string(),
                disabled: !enabled,
            },
            ButtonComponent {
                kind: 2,
                style: button_style::DANGER,
                label: "Cancel".to_string(),
                custom_id: ControlKind::Cancel.custom_id().to_string(),
                disabled: !enabled,
            },
        ],
    }
}

/// Build create-message params from a draft.
///
/// Image and video attachments become URL embeds; anything else is
/// appended to the content as a `filename: url` line so nothing is
/// re-uploaded.
fn build_message_params(draft: &MessageDraft) -> CreateMessageParams {
    let mut content = draft.content.clone();
    let mut embeds = Vec::new();

    for attachment in &draft.attachments {
        if attachment.is_image() {
            embeds.push(DiscordEmbed {
                image: Some(EmbedMedia {
                    url: attachment.url.clone(),
                }),
                video: None,
            });
        } else if attachment.is_video() {
            embeds.push(DiscordEmbed {
                image: None,
                video: Some(EmbedMedia {
                    url: attachment.url.clone(),
                }),
            });
        } else {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(&attachment.filename);
            content.push_str(": ");
            content.push_str(&attachment.url);
        }
    }

    CreateMessageParams {
        content,
        embeds: if embeds.is_empty() {
            None
        } else {
            Some(embeds)
        },
        components: draft
            .controls
            .map(|row| vec![control_row(row.enabled)]),
        allowed_mentions: AllowedMentions::default(),
    }
}

/// Normalize a wire message into a [`SourceMessage`].
pub(crate) fn normalize_message(msg: DiscordMessage) -> Result<SourceMessage, PlatformError> {
    let author = msg
        .author
        .ok_or_else(|| PlatformError::Protocol("message without author".to_string()))?;

    let timestamp = msg
        .timestamp
        .as_deref()
        .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
        .map_or_else(chrono::Utc::now, |dt| dt.with_timezone(&chrono::Utc));

    let attachments = msg
        .attachments
        .unwrap_or_default()
        .into_iter()
        .map(|a| Attachment {
            url: a.url,
            filename: a.filename,
            mime_type: a.content_type,
            size: a.size.and_then(|s| u64::try_from(s).ok()),
        })
        .collect();

    Ok(SourceMessage {
        id: MessageId::new(msg.id),
        channel_id: ChannelId::new(msg.channel_id),
        author_id: UserId::new(author.id),
        author_name: author.username,
        author_is_bot: author.bot,
        content: msg.content.unwrap_or_default(),
        attachments,
        timestamp,
    })
}

/// Normalize a component interaction into an [`Activation`].
///
/// Returns `None` for non-component interactions and unknown custom IDs.
pub(crate) fn normalize_interaction(ix: DiscordInteraction) -> Option<Activation> {
    // 3 = MESSAGE_COMPONENT
    if ix.kind != 3 {
        return None;
    }

    let data = ix.data?;
    let control = ControlKind::from_custom_id(&data.custom_id)?;
    let message = ix.message?;
    let channel_id = ix.channel_id?;

    // Guild interactions carry `member`, DM interactions carry `user`.
    let (user, roles) = match ix.member {
        Some(member) => (member.user?, member.roles),
        None => (ix.user?, Vec::new()),
    };

    Some(Activation {
        id: ix.id,
        token: ix.token,
        control,
        message_id: MessageId::new(message.id),
        channel_id: ChannelId::new(channel_id),
        guild_id: ix.guild_id,
        user_id: UserId::new(user.id),
        user_name: user.username,
        member_roles: roles.into_iter().map(RoleId::new).collect(),
    })
}

// Discord API types

/// Discord user object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    /// User's unique ID.
    pub id: String,
    /// User's username.
    pub username: String,
    /// Whether the user is a bot.
    #[serde(default)]
    pub bot: bool,
}

/// Discord guild member object (subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMember {
    /// The member's user object (absent on some partials).
    pub user: Option<DiscordUser>,
    /// Role IDs held by the member.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Discord channel object (subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannel {
    /// Channel ID.
    pub id: String,
    /// Channel name (absent for DMs).
    pub name: Option<String>,
}

/// Discord message object (subset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMessage {
    /// Message ID.
    pub id: String,
    /// Channel ID.
    pub channel_id: String,
    /// Guild ID (if in a guild).
    pub guild_id: Option<String>,
    /// Message author.
    pub author: Option<DiscordUser>,
    /// Message content.
    pub content: Option<String>,
    /// Message timestamp (ISO 8601).
    pub timestamp: Option<String>,
    /// Message attachments.
    pub attachments: Option<Vec<DiscordAttachment>>,
}

/// Discord attachment object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordAttachment {
    /// Attachment ID.
    pub id: String,
    /// Filename.
    pub filename: String,
    /// File size in bytes.
    pub size: Option<i64>,
    /// Source URL.
    pub url: String,
    /// Content type (MIME).
    pub content_type: Option<String>,
}

/// Interaction object (subset covering message components).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordInteraction {
    /// Interaction ID.
    pub id: String,
    /// Interaction type (3 = message component).
    #[serde(rename = "type")]
    pub kind: u8,
    /// Continuation token for the callback endpoint.
    pub token: String,
    /// Component data.
    pub data: Option<InteractionData>,
    /// The message the component sits on.
    pub message: Option<InteractionMessage>,
    /// Channel the interaction happened in.
    pub channel_id: Option<String>,
    /// Guild the interaction happened in.
    pub guild_id: Option<String>,
    /// Guild member payload (guild interactions).
    pub member: Option<DiscordMember>,
    /// User payload (DM interactions).
    pub user: Option<DiscordUser>,
}

/// Component data on an interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionData {
    /// The activated component's custom ID.
    pub custom_id: String,
}

/// The message referenced by a component interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionMessage {
    /// Message ID.
    pub id: String,
}

/// An action row of message components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRow {
    /// Component type (1 = action row).
    #[serde(rename = "type")]
    pub kind: u8,
    /// Buttons in the row.
    pub components: Vec<ButtonComponent>,
}

/// A button component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonComponent {
    /// Component type (2 = button).
    #[serde(rename = "type")]
    pub kind: u8,
    /// Button style.
    pub style: u8,
    /// Button label.
    pub label: String,
    /// Custom ID routed back on activation.
    pub custom_id: String,
    /// Whether the button is greyed out.
    pub disabled: bool,
}

/// Discord embed object (subset used for by-reference media).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordEmbed {
    /// Embed image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
    /// Embed video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<EmbedMedia>,
}

/// Embedded media by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedMedia {
    /// Media URL.
    pub url: String,
}

/// Create-message parameters.
#[derive(Debug, Serialize)]
struct CreateMessageParams {
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeds: Option<Vec<DiscordEmbed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<Vec<ActionRow>>,
    allowed_mentions: AllowedMentions,
}

/// Edit-message parameters (controls only).
#[derive(Debug, Serialize)]
struct EditMessageParams {
    components: Vec<ActionRow>,
}

/// Allowed mentions configuration; empty parse list mutes pings.
#[derive(Debug, Default, Serialize)]
struct AllowedMentions {
    parse: Vec<String>,
}

/// Interaction callback body.
#[derive(Debug, Serialize)]
struct InteractionCallback {
    #[serde(rename = "type")]
    kind: u8,
    data: InteractionCallbackData,
}

/// Interaction callback message data.
#[derive(Debug, Serialize)]
struct InteractionCallbackData {
    content: String,
    flags: u64,
}
