//! Normalized events delivered by the Gateway intake task.

use herald_core::types::{ChannelId, ControlKind, MessageId, RoleId, SourceMessage, UserId};

/// Events the relay loop consumes.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Session established.
    Ready {
        /// The bot's own user ID.
        bot_user_id: UserId,
        /// The bot's account name.
        bot_name: String,
    },
    /// A message was posted.
    MessageCreated(SourceMessage),
    /// A control on a posted prompt was activated.
    ControlActivated(Activation),
}

/// A user's click on a posted control.
///
/// Consumed immediately by the announcement gate; never persisted.
#[derive(Debug, Clone)]
pub struct Activation {
    /// Interaction ID (for the callback endpoint).
    pub id: String,
    /// Interaction token (for the callback endpoint).
    pub token: String,
    /// Which control was activated.
    pub control: ControlKind,
    /// The prompt message carrying the control.
    pub message_id: MessageId,
    /// Channel the prompt lives in.
    pub channel_id: ChannelId,
    /// Guild the prompt lives in, if any.
    pub guild_id: Option<String>,
    /// Acting user.
    pub user_id: UserId,
    /// Acting user's display name (for logging).
    pub user_name: String,
    /// Role IDs held by the acting member, as carried on the payload.
    pub member_roles: Vec<RoleId>,
}
