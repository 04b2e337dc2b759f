//! Platform traits.

use async_trait::async_trait;
use thiserror::Error;

use herald_core::types::{Attachment, ChannelId, MessageId, RoleId};

use crate::events::Activation;

/// Platform errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A channel could not be resolved.
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// A resource other than a channel was missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected wire payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A message draft to post.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    /// Text content (may be empty).
    pub content: String,
    /// Attachments to carry by reference.
    pub attachments: Vec<Attachment>,
    /// Announce/Cancel control row, when the message is a prompt.
    pub controls: Option<ControlRow>,
}

impl MessageDraft {
    /// Create a text-only draft.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Attach files by reference.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Carry the Announce/Cancel control row.
    #[must_use]
    pub fn with_controls(mut self, controls: ControlRow) -> Self {
        self.controls = Some(controls);
        self
    }
}

/// The state of the Announce/Cancel action row on a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRow {
    /// Whether the controls accept activations.
    pub enabled: bool,
}

impl ControlRow {
    /// Controls accepting activations.
    pub const ENABLED: Self = Self { enabled: true };
    /// Controls greyed out.
    pub const DISABLED: Self = Self { enabled: false };
}

/// Handle to a message the bot posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    /// Channel the message lives in.
    pub channel_id: ChannelId,
    /// Message ID assigned by the platform.
    pub message_id: MessageId,
}

/// Channel metadata from a fetch.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// Channel ID.
    pub id: ChannelId,
    /// Channel name, when the platform reports one.
    pub name: Option<String>,
}

/// Capability handle over the chat platform.
///
/// The relay controller and announcement gate depend only on this trait,
/// so tests substitute a fake transport.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Post a message (optionally carrying controls) into a channel.
    async fn post_message(
        &self,
        channel: &ChannelId,
        draft: MessageDraft,
    ) -> Result<PostedMessage, PlatformError>;

    /// Replace the control row on a posted message.
    async fn edit_controls(
        &self,
        message: &PostedMessage,
        controls: ControlRow,
    ) -> Result<(), PlatformError>;

    /// Resolve a channel by ID.
    async fn fetch_channel(&self, id: &ChannelId) -> Result<ChannelInfo, PlatformError>;

    /// Whether the activating member holds the given role.
    async fn actor_has_role(
        &self,
        activation: &Activation,
        role: &RoleId,
    ) -> Result<bool, PlatformError>;

    /// Reply to an activation, privately when `private` is set.
    async fn reply(
        &self,
        activation: &Activation,
        content: &str,
        private: bool,
    ) -> Result<(), PlatformError>;
}
