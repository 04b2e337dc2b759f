//! Core types used throughout Herald.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a Discord channel (snowflake).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Create a new channel ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Discord message (snowflake).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new message ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Discord user (snowflake).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Discord guild role (snowflake).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    /// Create a new role ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RoleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A normalized inbound message from the watched channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMessage {
    /// Message ID assigned by the platform.
    pub id: MessageId,
    /// Channel the message was posted in.
    pub channel_id: ChannelId,
    /// Author's user ID.
    pub author_id: UserId,
    /// Author's display name (for logging).
    pub author_name: String,
    /// Whether the author is a bot account.
    pub author_is_bot: bool,
    /// Text content (may be empty).
    pub content: String,
    /// Attachments carried by the message.
    pub attachments: Vec<Attachment>,
    /// Timestamp when the message was sent.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// An attachment, passed through by reference (never re-uploaded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Source URL.
    pub url: String,
    /// File name.
    pub filename: String,
    /// MIME type, when the platform reports one.
    pub mime_type: Option<String>,
    /// File size in bytes, when reported.
    pub size: Option<u64>,
}

impl Attachment {
    /// Whether this attachment is an image (by MIME type).
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }

    /// Whether this attachment is a video (by MIME type).
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|m| m.starts_with("video/"))
    }
}

/// The control a user activated on a relay prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Republish the message to the announcement channel.
    Announce,
    /// Dismiss the prompt without announcing.
    Cancel,
}

impl ControlKind {
    /// The custom ID carried on the wire for this control.
    #[must_use]
    pub fn custom_id(self) -> &'static str {
        match self {
            Self::Announce => "announce",
            Self::Cancel => "cancel",
        }
    }

    /// Parse a wire custom ID back into a control kind.
    #[must_use]
    pub fn from_custom_id(id: &str) -> Option<Self> {
        match id {
            "announce" => Some(Self::Announce),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}
