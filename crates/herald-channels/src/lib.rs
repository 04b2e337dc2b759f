//! # Herald Channels
//!
//! The Discord platform adapter for Herald: REST operations, the Gateway
//! intake loop, and the capability trait the relay core depends on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod events;
mod traits;

/// Discord platform adapter.
pub mod discord;

pub use events::{Activation, GatewayEvent};
pub use traits::{
    ChannelInfo, ControlRow, MessageDraft, Platform, PlatformError, PostedMessage,
};

// Re-export the concrete implementations
pub use discord::{DiscordGateway, DiscordPlatform};
