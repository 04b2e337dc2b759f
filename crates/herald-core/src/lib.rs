//! # Herald Core
//!
//! Core types, configuration, and secrets for Herald.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Identifier newtypes and normalized message types
//! - Bot token handling with redaction
//! - Logging setup (console plus append-only log file)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod secrets;
pub mod types;

pub use config::{Config, ConfigError};
pub use secrets::BotToken;
pub use types::{Attachment, ChannelId, ControlKind, MessageId, RoleId, SourceMessage, UserId};
