//! Bot token handling.
//!
//! The token is read once from the process environment at startup and
//! wrapped so it cannot leak through Debug/Display output.

use secrecy::{ExposeSecret, SecretBox};
use thiserror::Error;

/// Primary environment variable holding the bot token.
pub const TOKEN_ENV: &str = "HERALD_BOT_TOKEN";

/// Fallback environment variable, kept for existing deployments.
pub const TOKEN_ENV_FALLBACK: &str = "BOT_TOKEN";

/// Errors from token loading.
#[derive(Error, Debug)]
pub enum TokenError {
    /// Neither environment variable is set.
    #[error("bot token not set (expected {TOKEN_ENV} or {TOKEN_ENV_FALLBACK})")]
    Missing,

    /// The variable is set but empty.
    #[error("bot token is empty")]
    Empty,
}

/// Bot token wrapper that prevents accidental logging.
#[derive(Clone)]
pub struct BotToken(SecretBox<str>);

impl BotToken {
    /// Create a new bot token.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(SecretBox::new(token.into_boxed_str()))
    }

    /// Read the token from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if no token variable is set or the value is empty.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the token through an environment lookup function.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup yields nothing or an empty value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TokenError> {
        let value = lookup(TOKEN_ENV)
            .or_else(|| lookup(TOKEN_ENV_FALLBACK))
            .ok_or(TokenError::Missing)?;

        if value.trim().is_empty() {
            return Err(TokenError::Empty);
        }

        Ok(Self::new(value))
    }

    /// Expose the secret for actual API calls.
    ///
    /// Use sparingly - only when actually sending to the platform.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BotToken([REDACTED])")
    }
}

impl std::fmt::Display for BotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}
