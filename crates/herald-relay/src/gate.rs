//! Announcement gate: authorizes control activations and republishes
//! approved messages into the announcement channel.

use std::sync::Arc;

use tracing::{debug, error, info};

use herald_channels::{Activation, ControlRow, MessageDraft, Platform, PlatformError};
use herald_core::Config;
use herald_core::types::ControlKind;

use crate::prompt::{PromptEntry, PromptRegistry};

/// Private notice for actors without the allowed role.
pub const DENIED_NOTICE: &str = "You do not have permission to use the Announce button.";

/// Private notice when the announcement channel cannot be resolved.
pub const CHANNEL_MISSING_NOTICE: &str = "Error: Announcement channel not found.";

/// Private notice after a successful announcement.
pub const SUCCESS_NOTICE: &str = "Announcement has been posted!";

/// Generic private notice when handling fails mid-flight.
const FAILURE_NOTICE: &str = "Something went wrong while handling this action.";

/// Resolves prompts on activation: announce, cancel, or deny.
pub struct AnnouncementGate {
    platform: Arc<dyn Platform>,
    config: Arc<Config>,
    registry: Arc<PromptRegistry>,
}

impl AnnouncementGate {
    /// Create a gate over the given platform handle.
    pub fn new(
        platform: Arc<dyn Platform>,
        config: Arc<Config>,
        registry: Arc<PromptRegistry>,
    ) -> Self {
        Self {
            platform,
            config,
            registry,
        }
    }

    /// Handle a control activation.
    ///
    /// The first activation claims the prompt's single Pending → Resolved
    /// transition, whatever its outcome; later activations and activations
    /// for unknown prompts are ignored. The controls are disabled on every
    /// claimed path, and any failure is contained to this activation.
    pub async fn handle_activation(&self, activation: Activation) {
        let Some(entry) = self.registry.get(&activation.message_id) else {
            debug!(message = %activation.message_id, "activation for unknown prompt");
            return;
        };

        if !entry.resolve() {
            debug!(message = %activation.message_id, "activation after resolution");
            return;
        }
        entry.cancel_expiry();

        info!(
            user = %activation.user_name,
            control = activation.control.custom_id(),
            "control activated"
        );

        if let Err(e) = self.decide(&activation, &entry).await {
            error!(error = %e, "activation handling failed");
            // Best-effort generic notice; the prompt resolves regardless.
            if let Err(e) = self.platform.reply(&activation, FAILURE_NOTICE, true).await {
                debug!(error = %e, "failed to deliver failure notice");
            }
        }

        if let Err(e) = self
            .platform
            .edit_controls(&entry.prompt().posted, ControlRow::DISABLED)
            .await
        {
            error!(error = %e, "failed to disable prompt controls");
        }
        self.registry.remove(&activation.message_id);
    }

    /// Authorize and route one claimed activation.
    async fn decide(
        &self,
        activation: &Activation,
        entry: &PromptEntry,
    ) -> Result<(), PlatformError> {
        let authorized = self
            .platform
            .actor_has_role(activation, &self.config.allowed_role_id)
            .await?;

        if !authorized {
            info!(user = %activation.user_name, "activation denied");
            return self.platform.reply(activation, DENIED_NOTICE, true).await;
        }

        match activation.control {
            ControlKind::Announce => self.announce(activation, entry).await,
            ControlKind::Cancel => {
                info!(user = %activation.user_name, "prompt cancelled");
                Ok(())
            }
        }
    }

    /// Republish the prompt's content into the announcement channel.
    async fn announce(
        &self,
        activation: &Activation,
        entry: &PromptEntry,
    ) -> Result<(), PlatformError> {
        let channel = match self
            .platform
            .fetch_channel(&self.config.announce_channel_id)
            .await
        {
            Ok(info) => info,
            Err(PlatformError::ChannelNotFound(id)) => {
                error!(channel = %id, "announcement channel not found");
                return self
                    .platform
                    .reply(activation, CHANNEL_MISSING_NOTICE, true)
                    .await;
            }
            Err(e) => return Err(e),
        };

        let draft = MessageDraft::text(entry.prompt().content.clone())
            .with_attachments(entry.prompt().attachments.clone());
        self.platform.post_message(&channel.id, draft).await?;

        info!(user = %activation.user_name, "announcement posted");
        self.platform.reply(activation, SUCCESS_NOTICE, true).await
    }
}
