//! Relay controller: mirrors qualifying source messages into prompts.

use std::sync::Arc;

use tracing::{debug, error, info};

use herald_channels::{ControlRow, MessageDraft, Platform, PlatformError};
use herald_core::Config;
use herald_core::types::SourceMessage;

use crate::prompt::{PromptEntry, PromptRegistry, RelayPrompt};

/// Watches the source channel and posts a relay prompt for each
/// qualifying message.
pub struct RelayController {
    platform: Arc<dyn Platform>,
    config: Arc<Config>,
    registry: Arc<PromptRegistry>,
}

impl RelayController {
    /// Create a controller over the given platform handle.
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

    /// Handle a message-created event.
    ///
    /// Messages outside the source channel and messages from bot accounts
    /// are ignored. Everything else (including empty content) is mirrored
    /// into a prompt with enabled controls.
    pub async fn handle_message(&self, message: SourceMessage) {
        if message.channel_id != self.config.source_channel_id {
            return;
        }
        if message.author_is_bot {
            debug!(author = %message.author_name, "ignoring bot message");
            return;
        }

        info!(author = %message.author_name, "new message in source channel");

        match self.post_prompt(&message).await {
            Ok(entry) => {
                info!(
                    prompt = %entry.prompt().posted.message_id,
                    "posted relay prompt"
                );
                self.arm_expiry(&entry);
            }
            Err(e) => {
                // Contained: the next source message gets a fresh attempt.
                error!(error = %e, "failed to post relay prompt");
            }
        }
    }

    /// Post the prompt copy and register it.
    async fn post_prompt(
        &self,
        message: &SourceMessage,
    ) -> Result<Arc<PromptEntry>, PlatformError> {
        let draft = MessageDraft::text(message.content.clone())
            .with_attachments(message.attachments.clone())
            .with_controls(ControlRow::ENABLED);

        let posted = self
            .platform
            .post_message(&message.channel_id, draft)
            .await?;

        Ok(self.registry.insert(RelayPrompt {
            posted,
            content: message.content.clone(),
            attachments: message.attachments.clone(),
        }))
    }

    /// Start the deadline timer, unless prompts never expire.
    fn arm_expiry(&self, entry: &Arc<PromptEntry>) {
        let Some(deadline) = self.config.prompt_deadline() else {
            return;
        };

        let platform = Arc::clone(&self.platform);
        let registry = Arc::clone(&self.registry);
        let entry = Arc::clone(entry);
        let task_entry = Arc::clone(&entry);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;

            // An activation that resolved first wins the race.
            if !task_entry.resolve() {
                return;
            }

            info!(
                prompt = %task_entry.prompt().posted.message_id,
                "prompt expired, disabling controls"
            );
            if let Err(e) = platform
                .edit_controls(&task_entry.prompt().posted, ControlRow::DISABLED)
                .await
            {
                error!(error = %e, "failed to disable expired prompt");
            }
            registry.remove(&task_entry.prompt().posted.message_id);
        });

        entry.set_expiry(handle);
    }
}
