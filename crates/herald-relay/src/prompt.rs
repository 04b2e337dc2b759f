//! Relay prompt lifecycle.
//!
//! A prompt's controls move from enabled to disabled exactly once. The
//! transition is guarded by a compare-and-set so a late activation and a
//! firing expiry timer cannot both win.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use herald_channels::PostedMessage;
use herald_core::types::{Attachment, MessageId};

/// One posted copy of a source message awaiting a decision.
#[derive(Debug, Clone)]
pub struct RelayPrompt {
    /// The posted prompt message carrying the controls.
    pub posted: PostedMessage,
    /// Mirrored content of the source message.
    pub content: String,
    /// Mirrored attachments of the source message.
    pub attachments: Vec<Attachment>,
}

/// Shared state for one prompt: the prompt itself, its resolution flag,
/// and the expiry timer handle.
pub struct PromptEntry {
    prompt: RelayPrompt,
    resolved: AtomicBool,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl PromptEntry {
    fn new(prompt: RelayPrompt) -> Self {
        Self {
            prompt,
            resolved: AtomicBool::new(false),
            expiry: Mutex::new(None),
        }
    }

    /// The prompt this entry tracks.
    #[must_use]
    pub const fn prompt(&self) -> &RelayPrompt {
        &self.prompt
    }

    /// Claim the single Pending → Resolved transition.
    ///
    /// Returns `true` for exactly one caller; the loser of a race between
    /// an activation and the expiry timer gets `false` and must do
    /// nothing.
    pub fn resolve(&self) -> bool {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the prompt has reached its terminal state.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Attach the expiry timer handle.
    pub fn set_expiry(&self, handle: JoinHandle<()>) {
        if let Ok(mut slot) = self.expiry.lock() {
            *slot = Some(handle);
        }
    }

    /// Abort the expiry timer on early resolution.
    pub fn cancel_expiry(&self) {
        if let Ok(mut slot) = self.expiry.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Pending prompts, keyed by the posted prompt's message ID.
#[derive(Default)]
pub struct PromptRegistry {
    entries: Mutex<HashMap<MessageId, Arc<PromptEntry>>>,
}

impl PromptRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly posted prompt.
    pub fn insert(&self, prompt: RelayPrompt) -> Arc<PromptEntry> {
        let id = prompt.posted.message_id.clone();
        let entry = Arc::new(PromptEntry::new(prompt));
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id, Arc::clone(&entry));
        }
        entry
    }

    /// Look up a prompt by its message ID.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<Arc<PromptEntry>> {
        self.entries.lock().ok()?.get(id).cloned()
    }

    /// Drop a resolved prompt.
    pub fn remove(&self, id: &MessageId) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(id);
        }
    }

    /// Number of pending prompts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether no prompts are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::ChannelId;

    fn prompt(id: &str) -> RelayPrompt {
        RelayPrompt {
            posted: PostedMessage {
                channel_id: ChannelId::new("c1"),
                message_id: MessageId::new(id),
            },
            content: "hello".to_string(),
            attachments: vec![],
        }
    }

    #[test]
    fn test_resolve_exactly_once() {
        let entry = PromptEntry::new(prompt("m1"));
        assert!(!entry.is_resolved());
        assert!(entry.resolve());
        assert!(!entry.resolve());
        assert!(entry.is_resolved());
    }

    #[test]
    fn test_resolve_race_has_single_winner() {
        let entry = Arc::new(PromptEntry::new(prompt("m1")));

        let winners: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let entry = Arc::clone(&entry);
                    scope.spawn(move || usize::from(entry.resolve()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(winners, 1);
    }

    #[test]
    fn test_registry_insert_get_remove() {
        let registry = PromptRegistry::new();
        assert!(registry.is_empty());

        registry.insert(prompt("m1"));
        registry.insert(prompt("m2"));
        assert_eq!(registry.len(), 2);

        let entry = registry.get(&MessageId::new("m1")).unwrap();
        assert_eq!(entry.prompt().content, "hello");

        registry.remove(&MessageId::new("m1"));
        assert!(registry.get(&MessageId::new("m1")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_expiry_aborts_timer() {
        let entry = PromptEntry::new(prompt("m1"));
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        entry.set_expiry(handle);
        entry.cancel_expiry();

        // A second cancel is a no-op.
        entry.cancel_expiry();
    }
}
