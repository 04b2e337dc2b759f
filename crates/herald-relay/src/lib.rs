//! # Herald Relay
//!
//! The relay controller and announcement gate: watches one source channel,
//! mirrors each posted message into a prompt with Announce/Cancel controls,
//! and republishes approved messages into the announcement channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod gate;
pub mod prompt;

#[cfg(test)]
mod testkit;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use herald_channels::{GatewayEvent, Platform};
use herald_core::Config;

pub use controller::RelayController;
pub use gate::AnnouncementGate;
pub use prompt::{PromptEntry, PromptRegistry, RelayPrompt};

/// Run the relay loop until the event stream ends.
///
/// Each event is dispatched onto its own task, so a prompt suspended on a
/// platform round-trip never blocks other events. Failures inside a
/// handler are contained to that event.
pub async fn run(
    platform: Arc<dyn Platform>,
    config: Arc<Config>,
    mut events: mpsc::Receiver<GatewayEvent>,
) {
    let registry = Arc::new(PromptRegistry::new());
    let controller = Arc::new(RelayController::new(
        Arc::clone(&platform),
        Arc::clone(&config),
        Arc::clone(&registry),
    ));
    let gate = Arc::new(AnnouncementGate::new(
        platform,
        Arc::clone(&config),
        registry,
    ));

    while let Some(event) = events.recv().await {
        match event {
            GatewayEvent::Ready { bot_name, .. } => {
                info!(bot = %bot_name, "logged in and ready");
                info!(channel = %config.source_channel_id, "watching source channel");
                info!(channel = %config.announce_channel_id, "announcing into channel");
                info!(role = %config.allowed_role_id, "announce role");
            }
            GatewayEvent::MessageCreated(message) => {
                let controller = Arc::clone(&controller);
                dispatch(async move { controller.handle_message(message).await });
            }
            GatewayEvent::ControlActivated(activation) => {
                let gate = Arc::clone(&gate);
                dispatch(async move { gate.handle_activation(activation).await });
            }
        }
    }
}

/// Spawn an event handler, logging a panic instead of propagating it.
fn dispatch<F>(fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(fut);
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!(error = %e, "event handler failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{CHANNEL_MISSING_NOTICE, DENIED_NOTICE, SUCCESS_NOTICE};
    use crate::testkit::{FakePlatform, activation, source_message, test_config};
    use herald_channels::ControlRow;
    use herald_core::types::{Attachment, ControlKind, MessageId, UserId};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        platform: Arc<FakePlatform>,
        controller: RelayController,
        gate: AnnouncementGate,
        registry: Arc<PromptRegistry>,
    }

    fn harness_with(config: Config) -> Harness {
        let platform = Arc::new(FakePlatform::new());
        let config = Arc::new(config);
        let registry = Arc::new(PromptRegistry::new());

        let controller = RelayController::new(
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::clone(&config),
            Arc::clone(&registry),
        );
        let gate = AnnouncementGate::new(
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::clone(&config),
            Arc::clone(&registry),
        );

        Harness {
            platform,
            controller,
            gate,
            registry,
        }
    }

    fn harness() -> Harness {
        harness_with(test_config())
    }

    /// Let spawned expiry tasks make progress under a paused clock.
    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_qualifying_message_creates_prompt() {
        let h = harness();
        let mut message = source_message("S", "hello");
        message.attachments = vec![Attachment {
            url: "https://cdn.discordapp.com/shot.png".to_string(),
            filename: "shot.png".to_string(),
            mime_type: Some("image/png".to_string()),
            size: Some(9),
        }];

        h.controller.handle_message(message.clone()).await;

        let posted = h.platform.posted_in("S");
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].content, "hello");
        assert_eq!(posted[0].attachments, message.attachments);
        assert_eq!(posted[0].controls, Some(ControlRow::ENABLED));
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_content_still_relayed() {
        let h = harness();
        h.controller.handle_message(source_message("S", "")).await;

        let posted = h.platform.posted_in("S");
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].content, "");
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_other_channels_ignored() {
        let h = harness();
        h.controller
            .handle_message(source_message("elsewhere", "hello"))
            .await;

        assert!(h.platform.posted.lock().unwrap().is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_bot_authors_ignored() {
        let h = harness();
        let mut message = source_message("S", "hello");
        message.author_is_bot = true;

        h.controller.handle_message(message).await;

        assert!(h.platform.posted.lock().unwrap().is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_failed_post_is_contained() {
        let h = harness();
        h.platform.fail_posts.store(true, Ordering::Relaxed);

        h.controller.handle_message(source_message("S", "hello")).await;

        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_announce_scenario() {
        // Config {S, A, R}; "hello" in S; role-holder clicks Announce.
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;

        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["R"]))
            .await;

        let announced = h.platform.posted_in("A");
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].content, "hello");
        assert!(announced[0].controls.is_none());

        let replies = h.platform.replies.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![(UserId::new("u1"), SUCCESS_NOTICE.to_string(), true)]
        );

        let edits = h.platform.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0.message_id, MessageId::new("posted-0"));
        assert_eq!(edits[0].1, ControlRow::DISABLED);

        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_announce_carries_attachments() {
        let h = harness();
        let mut message = source_message("S", "release notes");
        message.attachments = vec![Attachment {
            url: "https://cdn.discordapp.com/notes.pdf".to_string(),
            filename: "notes.pdf".to_string(),
            mime_type: None,
            size: None,
        }];
        h.controller.handle_message(message.clone()).await;

        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["R"]))
            .await;

        let announced = h.platform.posted_in("A");
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].attachments, message.attachments);
    }

    #[tokio::test]
    async fn test_announce_without_role_denied() {
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;

        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["other"]))
            .await;

        assert!(h.platform.posted_in("A").is_empty());

        let replies = h.platform.replies.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![(UserId::new("u1"), DENIED_NOTICE.to_string(), true)]
        );

        // Reference behavior: the denial still resolves the prompt.
        let edits = h.platform.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].1, ControlRow::DISABLED);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_resolves_without_notice() {
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;

        h.gate
            .handle_activation(activation(ControlKind::Cancel, "posted-0", &["R"]))
            .await;

        assert!(h.platform.posted_in("A").is_empty());
        assert!(h.platform.replies.lock().unwrap().is_empty());
        assert_eq!(h.platform.edits.lock().unwrap().len(), 1);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_missing_announce_channel() {
        let h = harness();
        h.platform.mark_channel_missing("A");
        h.controller.handle_message(source_message("S", "hello")).await;

        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["R"]))
            .await;

        assert!(h.platform.posted_in("A").is_empty());

        let replies = h.platform.replies.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![(
                UserId::new("u1"),
                CHANNEL_MISSING_NOTICE.to_string(),
                true
            )]
        );

        // The prompt still resolves.
        assert_eq!(h.platform.edits.lock().unwrap().len(), 1);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_second_activation_ignored() {
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;

        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["R"]))
            .await;
        h.gate
            .handle_activation(activation(ControlKind::Announce, "posted-0", &["R"]))
            .await;

        assert_eq!(h.platform.posted_in("A").len(), 1);
        assert_eq!(h.platform.replies.lock().unwrap().len(), 1);
        assert_eq!(h.platform.edits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_prompt_ignored() {
        let h = harness();

        h.gate
            .handle_activation(activation(ControlKind::Announce, "never-posted", &["R"]))
            .await;

        assert!(h.platform.posted.lock().unwrap().is_empty());
        assert!(h.platform.replies.lock().unwrap().is_empty());
        assert!(h.platform.edits.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_disables_controls() {
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;
        assert_eq!(h.registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(301)).await;
        settle().await;

        let edits = h.platform.edits.lock().unwrap().clone();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].1, ControlRow::DISABLED);

        // No actor notice on expiry.
        assert!(h.platform.replies.lock().unwrap().is_empty());
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_before_deadline_cancels_timer() {
        let h = harness();
        h.controller.handle_message(source_message("S", "hello")).await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        h.gate
            .handle_activation(activation(ControlKind::Cancel, "posted-0", &["R"]))
            .await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        settle().await;

        // Only the activation disabled the controls; the timer never fired.
        assert_eq!(h.platform.edits.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_prompt_never_expires() {
        let mut config = test_config();
        config.prompt_timeout_secs = None;
        let h = harness_with(config);

        h.controller.handle_message(source_message("S", "hello")).await;

        tokio::time::sleep(Duration::from_secs(86_400)).await;
        settle().await;

        assert!(h.platform.edits.lock().unwrap().is_empty());
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_dispatches_events() {
        let platform = Arc::new(FakePlatform::new());
        let config = Arc::new(test_config());
        let (tx, rx) = mpsc::channel(8);

        let relay = tokio::spawn(run(
            Arc::clone(&platform) as Arc<dyn Platform>,
            config,
            rx,
        ));

        tx.send(GatewayEvent::Ready {
            bot_user_id: UserId::new("bot-1"),
            bot_name: "herald".to_string(),
        })
        .await
        .unwrap();
        tx.send(GatewayEvent::MessageCreated(source_message("S", "hi")))
            .await
            .unwrap();
        drop(tx);

        relay.await.unwrap();
        settle().await;
        assert_eq!(platform.posted_in("S").len(), 1);
    }
}
