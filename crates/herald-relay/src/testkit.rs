//! In-memory platform double for relay tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use herald_channels::{
    Activation, ChannelInfo, ControlRow, MessageDraft, Platform, PlatformError, PostedMessage,
};
use herald_core::Config;
use herald_core::types::{
    ChannelId, ControlKind, MessageId, RoleId, SourceMessage, UserId,
};

/// Records every platform call instead of talking to Discord.
#[derive(Default)]
pub(crate) struct FakePlatform {
    pub posted: Mutex<Vec<(ChannelId, MessageDraft)>>,
    pub edits: Mutex<Vec<(PostedMessage, ControlRow)>>,
    pub replies: Mutex<Vec<(UserId, String, bool)>>,
    pub missing_channels: Mutex<HashSet<String>>,
    pub fail_posts: AtomicBool,
    next_id: AtomicU64,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_channel_missing(&self, id: &str) {
        self.missing_channels
            .lock()
            .unwrap()
            .insert(id.to_string());
    }

    /// Drafts posted into the given channel, in order.
    pub fn posted_in(&self, channel: &str) -> Vec<MessageDraft> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c.as_ref() == channel)
            .map(|(_, draft)| draft.clone())
            .collect()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        draft: MessageDraft,
    ) -> Result<PostedMessage, PlatformError> {
        if self.fail_posts.load(Ordering::Relaxed) {
            return Err(PlatformError::Network("synthetic failure".to_string()));
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.posted.lock().unwrap().push((channel.clone(), draft));
        Ok(PostedMessage {
            channel_id: channel.clone(),
            message_id: MessageId::new(format!("posted-{n}")),
        })
    }

    async fn edit_controls(
        &self,
        message: &PostedMessage,
        controls: ControlRow,
    ) -> Result<(), PlatformError> {
        self.edits.lock().unwrap().push((message.clone(), controls));
        Ok(())
    }

    async fn fetch_channel(&self, id: &ChannelId) -> Result<ChannelInfo, PlatformError> {
        if self.missing_channels.lock().unwrap().contains(id.as_ref()) {
            return Err(PlatformError::ChannelNotFound(id.to_string()));
        }
        Ok(ChannelInfo {
            id: id.clone(),
            name: Some("general".to_string()),
        })
    }

    async fn actor_has_role(
        &self,
        activation: &Activation,
        role: &RoleId,
    ) -> Result<bool, PlatformError> {
        Ok(activation.member_roles.contains(role))
    }

    async fn reply(
        &self,
        activation: &Activation,
        content: &str,
        private: bool,
    ) -> Result<(), PlatformError> {
        self.replies.lock().unwrap().push((
            activation.user_id.clone(),
            content.to_string(),
            private,
        ));
        Ok(())
    }
}

/// Config pointing at source "S", announce "A", role "R".
pub(crate) fn test_config() -> Config {
    Config {
        source_channel_id: ChannelId::new("S"),
        announce_channel_id: ChannelId::new("A"),
        allowed_role_id: RoleId::new("R"),
        prompt_timeout_secs: Some(300),
        log_file: None,
    }
}

/// A non-bot message posted in the given channel.
pub(crate) fn source_message(channel: &str, content: &str) -> SourceMessage {
    SourceMessage {
        id: MessageId::new("m1"),
        channel_id: ChannelId::new(channel),
        author_id: UserId::new("author-1"),
        author_name: "alice".to_string(),
        author_is_bot: false,
        content: content.to_string(),
        attachments: vec![],
        timestamp: chrono::Utc::now(),
    }
}

/// An activation on the given prompt message by a user holding `roles`.
pub(crate) fn activation(control: ControlKind, message_id: &str, roles: &[&str]) -> Activation {
    Activation {
        id: "ix-1".to_string(),
        token: "tok".to_string(),
        control,
        message_id: MessageId::new(message_id),
        channel_id: ChannelId::new("S"),
        guild_id: Some("g1".to_string()),
        user_id: UserId::new("u1"),
        user_name: "tester".to_string(),
        member_roles: roles.iter().map(|r| RoleId::new(*r)).collect(),
    }
}
