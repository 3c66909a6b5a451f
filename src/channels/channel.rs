//! Channel traits and message types shared by every transport.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::form::ChatTarget;

/// Stream of inbound messages produced by a started channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A text message received from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Channel name, e.g. "telegram".
    pub channel: String,
    /// Stable sender identifier within the channel.
    pub user_id: String,
    /// Human-readable sender name, if known.
    pub user_name: Option<String>,
    pub content: String,
    /// Channel-specific extras (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    /// Session key identifying this sender's conversation.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.user_id)
    }

    /// Where replies to this message should go. Falls back to the user id
    /// when the channel did not record a separate chat id.
    pub fn reply_target(&self) -> ChatTarget {
        let chat_id = self
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.user_id);
        ChatTarget::new(self.channel.as_str(), chat_id)
    }
}

/// Reply-choice affordance attached to an outgoing prompt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyMarkup {
    /// Leave whatever keyboard is showing.
    #[default]
    None,
    /// Offer a one-time keyboard with these choices.
    Choices(Vec<String>),
    /// Remove a previously offered keyboard.
    ClearChoices,
}

/// Delivers prompts to a user.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_prompt(
        &self,
        target: &ChatTarget,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), ChannelError>;
}

/// Delivers a finished post to the publishing destination.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, target: &str, document: &str) -> Result<(), ChannelError>;
}

/// A transport that produces inbound messages.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening and return the inbound message stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_combines_channel_and_user() {
        let msg = IncomingMessage::new("telegram", "1234", "hi");
        assert_eq!(msg.session_key(), "telegram:1234");
    }

    #[test]
    fn reply_target_prefers_chat_id() {
        let msg = IncomingMessage::new("telegram", "1234", "hi")
            .with_metadata(serde_json::json!({"chat_id": "-100987"}));
        assert_eq!(msg.reply_target(), ChatTarget::new("telegram", "-100987"));
    }

    #[test]
    fn reply_target_falls_back_to_user_id() {
        let msg = IncomingMessage::new("cli", "local-user", "hi");
        assert_eq!(msg.reply_target(), ChatTarget::new("cli", "local-user"));
    }

    #[test]
    fn default_markup_is_none() {
        assert_eq!(ReplyMarkup::default(), ReplyMarkup::None);
    }
}
