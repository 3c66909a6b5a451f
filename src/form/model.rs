//! Conversation data model — one user's progress through the post form.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{ConversationStatus, FlowStep};

/// Identity of a form field.
///
/// Variant order is flow order, so a `BTreeMap<FieldKey, _>` iterates
/// answers in the order they were asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Title,
    Emoji,
    Date,
    Description,
    Link,
    Contact,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Emoji => "emoji",
            Self::Date => "date",
            Self::Description => "description",
            Self::Link => "link",
            Self::Contact => "contact",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where prompts for a conversation are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTarget {
    /// Channel name, e.g. "telegram" or "cli".
    pub channel: String,
    /// Channel-specific chat identifier.
    pub chat_id: String,
}

impl ChatTarget {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.chat_id)
    }
}

/// Per-user mutable record of an in-flight post submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique id for log correlation.
    pub id: Uuid,
    /// Stable session key (`<channel>:<user id>`) the store indexes by.
    pub session: String,
    /// Where prompts go.
    pub chat: ChatTarget,
    /// Display name used in log lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Current position in the flow.
    pub step: FlowStep,
    pub status: ConversationStatus,
    /// Accepted answers, keyed by field. Iterates in flow order.
    pub answers: BTreeMap<FieldKey, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(session: impl Into<String>, chat: ChatTarget) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session: session.into(),
            chat,
            user_name: None,
            step: FlowStep::Start,
            status: ConversationStatus::Active,
            answers: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Accepted answer for a field, if any.
    pub fn answer(&self, key: FieldKey) -> Option<&str> {
        self.answers.get(&key).map(String::as_str)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Name to show in logs.
    pub fn display_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or(self.chat.chat_id.as_str())
    }

    /// Bump the activity timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
