//! Form state machine — which step a conversation is at and whether it is
//! still running.

use serde::{Deserialize, Serialize};

use super::model::FieldKey;

/// Position of a conversation in the flow.
///
/// Progresses linearly: Start → Field(0) → … → Field(n-1) → Confirmation.
/// Invalid answers keep the conversation on the same `Field(i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Start,
    Field(usize),
    Confirmation,
}

impl FlowStep {
    /// Step that follows `self` in a flow of `field_count` fields.
    pub fn next(&self, field_count: usize) -> Option<FlowStep> {
        match *self {
            Self::Start if field_count == 0 => Some(Self::Confirmation),
            Self::Start => Some(Self::Field(0)),
            Self::Field(i) if i + 1 < field_count => Some(Self::Field(i + 1)),
            Self::Field(_) => Some(Self::Confirmation),
            Self::Confirmation => None,
        }
    }
}

impl Default for FlowStep {
    fn default() -> Self {
        Self::Start
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Field(i) => write!(f, "field #{i}"),
            Self::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// Lifecycle of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Confirmed,
    Cancelled,
}

impl ConversationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// What the conversation is waiting for after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKey {
    Field(FieldKey),
    Confirmation,
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(key) => write!(f, "{key}"),
            Self::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// The user's answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmChoice {
    Accept,
    Reject,
}

impl ConfirmChoice {
    pub const ACCEPT_TOKEN: &'static str = "Yes";
    pub const REJECT_TOKEN: &'static str = "No";

    /// Parse one of the two literal keyboard tokens. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            Self::ACCEPT_TOKEN => Some(Self::Accept),
            Self::REJECT_TOKEN => Some(Self::Reject),
            _ => None,
        }
    }
}
