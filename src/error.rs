//! Error types for the event post bot.

use crate::form::FieldKey;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Conversation store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Conversation store is full ({limit} conversations in flight)")]
    Full { limit: usize },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Failed to publish on channel {name}: {reason}")]
    PublishFailed { name: String, reason: String },
}

/// Errors raised by the form state machine.
///
/// Validation rejections are not errors: they loop back to the same
/// question. Everything here is either a collaborator failure or a caller
/// breaking the transition contract.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Cannot {operation} conversation {conversation} while at {step}")]
    InvalidTransition {
        conversation: String,
        operation: &'static str,
        step: String,
    },

    #[error("Answer for field {0} is missing")]
    MissingAnswer(FieldKey),

    #[error("Stored answer for field {key} cannot be rendered: {value:?}")]
    UnrenderableAnswer { key: FieldKey, value: String },

    #[error("Delivery failed: {0}")]
    Delivery(#[from] ChannelError),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
