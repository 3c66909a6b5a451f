//! Post form — the guided question-and-answer flow.
//!
//! A conversation walks an ordered list of fields. Each reply is checked by
//! the field's validator; a rejected reply repeats the question, an accepted
//! one moves to the next field. After the last field the answers are
//! rendered into the channel post and the user confirms or rejects it.

pub mod document;
pub mod fields;
pub mod manager;
pub mod model;
pub mod prompts;
pub mod state;
pub mod validators;

pub use document::DocumentBuilder;
pub use fields::{Field, FieldRegistry};
pub use manager::FormManager;
pub use model::{ChatTarget, Conversation, FieldKey};
pub use state::{ConfirmChoice, ConversationStatus, FlowStep, StepKey};
pub use validators::{DateRange, Validator, parse_date_range};
