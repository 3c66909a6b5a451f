//! Persistence layer — storage for in-flight conversations.

pub mod conversations;

pub use conversations::{ConversationStore, MemoryConversationStore};
