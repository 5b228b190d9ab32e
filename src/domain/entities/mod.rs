mod conversation;
mod document;
mod rag;

pub use conversation::{Conversation, Message, MessageRole};
pub use document::{CollectionStats, Document, Metadata, SearchResult};
pub use rag::RagContext;
