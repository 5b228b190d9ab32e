mod chat;
mod document;

pub use chat::{ChatOutcome, ChatPrompt, ChatService};
pub use document::{DocumentService, IngestedFile};
