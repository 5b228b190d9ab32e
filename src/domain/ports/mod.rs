mod conversation_store;
mod llm;
mod vector_store;

pub use conversation_store::ConversationStore;
pub use llm::LlmService;
pub use vector_store::VectorStore;
