pub mod chroma;
pub mod config;
pub mod extract;
pub mod gemini;
pub mod memory;
pub mod redis_store;

pub use chroma::ChromaVectorStore;
pub use config::AppConfig;
pub use extract::{ExtractedFile, FileProcessor, MAX_DOCUMENT_BYTES, MAX_IMAGE_BYTES};
pub use gemini::GeminiLlm;
pub use memory::{InMemoryConversationStore, InMemoryVectorStore};
pub use redis_store::{create_pool, RedisConversationStore, RedisPool};
