use std::sync::Arc;

use crate::application::{ChatService, DocumentService};
use crate::domain::ports::VectorStore;
use crate::infrastructure::{AppConfig, RedisPool};

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentService>,
    pub chat: Arc<ChatService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub redis_pool: Option<RedisPool>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        documents: Arc<DocumentService>,
        chat: Arc<ChatService>,
        vector_store: Arc<dyn VectorStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            documents,
            chat,
            vector_store,
            redis_pool: None,
            config,
        }
    }

    pub fn with_redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }
}
