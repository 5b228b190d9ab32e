use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config, Pool, Runtime};
use tracing::debug;

use crate::domain::{ports::ConversationStore, Conversation, DomainError};

pub type RedisPool = Pool;

pub fn create_pool(redis_url: &str) -> Result<RedisPool, DomainError> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| DomainError::internal(format!("Redis pool error: {e}")))
}

fn conversation_key(id: &str) -> String {
    format!("conversation:{id}")
}

// Entries are JSON values expiring after the configured TTL; concurrent
// saves to one id are last-writer-wins.
pub struct RedisConversationStore {
    pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisConversationStore {
    pub fn new(pool: RedisPool, ttl_seconds: u64) -> Self {
        Self { pool, ttl_seconds }
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, DomainError> {
        self.pool
            .get()
            .await
            .map_err(|e| DomainError::upstream(format!("Redis unavailable: {e}")))
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let payload = serde_json::to_string(conversation)
            .map_err(|e| DomainError::internal(format!("conversation encode failed: {e}")))?;

        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(conversation_key(&conversation.id), payload, self.ttl_seconds)
            .await
            .map_err(|e| DomainError::upstream(format!("Redis error: {e}")))?;

        debug!(conversation_id = %conversation.id, "conversation saved");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Conversation>, DomainError> {
        let mut conn = self.conn().await?;
        let payload: Option<String> = conn
            .get(conversation_key(id))
            .await
            .map_err(|e| DomainError::upstream(format!("Redis error: {e}")))?;

        payload
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| DomainError::internal(format!("conversation decode failed: {e}")))
            })
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, DomainError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .del(conversation_key(id))
            .await
            .map_err(|e| DomainError::upstream(format!("Redis error: {e}")))?;

        Ok(removed > 0)
    }
}
