use async_trait::async_trait;

use crate::domain::{errors::DomainError, Conversation};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError>;
    async fn get(&self, id: &str) -> Result<Option<Conversation>, DomainError>;
    // Returns false when the id was unknown.
    async fn delete(&self, id: &str) -> Result<bool, DomainError>;
}
