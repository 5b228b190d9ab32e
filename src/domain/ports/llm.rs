use async_trait::async_trait;

use crate::domain::errors::DomainError;

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, DomainError>;
    async fn generate_with_system(&self, system: &str, prompt: &str)
        -> Result<String, DomainError>;
}
