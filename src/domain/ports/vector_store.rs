use async_trait::async_trait;

use crate::domain::{errors::DomainError, CollectionStats, Document, Metadata, SearchResult};

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<String>, DomainError>;

    // `filter` is an equality match on metadata fields.
    async fn search(
        &self,
        query: &str,
        n_results: usize,
        min_score: Option<f32>,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, DomainError>;

    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), DomainError>;

    async fn delete(&self, id: &str) -> Result<(), DomainError>;

    async fn list(&self) -> Result<Vec<Document>, DomainError>;

    async fn stats(&self) -> Result<CollectionStats, DomainError>;

    async fn reset(&self) -> Result<(), DomainError>;

    async fn heartbeat(&self) -> Result<(), DomainError>;
}
