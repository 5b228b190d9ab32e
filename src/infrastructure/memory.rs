use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::{
    ports::{ConversationStore, VectorStore},
    CollectionStats, Conversation, Document, DomainError, Metadata, SearchResult,
};

// Without an embedding model, similarity is token-overlap (Jaccard) over
// lowercased words, which keeps scores in [0, 1] like the real store.
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<Document>>,
    collection_name: String,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            collection_name: "documents".to_string(),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<String>, DomainError> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        for doc in documents {
            store.retain(|d| d.id != doc.id);
            store.push(doc);
        }
        Ok(ids)
    }

    async fn search(
        &self,
        query: &str,
        n_results: usize,
        min_score: Option<f32>,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let store = self
            .documents
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let query_tokens = tokens(query);
        let mut scored: Vec<(Document, f32)> = store
            .iter()
            .filter(|d| filter.map_or(true, |f| matches_filter(&d.metadata, f)))
            .map(|d| (d.clone(), jaccard(&query_tokens, &tokens(&d.content))))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(n_results)
            .filter(|(_, score)| min_score.map_or(true, |min| *score >= min))
            .enumerate()
            .map(|(rank, (doc, score))| SearchResult::new(doc, score, rank))
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, DomainError> {
        let store = self
            .documents
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(store.iter().find(|d| d.id == id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), DomainError> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let doc = store
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| DomainError::not_found(format!("Document with ID '{id}' not found")))?;

        doc.content = content.to_string();
        if let Some(metadata) = metadata {
            doc.metadata = metadata;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        store.retain(|d| d.id != id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Document>, DomainError> {
        let store = self
            .documents
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(store.clone())
    }

    async fn stats(&self) -> Result<CollectionStats, DomainError> {
        let store = self
            .documents
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(CollectionStats {
            total_documents: store.len(),
            collection_name: self.collection_name.clone(),
        })
    }

    async fn reset(&self) -> Result<(), DomainError> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        store.clear();
        Ok(())
    }

    async fn heartbeat(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

// Ignores TTL.
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<(), DomainError> {
        let mut store = self
            .conversations
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        store.insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Conversation>, DomainError> {
        let store = self
            .conversations
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(store.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, DomainError> {
        let mut store = self
            .conversations
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(store.remove(id).is_some())
    }
}
