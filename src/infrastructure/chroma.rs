use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::{
    ports::VectorStore, CollectionStats, Document, DomainError, Metadata, SearchResult,
};
use crate::infrastructure::config::ChromaConfig;

// Embeddings are computed server-side; documents and query texts travel
// over the wire, never raw vectors. Chroma reports cosine distance (lower
// is closer), mapped here to a similarity score in [0, 1].
pub struct ChromaVectorStore {
    http: reqwest::Client,
    base_url: String,
    collection_name: String,
    // Chroma addresses data routes by collection id, which changes on reset.
    collection_id: RwLock<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    documents: Option<Vec<Vec<Option<String>>>>,
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    distances: Option<Vec<Vec<f32>>>,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    documents: Option<Vec<Option<String>>>,
    metadatas: Option<Vec<Option<Metadata>>>,
}

#[derive(Debug, Serialize)]
struct AddPayload {
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<Metadata>,
}

impl ChromaVectorStore {
    pub async fn connect(config: &ChromaConfig) -> Result<Self, DomainError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DomainError::internal(format!("failed to build HTTP client: {e}")))?;

        let store = Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection_name: config.collection.clone(),
            collection_id: RwLock::new(String::new()),
        };

        let id = store.ensure_collection().await?;
        *store.collection_id.write().await = id;
        info!(
            url = %store.base_url,
            collection = %store.collection_name,
            "connected to ChromaDB"
        );

        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<String, DomainError> {
        let body = json!({
            "name": self.collection_name,
            "metadata": {"description": "Document embeddings for RAG gateway"},
            "get_or_create": true,
        });

        let response = self
            .http
            .post(format!("{}/api/v1/collections", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let info: CollectionInfo = expect_success(response, "create collection")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid collection response: {e}")))?;

        Ok(info.id)
    }

    async fn data_url(&self, suffix: &str) -> String {
        let id = self.collection_id.read().await;
        format!("{}/api/v1/collections/{}/{}", self.base_url, *id, suffix)
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn add(&self, documents: Vec<Document>) -> Result<Vec<String>, DomainError> {
        let payload = AddPayload {
            ids: documents.iter().map(|d| d.id.clone()).collect(),
            documents: documents.iter().map(|d| d.content.clone()).collect(),
            metadatas: documents.into_iter().map(|d| d.metadata).collect(),
        };

        let response = self
            .http
            .post(self.data_url("add").await)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;
        expect_success(response, "add documents").await?;

        debug!(count = payload.ids.len(), "documents added to collection");
        Ok(payload.ids)
    }

    async fn search(
        &self,
        query: &str,
        n_results: usize,
        min_score: Option<f32>,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let mut body = json!({
            "query_texts": [query],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        if let Some(filter) = filter {
            body["where"] = serde_json::Value::Object(filter.clone());
        }

        let response = self
            .http
            .post(self.data_url("query").await)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: QueryResponse = expect_success(response, "search")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid query response: {e}")))?;

        let ids = parsed.ids.into_iter().next().unwrap_or_default();
        let documents = parsed
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = parsed
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let distances = parsed
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let results = collect_results(ids, documents, metadatas, distances, min_score);
        debug!(returned = results.len(), "similarity search completed");
        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, DomainError> {
        let body = json!({"ids": [id], "include": ["documents", "metadatas"]});
        let response = self
            .http
            .post(self.data_url("get").await)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: GetResponse = expect_success(response, "get document")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid get response: {e}")))?;

        let Some(found_id) = parsed.ids.into_iter().next() else {
            return Ok(None);
        };
        let content = parsed
            .documents
            .and_then(|d| d.into_iter().next())
            .flatten()
            .unwrap_or_default();
        let metadata = parsed
            .metadatas
            .and_then(|m| m.into_iter().next())
            .flatten()
            .unwrap_or_default();

        Ok(Some(
            Document::new(content).with_id(found_id).with_metadata(metadata),
        ))
    }

    async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), DomainError> {
        let mut body = json!({"ids": [id], "documents": [content]});
        if let Some(metadata) = metadata {
            body["metadatas"] = json!([metadata]);
        }

        let response = self
            .http
            .post(self.data_url("update").await)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        expect_success(response, "update document").await?;

        debug!(document_id = id, "document updated");
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), DomainError> {
        let body = json!({"ids": [id]});
        let response = self
            .http
            .post(self.data_url("delete").await)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        expect_success(response, "delete document").await?;

        debug!(document_id = id, "document deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Document>, DomainError> {
        let body = json!({"include": ["documents", "metadatas"]});
        let response = self
            .http
            .post(self.data_url("get").await)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let parsed: GetResponse = expect_success(response, "list documents")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid get response: {e}")))?;

        let documents = parsed.documents.unwrap_or_default();
        let metadatas = parsed.metadatas.unwrap_or_default();

        Ok(parsed
            .ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let content = documents.get(i).cloned().flatten().unwrap_or_default();
                let metadata = metadatas.get(i).cloned().flatten().unwrap_or_default();
                Document::new(content).with_id(id).with_metadata(metadata)
            })
            .collect())
    }

    async fn stats(&self) -> Result<CollectionStats, DomainError> {
        let response = self
            .http
            .get(self.data_url("count").await)
            .send()
            .await
            .map_err(map_transport_error)?;
        let count: usize = expect_success(response, "count")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::upstream(format!("invalid count response: {e}")))?;

        Ok(CollectionStats {
            total_documents: count,
            collection_name: self.collection_name.clone(),
        })
    }

    async fn reset(&self) -> Result<(), DomainError> {
        let response = self
            .http
            .delete(format!(
                "{}/api/v1/collections/{}",
                self.base_url, self.collection_name
            ))
            .send()
            .await
            .map_err(map_transport_error)?;
        expect_success(response, "delete collection").await?;

        let id = self.ensure_collection().await?;
        *self.collection_id.write().await = id;

        info!(collection = %self.collection_name, "collection reset");
        Ok(())
    }

    async fn heartbeat(&self) -> Result<(), DomainError> {
        let response = self
            .http
            .get(format!("{}/api/v1/heartbeat", self.base_url))
            .send()
            .await
            .map_err(map_transport_error)?;
        expect_success(response, "heartbeat").await?;
        Ok(())
    }
}

// Ranks are assigned after the `min_score` cut so they stay contiguous.
fn collect_results(
    ids: Vec<String>,
    documents: Vec<Option<String>>,
    metadatas: Vec<Option<Metadata>>,
    distances: Vec<f32>,
    min_score: Option<f32>,
) -> Vec<SearchResult> {
    let mut results = Vec::with_capacity(ids.len());
    for (i, id) in ids.into_iter().enumerate() {
        let content = documents.get(i).cloned().flatten().unwrap_or_default();
        let metadata = metadatas.get(i).cloned().flatten().unwrap_or_default();
        let distance = distances.get(i).copied().unwrap_or(0.0);
        let score = 1.0 - distance;

        if let Some(min) = min_score {
            if score < min {
                continue;
            }
        }

        let rank = results.len();
        results.push(SearchResult::new(
            Document::new(content).with_id(id).with_metadata(metadata),
            score,
            rank,
        ));
    }
    results
}

fn map_transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::timeout(format!("ChromaDB request timed out: {e}"))
    } else {
        DomainError::upstream(format!("ChromaDB unreachable: {e}"))
    }
}

async fn expect_success(
    response: reqwest::Response,
    operation: &str,
) -> Result<reqwest::Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        Err(DomainError::not_found(format!(
            "ChromaDB {operation} failed: {detail}"
        )))
    } else {
        Err(DomainError::upstream(format!(
            "ChromaDB {operation} failed ({status}): {detail}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> (Vec<String>, Vec<Option<String>>, Vec<Option<Metadata>>) {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let documents = vec![
            Some("first".to_string()),
            Some("second".to_string()),
            Some("third".to_string()),
        ];
        let metadatas = vec![None, None, None];
        (ids, documents, metadatas)
    }

    #[test]
    fn test_ranks_stay_contiguous_after_score_cut() {
        let (ids, documents, metadatas) = rows();
        // The middle row falls below the score floor.
        let distances = vec![0.1, 0.9, 0.3];

        let results = collect_results(ids, documents, metadatas, distances, Some(0.5));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[0].rank, 0);
        assert_eq!(results[1].document.id, "c");
        assert_eq!(results[1].rank, 1);
    }

    #[test]
    fn test_distance_maps_to_similarity() {
        let (ids, documents, metadatas) = rows();
        let distances = vec![0.0, 0.25, 1.5];

        let results = collect_results(ids, documents, metadatas, distances, None);

        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.75);
        // Distances above 1 clamp to zero similarity.
        assert_eq!(results[2].score, 0.0);
    }

    #[test]
    fn test_missing_columns_default_empty() {
        let ids = vec!["a".to_string()];
        let results = collect_results(ids, vec![], vec![], vec![], None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "");
        assert_eq!(results[0].score, 1.0);
    }
}
