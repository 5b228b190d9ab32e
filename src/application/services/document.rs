use std::sync::Arc;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::{
    ports::VectorStore, CollectionStats, Document, DomainError, Metadata, RagContext, SearchResult,
};
use crate::infrastructure::extract::{ExtractedFile, FileProcessor};

#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub document_id: String,
    pub filename: String,
    pub text_length: usize,
    pub metadata: Metadata,
}

pub struct DocumentService {
    store: Arc<dyn VectorStore>,
    processor: FileProcessor,
    similarity_threshold: f32,
}

impl DocumentService {
    pub fn new(store: Arc<dyn VectorStore>, similarity_threshold: f32) -> Self {
        Self {
            store,
            processor: FileProcessor::new(),
            similarity_threshold,
        }
    }

    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    #[instrument(skip(self, documents, metadatas, ids), fields(count = documents.len()))]
    pub async fn add_documents(
        &self,
        documents: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<(Vec<String>, bool), DomainError> {
        if documents.is_empty() {
            return Err(DomainError::validation("No documents provided"));
        }
        if documents.iter().any(|d| d.trim().is_empty()) {
            return Err(DomainError::validation("Documents cannot be empty"));
        }
        if let Some(metadatas) = &metadatas {
            if metadatas.len() != documents.len() {
                return Err(DomainError::validation(
                    "metadatas length must match documents length",
                ));
            }
        }
        if let Some(ids) = &ids {
            if ids.len() != documents.len() {
                return Err(DomainError::validation(
                    "ids length must match documents length",
                ));
            }
        }

        let auto_generated = ids.is_none();
        let mut entries = Vec::with_capacity(documents.len());
        for (i, content) in documents.into_iter().enumerate() {
            let metadata = metadatas
                .as_ref()
                .map(|m| flatten_metadata(m[i].clone()))
                .unwrap_or_else(Document::default_metadata);

            let mut doc = Document::new(content).with_metadata(metadata);
            if let Some(ids) = &ids {
                doc = doc.with_id(ids[i].clone());
            }
            entries.push(doc);
        }

        let stored = self.store.add(entries).await?;
        Ok((stored, auto_generated))
    }

    #[instrument(skip(self, filter))]
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        min_score: Option<f32>,
        filter: Option<&Metadata>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::validation("Query cannot be empty"));
        }
        self.store.search(query, n_results, min_score, filter).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Document, DomainError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Document with ID '{id}' not found")))
    }

    #[instrument(skip(self, content, metadata))]
    pub async fn update(
        &self,
        id: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), DomainError> {
        if content.trim().is_empty() {
            return Err(DomainError::validation("Document content cannot be empty"));
        }
        // The vector store upserts on unknown ids; check first so updates to
        // missing documents surface as 404s.
        self.get(id).await?;
        self.store
            .update(id, content, metadata.map(flatten_metadata))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), DomainError> {
        self.get(id).await?;
        self.store.delete(id).await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Document>, DomainError> {
        self.store.list().await
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<CollectionStats, DomainError> {
        self.store.stats().await
    }

    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<(), DomainError> {
        self.store.reset().await
    }

    // Caller-provided metadata is merged under the extraction metadata.
    #[instrument(skip(self, bytes, metadata), fields(size = bytes.len()))]
    pub async fn ingest_file(
        &self,
        filename: &str,
        bytes: &[u8],
        metadata: Option<Metadata>,
    ) -> Result<IngestedFile, DomainError> {
        let ExtractedFile {
            content,
            metadata: mut enriched,
        } = self.processor.process(filename, bytes)?;

        if content.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "Failed to process document '{filename}': no text content extracted"
            )));
        }

        if let Some(extra) = metadata {
            for (key, value) in flatten_metadata(extra) {
                enriched.entry(key).or_insert(value);
            }
        }

        let text_length = content.len();
        let (ids, _) = self
            .add_documents(vec![content], Some(vec![enriched.clone()]), None)
            .await?;

        Ok(IngestedFile {
            document_id: ids.into_iter().next().unwrap_or_default(),
            filename: filename.to_string(),
            text_length,
            metadata: enriched,
        })
    }

    // A failing search degrades to an empty context rather than failing
    // the chat.
    #[instrument(skip(self))]
    pub async fn rag_context(&self, query: &str, max_docs: usize) -> RagContext {
        let results = match self.store.search(query, max_docs, None, None).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "RAG retrieval failed, continuing without context");
                return RagContext::empty();
            }
        };

        let total_found = results.len();
        let included: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.score >= self.similarity_threshold)
            .collect();

        let context = included
            .iter()
            .map(|r| {
                let source = r
                    .document
                    .metadata
                    .get("filename")
                    .and_then(Value::as_str)
                    .unwrap_or(&r.document.id);
                format!("[source: {source}]\n{}", r.document.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let included_docs = included.len();
        RagContext::new(context, included, included_docs, total_found)
            .unwrap_or_else(|_| RagContext::empty())
    }
}

// The vector store only accepts scalar metadata values; anything richer
// is stringified.
fn flatten_metadata(metadata: Metadata) -> Metadata {
    metadata
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => (key, value),
            other => (key, Value::String(other.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::InMemoryVectorStore;
    use serde_json::json;

    fn service() -> DocumentService {
        DocumentService::new(Arc::new(InMemoryVectorStore::new()), 0.2)
    }

    #[tokio::test]
    async fn test_add_then_search_finds_document() {
        let service = service();
        let mut metadata = Metadata::new();
        metadata.insert("category".into(), "programming".into());

        let (ids, auto) = service
            .add_documents(
                vec!["Python is a programming language".into()],
                Some(vec![metadata]),
                None,
            )
            .await
            .unwrap();
        assert!(auto);

        let results = service
            .search("What is Python?", 3, None, None)
            .await
            .unwrap();
        assert!(results.iter().any(|r| r.document.id == ids[0]));
    }

    #[tokio::test]
    async fn test_custom_ids_are_kept() {
        let service = service();
        let (ids, auto) = service
            .add_documents(
                vec!["first".into(), "second".into()],
                None,
                Some(vec!["id-1".into(), "id-2".into()]),
            )
            .await
            .unwrap();
        assert!(!auto);
        assert_eq!(ids, vec!["id-1", "id-2"]);
    }

    #[tokio::test]
    async fn test_empty_documents_rejected() {
        let service = service();
        let err = service.add_documents(vec![], None, None).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mismatched_metadata_length_rejected() {
        let service = service();
        let err = service
            .add_documents(vec!["a".into(), "b".into()], Some(vec![Metadata::new()]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_default_metadata_gets_timestamp() {
        let service = service();
        let (ids, _) = service
            .add_documents(vec!["content".into()], None, None)
            .await
            .unwrap();
        let doc = service.get(&ids[0]).await.unwrap();
        assert!(doc.metadata.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_deleted_document_gone_from_get_and_search() {
        let service = service();
        let (ids, _) = service
            .add_documents(vec!["disposable text".into()], None, None)
            .await
            .unwrap();

        service.delete(&ids[0]).await.unwrap();

        assert!(matches!(
            service.get(&ids[0]).await.unwrap_err(),
            DomainError::NotFound(_)
        ));
        let results = service
            .search("disposable text", 10, None, None)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.document.id != ids[0]));
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_found() {
        let service = service();
        assert!(matches!(
            service.delete("missing").await.unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_flatten_metadata_stringifies_nested_values() {
        let mut metadata = Metadata::new();
        metadata.insert("plain".into(), json!("kept"));
        metadata.insert("count".into(), json!(3));
        metadata.insert("nested".into(), json!({"a": 1}));

        let flattened = flatten_metadata(metadata);
        assert_eq!(flattened["plain"], "kept");
        assert_eq!(flattened["count"], 3);
        assert!(flattened["nested"].is_string());
    }

    #[tokio::test]
    async fn test_rag_context_below_threshold_is_empty() {
        let service = service();
        service
            .add_documents(vec!["quantum entanglement research".into()], None, None)
            .await
            .unwrap();

        let ctx = service.rag_context("completely unrelated cooking recipe", 3).await;
        assert!(ctx.is_empty());
        assert_eq!(ctx.included_docs, 0);
        assert_eq!(ctx.total_found, 1);
    }

    #[tokio::test]
    async fn test_rag_context_tags_sources() {
        let service = service();
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), "guide.txt".into());
        service
            .add_documents(
                vec!["Python is a programming language".into()],
                Some(vec![metadata]),
                None,
            )
            .await
            .unwrap();

        let ctx = service.rag_context("What is Python?", 3).await;
        assert_eq!(ctx.included_docs, 1);
        assert!(ctx.context.contains("[source: guide.txt]"));
        assert!(ctx.context.contains("Python is a programming language"));
    }

    #[tokio::test]
    async fn test_ingest_file_merges_metadata() {
        let service = service();
        let mut extra = Metadata::new();
        extra.insert("source".into(), "unit-test".into());

        let ingested = service
            .ingest_file("notes.txt", b"Rust is a systems language", Some(extra))
            .await
            .unwrap();

        let doc = service.get(&ingested.document_id).await.unwrap();
        assert_eq!(doc.metadata["filename"], "notes.txt");
        assert_eq!(doc.metadata["source"], "unit-test");
        assert_eq!(doc.content, "Rust is a systems language");
    }

    #[tokio::test]
    async fn test_ingest_unsupported_file_rejected() {
        let service = service();
        let err = service
            .ingest_file("malware.exe", b"MZ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(err.to_string().contains("Unsupported file type"));
    }
}
