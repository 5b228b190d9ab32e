use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn default_metadata() -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(
            "timestamp".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
        metadata
    }

    pub fn preview(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            self.content.clone()
        } else {
            let truncated: String = self.content.chars().take(max_chars).collect();
            format!("{truncated}...")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Document,
    // Similarity in [0, 1]; 1 is an exact match.
    pub score: f32,
    pub rank: usize,
}

impl SearchResult {
    pub fn new(document: Document, score: f32, rank: usize) -> Self {
        Self {
            document,
            score: score.clamp(0.0, 1.0),
            rank,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    pub collection_name: String,
}
