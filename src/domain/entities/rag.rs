use serde::{Deserialize, Serialize};

use crate::domain::entities::SearchResult;
use crate::domain::errors::{DomainError, Result};

// `included_docs` counts the documents that cleared the similarity
// threshold out of `total_found` returned by the search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagContext {
    pub context: String,
    pub sources: Vec<SearchResult>,
    pub included_docs: usize,
    pub total_found: usize,
}

impl RagContext {
    pub fn new(
        context: String,
        sources: Vec<SearchResult>,
        included_docs: usize,
        total_found: usize,
    ) -> Result<Self> {
        if included_docs > total_found {
            return Err(DomainError::internal(
                "included docs cannot exceed total found",
            ));
        }
        Ok(Self {
            context,
            sources,
            included_docs,
            total_found,
        })
    }

    pub fn empty() -> Self {
        Self {
            context: String::new(),
            sources: Vec::new(),
            included_docs: 0,
            total_found: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context.is_empty()
    }
}
