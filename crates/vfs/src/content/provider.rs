//! ContentProvider trait for initial content of new entries.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{VfsError, VfsResult};

/// One search result: a title and the link it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Human readable title.
    pub title: String,
    /// Target URL or reference.
    pub link: String,
}

impl SearchHit {
    /// Create a hit.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Source of initial content for directories and files created outside the
/// root.
///
/// Implement this trait to plug in a search backend.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Look up `query` within `context`.
    ///
    /// # Arguments
    /// * `context` - Ancestor segments joined by the configured separator
    /// * `query` - Search term
    ///
    /// # Returns
    /// Hits in ranking order; may be empty.
    async fn search(&self, context: &str, query: &str) -> Result<Vec<SearchHit>, VfsError>;
}

/// Render hits as alternating title and link lines.
pub fn render_hits(hits: &[SearchHit]) -> Vec<u8> {
    let mut out: String = String::new();
    for hit in hits {
        out.push_str(&hit.title);
        out.push('\n');
        out.push_str(&hit.link);
        out.push('\n');
    }
    out.into_bytes()
}

/// Provider answering from a fixed table keyed by query.
///
/// Unknown queries yield no hits.
#[derive(Debug, Default, Clone)]
pub struct StaticContentProvider {
    hits: HashMap<String, Vec<SearchHit>>,
}

impl StaticContentProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hits returned for `query`.
    ///
    /// # Arguments
    /// * `query` - Query string to match exactly
    /// * `hits` - Results to return
    pub fn insert(&mut self, query: impl Into<String>, hits: Vec<SearchHit>) {
        self.hits.insert(query.into(), hits);
    }

    /// Load a table from JSON of the form `{"query": [{"title": .., "link": ..}]}`.
    pub fn from_json(json: &str) -> VfsResult<Self> {
        let hits: HashMap<String, Vec<SearchHit>> = serde_json::from_str(json)
            .map_err(|e| VfsError::InvalidArgument(format!("invalid hit table: {}", e)))?;
        Ok(Self { hits })
    }

    /// Number of registered queries.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether no query is registered.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[async_trait]
impl ContentProvider for StaticContentProvider {
    async fn search(&self, _context: &str, query: &str) -> Result<Vec<SearchHit>, VfsError> {
        Ok(self.hits.get(query).cloned().unwrap_or_default())
    }
}
