//! Index boundary for retrieval.
//!
//! The pipeline hands finished chunks to a [`VectorIndex`] and asks questions
//! back through it; which vector database sits behind the trait is the
//! caller's business. [`MemoryIndex`] is the in-process implementation used
//! by the CLI and tests: brute-force keyword-overlap scoring over a
//! `RwLock`'d entry list, with metadata filters applied before ranking.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{ContractChunk, Metadata};

/// One indexable unit: chunk text plus flattened metadata.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// SHA-256 of the text; used for dedup on re-ingest.
    pub content_hash: String,
}

/// A query hit with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f64,
}

/// Metadata predicate for queries: exact-match equality plus numeric range
/// bounds. Monetary chunk metadata is stored as JSON numbers precisely so
/// the range bounds work.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: BTreeMap<String, serde_json::Value>,
    pub gte: BTreeMap<String, f64>,
    pub lte: BTreeMap<String, f64>,
}

impl MetadataFilter {
    pub fn equals(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.equals.insert(key.to_string(), value.into());
        self
    }

    pub fn gte(mut self, key: &str, bound: f64) -> Self {
        self.gte.insert(key.to_string(), bound);
        self
    }

    pub fn lte(mut self, key: &str, bound: f64) -> Self {
        self.lte.insert(key.to_string(), bound);
        self
    }

    /// A filter matches when every predicate holds. A range bound on a
    /// missing or non-numeric field fails the entry.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        for (key, expected) in &self.equals {
            if metadata.get(key) != Some(expected) {
                return false;
            }
        }
        for (key, bound) in &self.gte {
            match metadata.get(key).and_then(|v| v.as_f64()) {
                Some(actual) if actual >= *bound => {}
                _ => return false,
            }
        }
        for (key, bound) in &self.lte {
            match metadata.get(key).and_then(|v| v.as_f64()) {
                Some(actual) if actual <= *bound => {}
                _ => return false,
            }
        }
        true
    }
}

/// The indexing collaborator boundary.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add entries, skipping any whose content hash is already present.
    /// Returns the number actually added.
    async fn add_documents(&self, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Rank stored entries against a query, restricted to entries passing
    /// the filter.
    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>>;

    /// Total stored entries.
    async fn len(&self) -> Result<usize>;
}

/// In-memory index for the CLI and tests.
pub struct MemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add_documents(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let mut stored = self.entries.write().unwrap();
        let mut added = 0;
        for entry in entries {
            if stored.iter().any(|e| e.content_hash == entry.content_hash) {
                continue;
            }
            stored.push(entry);
            added += 1;
        }
        Ok(added)
    }

    async fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>> {
        let query_lower = text.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self.entries.read().unwrap();
        let mut hits: Vec<ScoredEntry> = stored
            .iter()
            .filter(|entry| filter.map(|f| f.matches(&entry.metadata)).unwrap_or(true))
            .filter_map(|entry| {
                let text_lower = entry.text.to_lowercase();
                let matches = terms.iter().filter(|t| text_lower.contains(*t)).count();
                if matches > 0 {
                    Some(ScoredEntry {
                        entry: entry.clone(),
                        score: matches as f64 / terms.len() as f64,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().unwrap().len())
    }
}

/// Map finished chunks to index entries. Chunk identity fields join the
/// propagated contract metadata so filters can address either level.
pub fn chunks_to_entries(chunks: &[ContractChunk]) -> Vec<IndexEntry> {
    chunks
        .iter()
        .map(|chunk| {
            let mut metadata = chunk.metadata.clone();
            metadata.insert(
                "contract_number".to_string(),
                serde_json::json!(chunk.contract_number),
            );
            metadata.insert("section".to_string(), serde_json::json!(chunk.section.as_str()));
            metadata.insert(
                "chunk_type".to_string(),
                serde_json::json!(chunk.chunk_type.as_str()),
            );
            if let Some(number) = &chunk.clause_number {
                metadata.insert("clause_number".to_string(), serde_json::json!(number));
            }
            if let Some(title) = &chunk.clause_title {
                metadata.insert("clause_title".to_string(), serde_json::json!(title));
            }

            IndexEntry {
                id: Uuid::new_v4().to_string(),
                content_hash: format!("{:x}", Sha256::digest(chunk.text.as_bytes())),
                text: chunk.text.clone(),
                metadata,
            }
        })
        .collect()
}
