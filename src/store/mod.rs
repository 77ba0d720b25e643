//! Vector store — persistence for embedded document chunks.
//!
//! The core consumes storage through the [`VectorStore`] trait; the shipped
//! implementation is [`SqliteVectorStore`]. Chunk identifiers are content
//! hashes, so adding the same text from the same source twice overwrites in
//! place instead of accumulating duplicates.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::ApiError;

pub use sqlite::SqliteVectorStore;

/// A persisted chunk with its origin attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Content hash of (source, text). Stable across re-ingestion.
    pub chunk_id: String,
    pub text: String,
    /// Origin document identifier. Never empty.
    pub source: String,
}

impl StoredChunk {
    pub fn from_content(text: &str, source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        let chunk_id = hex::encode(hasher.finalize());

        Self {
            chunk_id,
            text: text.to_string(),
            source: source.to_string(),
        }
    }
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// Narrow storage interface consumed by the retrieval core.
///
/// `add` followed by `search` from the same caller must observe the new
/// chunks (read-after-write within the process), and each operation is
/// atomic — no partially visible chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert chunks with their embedding vectors. Idempotent per content.
    async fn add(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError>;

    /// Return the `top_k` chunks most similar to the query embedding.
    async fn search(&self, query_embedding: &[f32], top_k: usize)
        -> Result<Vec<SearchHit>, ApiError>;

    /// Flush to durable storage.
    async fn persist(&self) -> Result<(), ApiError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, ApiError>;
}
