//! In-memory collaborator doubles shared by the rag test modules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::errors::ApiError;
use crate::llm::{GenerateRequest, LlmProvider};
use crate::search::{SearchResult, WebSearch};
use crate::store::{SearchHit, StoredChunk, VectorStore};

/// Scripted language model: pops one canned generation per call.
pub(crate) struct MockLlm {
    generations: Mutex<VecDeque<Result<String, ApiError>>>,
    fail_embed: bool,
    hang: bool,
}

impl MockLlm {
    pub fn new(generations: Vec<Result<String, ApiError>>) -> Self {
        Self {
            generations: Mutex::new(generations.into()),
            fail_embed: false,
            hang: false,
        }
    }

    /// Every call fails as if the provider were unreachable.
    pub fn failing() -> Self {
        Self {
            generations: Mutex::new(VecDeque::new()),
            fail_embed: true,
            hang: false,
        }
    }

    /// `generate` never returns; used with a paused clock to exercise the
    /// caller-side timeout.
    pub fn hanging() -> Self {
        Self {
            generations: Mutex::new(VecDeque::new()),
            fail_embed: false,
            hang: true,
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(!self.fail_embed)
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<String, ApiError> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(86_400)).await;
        }
        if self.fail_embed {
            return Err(ApiError::Unavailable("mock provider down".to_string()));
        }
        self.generations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if self.fail_embed {
            return Err(ApiError::Unavailable("mock provider down".to_string()));
        }
        Ok(inputs.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// Web search double with a fixed result set and a canned `run` blob.
pub(crate) struct MockWeb {
    results: Vec<SearchResult>,
    blob: Option<String>,
    fail: bool,
    searches: AtomicUsize,
}

impl MockWeb {
    pub fn counting() -> Self {
        Self {
            results: Vec::new(),
            blob: None,
            fail: false,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn with_blob(blob: &str) -> Self {
        Self {
            results: Vec::new(),
            blob: Some(blob.to_string()),
            fail: false,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            results: Vec::new(),
            blob: None,
            fail: true,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for MockWeb {
    async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, ApiError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ApiError::Unavailable("mock search down".to_string()));
        }
        Ok(self.results.clone())
    }

    async fn run(&self, _query: &str) -> Result<String, ApiError> {
        if self.fail {
            return Err(ApiError::Unavailable("mock search down".to_string()));
        }
        Ok(self.blob.clone().unwrap_or_default())
    }
}

/// Vector store double: a Vec behind a mutex, cosine-scored like the real
/// store, keyed by chunk_id so re-insertion replaces in place.
#[derive(Default)]
pub(crate) struct MemoryStore {
    items: Mutex<Vec<(StoredChunk, Vec<f32>)>>,
}

impl MemoryStore {
    pub async fn put(&self, text: &str, source: &str, embedding: Vec<f32>) {
        let chunk = StoredChunk::from_content(text, source);
        self.add(vec![(chunk, embedding)]).await.unwrap();
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, new_items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        let mut items = self.items.lock().unwrap();
        for (chunk, embedding) in new_items {
            items.retain(|(existing, _)| existing.chunk_id != chunk.chunk_id);
            items.push((chunk, embedding));
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, ApiError> {
        let items = self.items.lock().unwrap();
        let mut hits: Vec<SearchHit> = items
            .iter()
            .map(|(chunk, embedding)| SearchHit {
                chunk: chunk.clone(),
                score: cosine(query_embedding, embedding),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k.max(1));
        Ok(hits)
    }

    async fn persist(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn count(&self) -> Result<usize, ApiError> {
        Ok(self.items.lock().unwrap().len())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
