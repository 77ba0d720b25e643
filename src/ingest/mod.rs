//! Batch document ingestion.
//!
//! Out-of-band pipeline feeding the vector store: walk a directory, load
//! each file through an extension-keyed loader registry, split into chunks,
//! embed in batches, and insert. Unknown extensions and unreadable files are
//! reported and skipped, never fatal for the batch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::IngestConfig;
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;
use crate::rag::chunker::split_text;
use crate::rag::types::Chunk;
use crate::store::{StoredChunk, VectorStore};

/// Loads one file into whole-document chunks. Splitting into retrieval-size
/// pieces happens later in the pipeline.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Chunk>, ApiError>;
}

/// Reads a file as UTF-8 text, attributing it to its file name.
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, path: &Path) -> Result<Vec<Chunk>, ApiError> {
        let text = std::fs::read_to_string(path).map_err(ApiError::internal)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Chunk {
            text,
            source: file_name_of(path),
            start_offset: 0,
            chunk_index: 0,
        }])
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Extension → loader mapping. Lookup is case-insensitive on the extension.
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry covering the plain-text formats this build understands.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let text_loader: Arc<dyn DocumentLoader> = Arc::new(PlainTextLoader);
        for ext in ["txt", "md", "csv", "log"] {
            registry.register(ext, text_loader.clone());
        }
        registry
    }

    pub fn register(&mut self, extension: &str, loader: Arc<dyn DocumentLoader>) {
        self.loaders.insert(extension.to_lowercase(), loader);
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn DocumentLoader>> {
        self.loaders.get(&extension.to_lowercase())
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub skipped: Vec<SkippedFile>,
}

pub struct Ingestor {
    registry: LoaderRegistry,
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStore>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        registry: LoaderRegistry,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        config: IngestConfig,
    ) -> Self {
        Self {
            registry,
            llm,
            store,
            config,
        }
    }

    /// Ingest every supported file directly under `docs_dir`.
    pub async fn ingest_dir(&self, docs_dir: &Path) -> Result<IngestReport, ApiError> {
        let entries = std::fs::read_dir(docs_dir)
            .map_err(|e| ApiError::BadRequest(format!("cannot read {}: {}", docs_dir.display(), e)))?;

        let mut report = IngestReport::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let file = file_name_of(&path);
            let extension = path
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
                .unwrap_or_default();

            let Some(loader) = self.registry.get(&extension) else {
                tracing::warn!("Unsupported file type: {} (extension: {:?})", file, extension);
                report.skipped.push(SkippedFile {
                    file,
                    reason: format!("unsupported extension {:?}", extension),
                });
                continue;
            };

            match loader.load(&path) {
                Ok(documents) => {
                    tracing::info!("Processing: {}", file);
                    report.files_processed += 1;
                    for document in documents {
                        chunks.extend(split_text(
                            &document.text,
                            &document.source,
                            self.config.chunk_size,
                            self.config.chunk_overlap,
                            self.config.max_chunks_per_doc,
                        ));
                    }
                }
                Err(err) => {
                    tracing::error!("Failed to process {}: {}", file, err);
                    report.skipped.push(SkippedFile {
                        file,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if chunks.is_empty() {
            tracing::warn!("No valid documents found to ingest");
            return Ok(report);
        }

        report.chunks_indexed = self.index_chunks(&chunks).await?;
        self.store.persist().await?;

        tracing::info!(
            "Ingest complete: {} chunks from {} files ({} skipped)",
            report.chunks_indexed,
            report.files_processed,
            report.skipped.len()
        );

        Ok(report)
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize, ApiError> {
        let mut indexed = 0;

        for batch in chunks.chunks(self.config.embed_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.llm.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "embedding count mismatch: {} != {}",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let items: Vec<(StoredChunk, Vec<f32>)> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| {
                    (
                        StoredChunk::from_content(&chunk.text, &chunk.source),
                        embedding,
                    )
                })
                .collect();

            indexed += items.len();
            self.store.add(items).await?;
        }

        Ok(indexed)
    }
}
