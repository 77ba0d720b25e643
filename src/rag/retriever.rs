//! Hybrid retriever: local index first, opportunistic web research second.
//!
//! Web research is a side-effecting read — pages fetched for one question
//! are chunked, embedded, and inserted into the vector store so later
//! questions hit them locally.

use std::sync::Arc;

use crate::core::config::RetrieverConfig;
use crate::llm::{ChatMessage, GenerateRequest, LlmProvider};
use crate::rag::chunker::PageChunker;
use crate::rag::types::{Chunk, RetrievedDocument};
use crate::search::WebSearch;
use crate::store::{SearchHit, StoredChunk, VectorStore};

const QUERY_DERIVATION_PROMPT: &str = "You write web search queries. Given a question, \
reply with up to three short search queries that would surface authoritative answers, \
one per line, with no numbering and no commentary.";

pub struct HybridRetriever {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn VectorStore>,
    web: Arc<dyn WebSearch>,
    chunker: PageChunker,
    config: RetrieverConfig,
}

impl HybridRetriever {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn VectorStore>,
        web: Arc<dyn WebSearch>,
        config: RetrieverConfig,
    ) -> Self {
        let chunker = PageChunker::new(&config);
        Self {
            llm,
            store,
            web,
            chunker,
            config,
        }
    }

    /// Produce the context set for one question. Never errors: every
    /// provider failure degrades to fewer documents, bottoming out at an
    /// empty set the orchestrator must tolerate.
    pub async fn retrieve(&self, question: &str) -> Vec<RetrievedDocument> {
        let query_embedding = self.embed_query(question).await;

        let local_hits = match &query_embedding {
            Some(embedding) => match self.store.search(embedding, self.config.top_k).await {
                Ok(hits) => hits,
                Err(err) => {
                    tracing::warn!("Vector store search failed: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut documents: Vec<RetrievedDocument> = local_hits
            .iter()
            .map(|hit| RetrievedDocument {
                text: hit.chunk.text.clone(),
                source: hit.chunk.source.clone(),
            })
            .collect();

        if !self.coverage_sufficient(&local_hits) {
            tracing::info!(
                "Local coverage insufficient ({} hits); researching the web",
                local_hits.len()
            );
            documents.extend(self.research(question).await);
        }

        documents.truncate(self.config.max_context_docs);
        documents
    }

    async fn embed_query(&self, question: &str) -> Option<Vec<f32>> {
        match self.llm.embed(&[question.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => Some(vectors.remove(0)),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!("Query embedding failed: {}", err);
                None
            }
        }
    }

    fn coverage_sufficient(&self, hits: &[SearchHit]) -> bool {
        hits.len() >= self.config.min_local_hits
            && hits
                .first()
                .map(|hit| hit.score >= self.config.score_threshold)
                .unwrap_or(false)
    }

    /// Search the web with derived queries, ingest the result pages into the
    /// store, and return their chunks as context documents.
    async fn research(&self, question: &str) -> Vec<RetrievedDocument> {
        let queries = self.derive_queries(question).await;

        let mut urls: Vec<String> = Vec::new();
        for query in &queries {
            match self.web.search(query).await {
                Ok(results) => {
                    for result in results {
                        if !urls.contains(&result.url) {
                            urls.push(result.url);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("Web search failed for {:?}: {}", query, err);
                }
            }
        }
        urls.truncate(self.config.max_pages);

        let mut documents = Vec::new();
        for url in &urls {
            let chunks = match self.chunker.fetch_and_chunk(url).await {
                Ok(chunks) => chunks,
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", url, err);
                    continue;
                }
            };
            if chunks.is_empty() {
                continue;
            }

            self.index_chunks(&chunks).await;
            documents.extend(chunks.into_iter().map(|chunk| RetrievedDocument {
                text: chunk.text,
                source: chunk.source,
            }));
        }

        documents
    }

    /// Ask the model for search queries; fall back to the raw question.
    async fn derive_queries(&self, question: &str) -> Vec<String> {
        let request = GenerateRequest::new(vec![
            ChatMessage::system(QUERY_DERIVATION_PROMPT),
            ChatMessage::user(question),
        ])
        .with_temperature(0.0);

        match self.llm.generate(request).await {
            Ok(text) => {
                let queries: Vec<String> = text
                    .lines()
                    .map(clean_query_line)
                    .filter(|line| !line.is_empty())
                    .take(self.config.max_web_queries)
                    .collect();

                if queries.is_empty() {
                    vec![question.to_string()]
                } else {
                    queries
                }
            }
            Err(err) => {
                tracing::warn!("Query derivation failed, using the question as-is: {}", err);
                vec![question.to_string()]
            }
        }
    }

    /// Embed and insert freshly fetched chunks. Failures leave the chunks
    /// unindexed but still usable as context for this turn.
    async fn index_chunks(&self, chunks: &[Chunk]) {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();

        let embeddings = match self.llm.embed(&texts).await {
            Ok(embeddings) => embeddings,
            Err(err) => {
                tracing::warn!("Embedding web chunks failed, leaving them unindexed: {}", err);
                return;
            }
        };
        if embeddings.len() != chunks.len() {
            tracing::warn!(
                "Embedding count mismatch ({} != {}), leaving chunks unindexed",
                embeddings.len(),
                chunks.len()
            );
            return;
        }

        let items: Vec<(StoredChunk, Vec<f32>)> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                (
                    StoredChunk::from_content(&chunk.text, &chunk.source),
                    embedding,
                )
            })
            .collect();

        if let Err(err) = self.store.add(items).await {
            tracing::warn!("Indexing web chunks failed: {}", err);
        }
    }
}

/// Strip list numbering and surrounding quotes from a model-produced query.
fn clean_query_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | '*' | ' '))
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::rag::testing::{MemoryStore, MockLlm, MockWeb};

    fn test_config() -> RetrieverConfig {
        RetrieverConfig {
            top_k: 5,
            min_local_hits: 1,
            score_threshold: 0.35,
            max_web_queries: 3,
            max_pages: 3,
            max_context_docs: 8,
            ..RetrieverConfig::default()
        }
    }

    #[test]
    fn query_lines_are_cleaned() {
        assert_eq!(clean_query_line("1. first-line hypertension"), "first-line hypertension");
        assert_eq!(clean_query_line("- \"ace inhibitors\""), "ace inhibitors");
        assert_eq!(clean_query_line("   "), "");
    }

    #[tokio::test]
    async fn sufficient_local_coverage_skips_the_web() {
        let llm = Arc::new(MockLlm::new(vec![]));
        let store = Arc::new(MemoryStore::default());
        store
            .put("Thiazides are first-line.", "guideline.pdf", vec![1.0, 0.0, 0.0])
            .await;
        let web = Arc::new(MockWeb::counting());

        let retriever =
            HybridRetriever::new(llm, store, web.clone(), test_config());
        let documents = retriever.retrieve("hypertension treatment").await;

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source, "guideline.pdf");
        assert_eq!(web.search_calls(), 0);
    }

    #[tokio::test]
    async fn empty_index_triggers_web_research() {
        // Query derivation response; no answer generation happens here.
        let llm = Arc::new(MockLlm::new(vec![Ok("hypertension first line".to_string())]));
        let store = Arc::new(MemoryStore::default());
        let web = Arc::new(MockWeb::counting());

        let retriever = HybridRetriever::new(llm, store, web.clone(), test_config());
        let documents = retriever.retrieve("hypertension treatment").await;

        // MockWeb returns no results and no pages exist, so the context set
        // degrades to empty rather than erroring.
        assert!(documents.is_empty());
        assert!(web.search_calls() > 0);
    }

    #[tokio::test]
    async fn failing_providers_degrade_to_empty_context() {
        let llm = Arc::new(MockLlm::failing());
        let store = Arc::new(MemoryStore::default());
        let web = Arc::new(MockWeb::failing());

        let retriever = HybridRetriever::new(llm, store, web, test_config());
        let documents = retriever.retrieve("anything").await;

        assert!(documents.is_empty());
    }
}
