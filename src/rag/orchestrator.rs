//! Conversational QA chain — one complete question→answer turn.
//!
//! Hard contract at this boundary: `get_response` never returns an error and
//! never panics. Every provider failure is converted into a degraded
//! [`AnswerResult`] whose answer text carries the reason, because the caller
//! has no separate error path.

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::ChainConfig;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, GenerateRequest, LlmProvider};
use crate::rag::fallback::apply_fallback;
use crate::rag::hallucination::detect_hallucination;
use crate::rag::retriever::HybridRetriever;
use crate::rag::types::{word_count, AnswerResult, ConversationTurn, RetrievedDocument, TurnMetrics};
use crate::search::WebSearch;

const SYSTEM_PROMPT: &str = "You are a clinical assistant. Answer the question using the \
reference material below. Cite facts from the material rather than general knowledge. \
If the material does not contain the answer, say that you don't know.";

pub struct RagChain {
    retriever: HybridRetriever,
    llm: Arc<dyn LlmProvider>,
    web: Arc<dyn WebSearch>,
    config: ChainConfig,
}

impl RagChain {
    pub fn new(
        retriever: HybridRetriever,
        llm: Arc<dyn LlmProvider>,
        web: Arc<dyn WebSearch>,
        config: ChainConfig,
    ) -> Self {
        Self {
            retriever,
            llm,
            web,
            config,
        }
    }

    /// Run one turn: retrieve, generate, score, and (when flagged) fall back
    /// to raw web results. `history` holds prior turns only, oldest first.
    pub async fn get_response(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> AnswerResult {
        if question.trim().is_empty() {
            return AnswerResult::degraded(&self.config.error_marker, "the question was empty");
        }

        let context = self.retriever.retrieve(question).await;
        if context.is_empty() {
            tracing::info!("No supporting context retrieved; the model answers unaided");
        }

        let request = build_request(&context, history, question);

        let answer = match self.generate_with_retry(request).await {
            Ok(answer) => answer.trim().to_string(),
            Err(err) => {
                tracing::error!("Error generating response: {}", err);
                return AnswerResult::degraded(&self.config.error_marker, err);
            }
        };
        if answer.is_empty() {
            tracing::error!("Model returned an empty response");
            return AnswerResult::degraded(
                &self.config.error_marker,
                "the model returned an empty response",
            );
        }

        let mut sources: Vec<String> = Vec::new();
        for doc in &context {
            if !sources.contains(&doc.source) {
                sources.push(doc.source.clone());
            }
        }

        let metrics = TurnMetrics {
            word_count: word_count(&answer),
        };
        let hallucination_detected = detect_hallucination(&answer);

        let mut result = AnswerResult {
            answer,
            sources,
            metrics,
            hallucination_detected,
        };

        if hallucination_detected {
            tracing::warn!(
                "Potential hallucination detected in response: {}...",
                result.answer.chars().take(100).collect::<String>()
            );
            apply_fallback(&mut result, question, self.web.as_ref()).await;
        }

        result
    }

    /// One bounded generation attempt; a timeout is retried exactly once.
    async fn generate_with_retry(&self, request: GenerateRequest) -> Result<String, ApiError> {
        match self.generate_once(request.clone()).await {
            Err(err) if err.is_timeout() => {
                tracing::warn!("Generation timed out, retrying once");
                self.generate_once(request).await
            }
            other => other,
        }
    }

    async fn generate_once(&self, request: GenerateRequest) -> Result<String, ApiError> {
        let bound = Duration::from_secs(self.config.llm_timeout_secs);
        match tokio::time::timeout(bound, self.llm.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(format!(
                "the language model did not answer within {}s",
                self.config.llm_timeout_secs
            ))),
        }
    }
}

/// Assemble the generation request: system prompt with a cited context
/// block, prior turns as alternating user/assistant messages, then the
/// question.
fn build_request(
    context: &[RetrievedDocument],
    history: &[ConversationTurn],
    question: &str,
) -> GenerateRequest {
    let mut system = String::from(SYSTEM_PROMPT);
    if !context.is_empty() {
        system.push_str("\n\nReference material:\n");
        for (i, doc) in context.iter().enumerate() {
            system.push_str(&format!(
                "[{}] (Source: {})\n{}\n\n",
                i + 1,
                doc.source,
                doc.text
            ));
        }
    }

    let mut messages = vec![ChatMessage::system(system.trim_end())];
    for turn in history {
        messages.push(ChatMessage::user(&turn.question));
        messages.push(ChatMessage::assistant(&turn.answer));
    }
    messages.push(ChatMessage::user(question));

    GenerateRequest::new(messages)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::config::RetrieverConfig;
    use crate::rag::fallback::WEB_SEARCH_SOURCE;
    use crate::rag::testing::{MemoryStore, MockLlm, MockWeb};

    fn chain_config() -> ChainConfig {
        ChainConfig {
            error_marker: "⚠️ System error:".to_string(),
            llm_timeout_secs: 90,
        }
    }

    fn make_chain(
        llm: Arc<MockLlm>,
        store: Arc<MemoryStore>,
        web: Arc<MockWeb>,
    ) -> RagChain {
        let retriever = HybridRetriever::new(
            llm.clone(),
            store,
            web.clone(),
            RetrieverConfig::default(),
        );
        RagChain::new(retriever, llm, web, chain_config())
    }

    #[test]
    fn request_carries_context_history_and_question() {
        let context = vec![RetrievedDocument {
            text: "Thiazide diuretics are first-line.".to_string(),
            source: "guideline.pdf".to_string(),
        }];
        let history = vec![ConversationTurn {
            question: "What is hypertension?".to_string(),
            answer: "Persistently elevated blood pressure.".to_string(),
        }];

        let request = build_request(&context, &history, "And its first-line treatment?");

        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("guideline.pdf"));
        assert!(request.messages[0].content.contains("Thiazide"));
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[2].role, "assistant");
        assert_eq!(request.messages[3].content, "And its first-line treatment?");
    }

    #[tokio::test]
    async fn empty_question_degrades_without_touching_providers() {
        let llm = Arc::new(MockLlm::new(vec![]));
        let web = Arc::new(MockWeb::counting());
        let chain = make_chain(llm, Arc::new(MemoryStore::default()), web.clone());

        let result = chain.get_response("   \n", &[]).await;

        assert!(result.answer.starts_with("⚠️ System error:"));
        assert!(result.sources.is_empty());
        assert_eq!(result.metrics.word_count, 0);
        assert!(!result.hallucination_detected);
        assert_eq!(web.search_calls(), 0);
    }

    #[tokio::test]
    async fn grounded_answer_carries_deduplicated_sources() {
        let llm = Arc::new(MockLlm::new(vec![Ok(
            "Thiazide diuretics are the first-line treatment.".to_string(),
        )]));
        let store = Arc::new(MemoryStore::default());
        store
            .put(
                "Thiazide diuretics are recommended first-line.",
                "guideline.pdf",
                vec![1.0, 0.0, 0.0],
            )
            .await;
        store
            .put(
                "Thiazides reduce cardiovascular events.",
                "guideline.pdf",
                vec![0.9, 0.1, 0.0],
            )
            .await;
        let chain = make_chain(llm, store, Arc::new(MockWeb::counting()));

        let result = chain
            .get_response("What is the first-line treatment for hypertension?", &[])
            .await;

        assert!(result.answer.contains("Thiazide"));
        assert_eq!(result.sources, vec!["guideline.pdf".to_string()]);
        assert_eq!(result.metrics.word_count, 6);
        assert!(!result.hallucination_detected);
    }

    #[tokio::test]
    async fn uncertain_answer_triggers_fallback_with_sentinel_source() {
        // First generation derives web queries, second is the answer.
        let llm = Arc::new(MockLlm::new(vec![
            Ok(String::new()),
            Ok("I don't know, this is not mentioned in the context.".to_string()),
        ]));
        let web = Arc::new(MockWeb::with_blob(
            "- Hypertension overview (https://example.org)\n  Thiazides are first-line.",
        ));
        let chain = make_chain(llm, Arc::new(MemoryStore::default()), web);

        let result = chain.get_response("What about rare disease X?", &[]).await;

        assert!(result.hallucination_detected);
        assert!(result.answer.contains("web search results"));
        assert_eq!(
            result
                .sources
                .iter()
                .filter(|s| *s == WEB_SEARCH_SOURCE)
                .count(),
            1
        );
        // Word count reflects the model's own answer, not the appended blob.
        assert_eq!(result.metrics.word_count, 10);
    }

    #[tokio::test]
    async fn provider_timeout_is_retried_once_then_degraded() {
        let llm = Arc::new(MockLlm::new(vec![
            // Query derivation for the (empty-store) retriever pass.
            Ok(String::new()),
            Err(ApiError::Timeout("mock timeout".to_string())),
            Err(ApiError::Timeout("mock timeout".to_string())),
        ]));
        let chain = make_chain(
            llm,
            Arc::new(MemoryStore::default()),
            Arc::new(MockWeb::counting()),
        );

        let result = chain.get_response("Any question", &[]).await;

        assert!(result.answer.starts_with("⚠️ System error:"));
        assert!(result.answer.contains("timeout"));
        assert!(result.sources.is_empty());
        assert_eq!(result.metrics.word_count, 0);
        assert!(!result.hallucination_detected);
    }

    #[tokio::test]
    async fn timeout_recovers_when_the_retry_succeeds() {
        let llm = Arc::new(MockLlm::new(vec![
            Ok(String::new()),
            Err(ApiError::Timeout("mock timeout".to_string())),
            Ok("Lisinopril is an ACE inhibitor.".to_string()),
        ]));
        let chain = make_chain(
            llm,
            Arc::new(MemoryStore::default()),
            Arc::new(MockWeb::counting()),
        );

        let result = chain.get_response("What is lisinopril?", &[]).await;

        assert!(result.answer.contains("ACE inhibitor"));
        assert!(!result.hallucination_detected);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_is_cut_off_by_the_timeout() {
        let llm = Arc::new(MockLlm::hanging());
        let chain = make_chain(
            llm,
            Arc::new(MemoryStore::default()),
            Arc::new(MockWeb::counting()),
        );

        let result = chain.get_response("Any question", &[]).await;

        assert!(result.answer.starts_with("⚠️ System error:"));
        assert!(result.sources.is_empty());
        assert_eq!(result.metrics.word_count, 0);
    }

    #[tokio::test]
    async fn empty_completion_degrades() {
        let llm = Arc::new(MockLlm::new(vec![Ok(String::new()), Ok("  ".to_string())]));
        let chain = make_chain(
            llm,
            Arc::new(MemoryStore::default()),
            Arc::new(MockWeb::counting()),
        );

        let result = chain.get_response("Any question", &[]).await;

        assert!(result.answer.starts_with("⚠️ System error:"));
        assert!(result.answer.contains("empty response"));
    }
}
