//! Retrieval-augmented question answering.
//!
//! One turn flows through [`orchestrator::RagChain::get_response`]:
//! the [`retriever::HybridRetriever`] gathers context from the local index
//! (reaching out to web search when coverage is thin), the language model
//! generates an answer conditioned on context and history, the
//! [`hallucination`] heuristic scores the answer, and low-trust answers get
//! raw web results appended by [`fallback`].

pub mod chunker;
pub mod fallback;
pub mod hallucination;
pub mod orchestrator;
pub mod retriever;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::RagChain;
pub use retriever::HybridRetriever;
pub use types::{AnswerResult, Chunk, ConversationTurn, RetrievedDocument, SessionMetrics};
