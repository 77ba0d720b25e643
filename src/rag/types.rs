use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A unit of ingested text, produced by a document loader or the web
/// page chunker. `source` is never empty once a chunk reaches indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Origin document identifier (file name, URL).
    pub source: String,
    /// Character offset in the original document.
    pub start_offset: usize,
    /// Chunk index within the source.
    pub chunk_index: usize,
}

/// One completed question-answer exchange. The running conversation is an
/// ordered sequence of these, oldest first; only prior turns are handed to
/// the chain as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// A context document produced by the retriever for a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub word_count: usize,
}

/// The result of one turn, shaped for direct rendering by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Deduplicated source identifiers, insertion-ordered.
    pub sources: Vec<String>,
    pub metrics: TurnMetrics,
    pub hallucination_detected: bool,
}

impl AnswerResult {
    /// A degraded result for a failed turn: the reason goes into the answer
    /// text behind the error marker, everything else is zeroed.
    pub fn degraded(marker: &str, reason: impl std::fmt::Display) -> Self {
        Self {
            answer: format!("{} {}. Please try again.", marker, reason),
            sources: Vec::new(),
            metrics: TurnMetrics::default(),
            hallucination_detected: false,
        }
    }
}

/// Whitespace-delimited token count.
pub fn word_count(answer: &str) -> usize {
    answer.split_whitespace().count()
}

/// Running aggregate over a session's turns. Owned by the caller, never by
/// the chain; advanced one turn at a time through [`SessionMetrics::record`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_questions: u64,
    /// Seconds spent across all turns.
    pub total_latency: f64,
    pub avg_latency: f64,
    pub hallucination_count: u64,
    pub hallucination_rate: f64,
}

impl SessionMetrics {
    /// Pure reducer: fold one turn into the aggregate.
    pub fn record(&self, result: &AnswerResult, latency: Duration) -> SessionMetrics {
        let total_questions = self.total_questions + 1;
        let total_latency = self.total_latency + latency.as_secs_f64();
        let hallucination_count =
            self.hallucination_count + u64::from(result.hallucination_detected);

        SessionMetrics {
            total_questions,
            total_latency,
            avg_latency: total_latency / total_questions as f64,
            hallucination_count,
            hallucination_rate: hallucination_count as f64 / total_questions as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(hallucinated: bool) -> AnswerResult {
        AnswerResult {
            answer: "ok".to_string(),
            sources: vec![],
            metrics: TurnMetrics { word_count: 1 },
            hallucination_detected: hallucinated,
        }
    }

    #[test]
    fn word_count_is_whitespace_delimited() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("beta  blockers\nand\tdiuretics"), 4);
    }

    #[test]
    fn degraded_result_is_zeroed() {
        let result = AnswerResult::degraded("⚠️ System error:", "connection refused");
        assert!(result.answer.starts_with("⚠️ System error:"));
        assert!(result.answer.contains("connection refused"));
        assert!(result.sources.is_empty());
        assert_eq!(result.metrics.word_count, 0);
        assert!(!result.hallucination_detected);
    }

    #[test]
    fn metrics_reducer_accumulates() {
        let metrics = SessionMetrics::default();
        let metrics = metrics.record(&result(false), Duration::from_secs(2));
        let metrics = metrics.record(&result(true), Duration::from_secs(4));

        assert_eq!(metrics.total_questions, 2);
        assert!((metrics.total_latency - 6.0).abs() < 1e-9);
        assert!((metrics.avg_latency - 3.0).abs() < 1e-9);
        assert_eq!(metrics.hallucination_count, 1);
        assert!((metrics.hallucination_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn metrics_reducer_does_not_mutate_input() {
        let metrics = SessionMetrics::default();
        let _ = metrics.record(&result(true), Duration::from_secs(1));
        assert_eq!(metrics.total_questions, 0);
    }
}
