//! Web-search fallback for low-trust answers.
//!
//! When the hallucination heuristic flags an answer, the raw question goes
//! straight to the web search provider — no query derivation, no indexing —
//! and the results are appended below a visible warning so the user can tell
//! model output from raw search output. The appended text is not re-scored
//! by the heuristic.

use crate::rag::types::AnswerResult;
use crate::search::WebSearch;

/// Sentinel source identifying the web-search supplement. Distinct from any
/// document source identifier.
pub const WEB_SEARCH_SOURCE: &str = "web search";

const FALLBACK_NOTICE: &str =
    "⚠️ I detected uncertainty in my response. Here are web search results:";

/// Best-effort: append raw web results and the sentinel source to a flagged
/// result. A failing or empty search leaves the result untouched.
pub async fn apply_fallback(result: &mut AnswerResult, question: &str, web: &dyn WebSearch) {
    let blob = match web.run(question).await {
        Ok(blob) => blob,
        Err(err) => {
            tracing::warn!("Web search fallback failed: {}", err);
            return;
        }
    };

    if blob.trim().is_empty() {
        tracing::warn!("Web search fallback returned no results");
        return;
    }

    result.answer = format!("{}\n\n{}\n{}", result.answer, FALLBACK_NOTICE, blob);
    if !result.sources.iter().any(|s| s == WEB_SEARCH_SOURCE) {
        result.sources.push(WEB_SEARCH_SOURCE.to_string());
    }
}
