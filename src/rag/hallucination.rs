//! Rule-based trust heuristic over generated answers.
//!
//! No ground truth is available at answer time, so this is a textual
//! approximation: answers that disclaim knowledge outright are flagged
//! immediately, and answers that pile up hedging language are flagged once
//! they cross a fixed threshold. Deterministic for a given answer text;
//! false positives and negatives are expected and acceptable.

/// Phrases with which the model disclaims knowledge. Any match flags the
/// answer, first match wins.
const UNCERTAINTY_PHRASES: &[&str] = &[
    "i don't know",
    "not mentioned in the context",
    "no information provided",
    "based on my training data",
    "as an ai language model",
    "i cannot answer",
    "not specified in the given context",
    "without specific context",
];

/// Hedging phrases. Each distinct phrase present counts once.
const VAGUE_PHRASES: &[&str] = &[
    "it depends",
    "may vary",
    "could be",
    "might be",
    "possibly",
];

/// More than this many distinct vague phrases flags the answer.
const VAGUE_PHRASE_LIMIT: usize = 2;

/// Classify whether a generated answer looks untrustworthy.
pub fn detect_hallucination(answer: &str) -> bool {
    let lowered = answer.to_lowercase();

    if UNCERTAINTY_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return true;
    }

    let vague_count = VAGUE_PHRASES
        .iter()
        .filter(|phrase| lowered.contains(*phrase))
        .count();

    vague_count > VAGUE_PHRASE_LIMIT
}
