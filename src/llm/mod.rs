//! Language model providers.
//!
//! Two backends implement [`LlmProvider`]: a local Ollama server and a
//! remote OpenAI-compatible API. Selection happens once at startup via an
//! explicit availability probe, never by catching construction errors.

pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;

use crate::core::config::LlmConfig;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, GenerateRequest};

/// Select the language model backend for this process.
///
/// The configured backend is probed first. If the local backend is down and
/// a remote API key is configured, the remote backend takes over; otherwise
/// the configured backend is kept and per-turn error handling degrades.
pub async fn select_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    let ollama = Arc::new(OllamaProvider::new(config));

    if config.backend == "openai" {
        return Arc::new(OpenAiProvider::new(config));
    }

    match ollama.health_check().await {
        Ok(true) => {
            tracing::info!("Using Ollama backend ({})", config.ollama_model);
            ollama
        }
        _ if !config.openai_api_key.is_empty() => {
            tracing::warn!(
                "Ollama unreachable at {}; falling back to OpenAI backend",
                config.ollama_base_url
            );
            Arc::new(OpenAiProvider::new(config))
        }
        _ => {
            tracing::warn!(
                "Ollama unreachable at {} and no remote API key configured; \
                 turns will degrade until the server comes back",
                config.ollama_base_url
            );
            ollama
        }
    }
}
