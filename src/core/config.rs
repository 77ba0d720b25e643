//! Application configuration and filesystem paths.
//!
//! Configuration is read from `clinrag.toml` in the data directory, with
//! environment overrides for secrets so API keys never have to live in the
//! config file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub docs_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = discover_data_dir();
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("vector_db.sqlite");
        let config_path = data_dir.join("clinrag.toml");
        let docs_dir = data_dir.join("docs");

        for dir in [&data_dir, &log_dir, &docs_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
            config_path,
            docs_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_data_dir() -> PathBuf {
    if let Ok(dir) = env::var("CLINRAG_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        if let Ok(cwd) = env::current_dir() {
            return cwd;
        }
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir().join(".local/share").to_string_lossy().to_string()
    });
    PathBuf::from(xdg).join("clinrag")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub retriever: RetrieverConfig,
    pub chain: ChainConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8470 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Preferred backend: "ollama" (local) or "openai" (remote).
    pub backend: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_embedding_model: String,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,
    /// Sampling temperature. Lower = more literal answers.
    pub temperature: f64,
    /// HTTP client timeout for provider requests.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: "ollama".to_string(),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "mistral".to_string(),
            ollama_embedding_model: "nomic-embed-text".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            openai_api_key: String::new(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.3,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search provider: "google" (with DuckDuckGo fallback) or "duckduckgo".
    pub provider: String,
    pub google_api_key: String,
    pub google_engine_id: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            google_api_key: String::new(),
            google_engine_id: String::new(),
            max_results: 5,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// How many chunks to pull from the local index per question.
    pub top_k: usize,
    /// Local coverage is sufficient when at least this many hits come back...
    pub min_local_hits: usize,
    /// ...and the best hit scores at least this (cosine similarity).
    pub score_threshold: f32,
    pub max_web_queries: usize,
    pub max_pages: usize,
    /// Upper bound on documents handed to the prompt builder.
    pub max_context_docs: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks_per_page: usize,
    pub page_timeout_secs: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_local_hits: 1,
            score_threshold: 0.35,
            max_web_queries: 3,
            max_pages: 3,
            max_context_docs: 8,
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks_per_page: 5,
            page_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Prefix for degraded answers so callers can spot failed turns.
    pub error_marker: String,
    /// End-to-end bound on one generation attempt.
    pub llm_timeout_secs: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            error_marker: "⚠️ System error:".to_string(),
            llm_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks_per_doc: usize,
    pub embed_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_chunks_per_doc: 512,
            embed_batch_size: 32,
        }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> anyhow::Result<Self> {
        let mut config = Self::read_file(&paths.config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("CLINRAG_GOOGLE_API_KEY") {
            self.search.google_api_key = key;
        }
        if let Ok(id) = env::var("CLINRAG_GOOGLE_ENGINE_ID") {
            self.search.google_engine_id = id;
        }
        if let Ok(key) = env::var("CLINRAG_OPENAI_API_KEY") {
            self.llm.openai_api_key = key;
        }
        if let Ok(url) = env::var("CLINRAG_OLLAMA_URL") {
            self.llm.ollama_base_url = url;
        }
    }
}
