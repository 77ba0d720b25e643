use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::GenerateRequest;
use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    model: String,
    embedding_model: String,
    default_temperature: f64,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            embedding_model: config.ollama_embedding_model.clone(),
            default_temperature: config.temperature,
            client,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let temperature = request.temperature.unwrap_or(self.default_temperature);

        let mut options = json!({ "temperature": temperature });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }

        let body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
            "options": options,
        });

        let res = self.client.post(&url).json(&body).send().await?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Ollama chat error: {}", text)));
        }

        let payload: Value = res.json().await?;
        let content = payload["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self.client.post(&url).json(&body).send().await?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Ollama embed error: {}", text)));
        }

        let payload: Value = res.json().await?;
        let mut embeddings = Vec::new();
        if let Some(rows) = payload["embeddings"].as_array() {
            for row in rows {
                if let Some(vals) = row.as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        Ok(embeddings)
    }
}
