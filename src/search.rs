//! Web search provider.
//!
//! Google Custom Search when credentials are configured, DuckDuckGo's
//! instant-answer API otherwise (and as a fallback when Google comes back
//! empty). No latency guarantee beyond the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::SearchConfig;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Ranked results for a query.
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError>;

    /// Results formatted as a single text blob, for direct display.
    async fn run(&self, query: &str) -> Result<String, ApiError>;
}

pub struct WebSearchClient {
    config: SearchConfig,
    client: Client,
}

impl WebSearchClient {
    pub fn new(config: SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    async fn google_search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://www.googleapis.com/customsearch/v1?key={}&cx={}&num={}&q={}",
            self.config.google_api_key,
            self.config.google_engine_id,
            self.config.max_results,
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Google search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let items = payload
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for item in items {
            let title = item
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let url = item
                .get("link")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let snippet = item
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if !title.is_empty() && !url.is_empty() {
                results.push(SearchResult {
                    title,
                    url,
                    snippet,
                });
            }
        }

        Ok(results)
    }

    async fn duckduckgo_search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let url = format!(
            "https://api.duckduckgo.com/?q={}&format=json&no_redirect=1&no_html=1",
            urlencoding::encode(query)
        );

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "DuckDuckGo search failed: {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let mut results = Vec::new();

        if let Some(abstract_text) = payload.get("AbstractText").and_then(|v| v.as_str()) {
            if let Some(url) = payload.get("AbstractURL").and_then(|v| v.as_str()) {
                if !abstract_text.is_empty() && !url.is_empty() {
                    results.push(SearchResult {
                        title: abstract_text
                            .split(" - ")
                            .next()
                            .unwrap_or(abstract_text)
                            .to_string(),
                        url: url.to_string(),
                        snippet: abstract_text.to_string(),
                    });
                }
            }
        }

        if let Some(items) = payload.get("Results").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }
        if let Some(items) = payload.get("RelatedTopics").and_then(|v| v.as_array()) {
            extract_ddg_topics(items, &mut results);
        }

        results.truncate(self.config.max_results);
        Ok(results)
    }
}

#[async_trait]
impl WebSearch for WebSearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, ApiError> {
        let has_google_keys =
            !self.config.google_api_key.is_empty() && !self.config.google_engine_id.is_empty();

        if self.config.provider == "google" && has_google_keys {
            if let Ok(results) = self.google_search(query).await {
                if !results.is_empty() {
                    return Ok(results);
                }
            }
        }

        self.duckduckgo_search(query).await
    }

    async fn run(&self, query: &str) -> Result<String, ApiError> {
        let results = self.search(query).await?;
        Ok(format_results(&results))
    }
}

/// Render results as a readable text blob.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("- {} ({})\n  {}", r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_ddg_topics(items: &[Value], results: &mut Vec<SearchResult>) {
    for item in items {
        if let Some(topics) = item.get("Topics").and_then(|v| v.as_array()) {
            extract_ddg_topics(topics, results);
            continue;
        }
        let text = item.get("Text").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("FirstURL").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() || url.is_empty() {
            continue;
        }
        results.push(SearchResult {
            title: text.split(" - ").next().unwrap_or(text).to_string(),
            url: url.to_string(),
            snippet: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_results_is_one_entry_per_line_group() {
        let results = vec![
            SearchResult {
                title: "Hypertension guideline".to_string(),
                url: "https://example.org/htn".to_string(),
                snippet: "First-line agents include thiazides.".to_string(),
            },
            SearchResult {
                title: "Another page".to_string(),
                url: "https://example.org/2".to_string(),
                snippet: "More detail.".to_string(),
            },
        ];

        let blob = format_results(&results);
        assert!(blob.contains("Hypertension guideline"));
        assert!(blob.contains("https://example.org/htn"));
        assert_eq!(blob.matches("- ").count(), 2);
    }

    #[test]
    fn ddg_topic_extraction_recurses_into_nested_topics() {
        let items: Vec<Value> = serde_json::from_str(
            r#"[
                {"Topics": [
                    {"Text": "Inner - topic", "FirstURL": "https://a"},
                    {"Text": "", "FirstURL": "https://skip"}
                ]},
                {"Text": "Outer - topic", "FirstURL": "https://b"}
            ]"#,
        )
        .unwrap();

        let mut results = Vec::new();
        extract_ddg_topics(&items, &mut results);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Inner");
        assert_eq!(results[1].url, "https://b");
    }
}
