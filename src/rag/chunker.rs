//! Text splitting and web page chunking.
//!
//! [`split_text`] is the shared sliding-window splitter used both by batch
//! document ingestion and by the hybrid retriever's on-demand web ingestion.
//! [`PageChunker`] fetches a page, strips markup, and splits the remainder.

use std::time::Duration;

use reqwest::Client;

use crate::core::config::RetrieverConfig;
use crate::core::errors::ApiError;
use crate::rag::types::Chunk;

/// Split text into overlapping chunks, snapping to sentence boundaries
/// where one exists near the end of the window.
pub fn split_text(
    text: &str,
    source: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks: usize,
) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();

    let mut chunks = Vec::new();
    if total_chars == 0 || chunk_size == 0 {
        return chunks;
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut start = 0;
    let mut chunk_index = 0;

    while start < total_chars && chunks.len() < max_chunks {
        let end = (start + chunk_size).min(total_chars);
        let window: String = chars[start..end].iter().collect();

        let body = if end < total_chars {
            cut_at_sentence_boundary(&window)
        } else {
            window
        };

        let trimmed = body.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                source: source.to_string(),
                start_offset: start,
                chunk_index,
            });
            chunk_index += 1;
        }

        start += step;
    }

    chunks
}

/// Cut the window at the last sentence ending in its final 20%, if any.
fn cut_at_sentence_boundary(text: &str) -> String {
    let sentence_endings = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

    let search_start = (text.len() * 80) / 100;
    if !text.is_char_boundary(search_start) {
        return text.to_string();
    }
    let tail = &text[search_start..];

    for ending in sentence_endings.iter() {
        if let Some(pos) = tail.rfind(ending) {
            let cut = search_start + pos + ending.len();
            return text[..cut].to_string();
        }
    }

    text.to_string()
}

/// Fetches web pages and turns them into chunks attributed to their URL.
pub struct PageChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks_per_page: usize,
    client: Client,
}

impl PageChunker {
    pub fn new(config: &RetrieverConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.page_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_chunks_per_page: config.max_chunks_per_page,
            client,
        }
    }

    /// Fetch a page and split its visible text; the URL becomes the source.
    pub async fn fetch_and_chunk(&self, url: &str) -> Result<Vec<Chunk>, ApiError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "Page fetch failed: {} ({})",
                url,
                response.status()
            )));
        }

        let html = response.text().await?;
        let text = strip_html_tags(&html);

        Ok(split_text(
            &text,
            url,
            self.chunk_size,
            self.chunk_overlap,
            self.max_chunks_per_page,
        ))
    }
}

/// Drop tags plus script/style bodies, keeping visible text one line per
/// non-empty source line.
fn strip_html_tags(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    let chars: Vec<char> = html.chars().collect();
    let chars_lower: Vec<char> = html.to_lowercase().chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if i + 7 < chars_lower.len() {
            let tag: String = chars_lower[i..i + 7].iter().collect();
            if tag == "<script" {
                in_script = true;
            } else if tag.starts_with("<style") {
                in_style = true;
            }
        }

        if in_script && i + 9 <= chars_lower.len() {
            let tag: String = chars_lower[i..i + 9].iter().collect();
            if tag == "</script>" {
                in_script = false;
                i += 9;
                continue;
            }
        }
        if in_style && i + 8 <= chars_lower.len() {
            let tag: String = chars_lower[i..i + 8].iter().collect();
            if tag == "</style>" {
                in_style = false;
                i += 8;
                continue;
            }
        }

        if in_script || in_style {
            i += 1;
            continue;
        }

        if c == '<' {
            in_tag = true;
        } else if c == '>' {
            in_tag = false;
        } else if !in_tag {
            result.push(c);
        }

        i += 1;
    }

    let lines: Vec<&str> = result
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    lines.join("\n")
}
