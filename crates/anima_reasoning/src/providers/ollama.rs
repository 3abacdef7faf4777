//! Ollama chat backend: non-streaming `/api/chat` plus `/api/tags` for
//! model discovery against a local daemon.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ChatBackend, ChatMessage};

pub struct OllamaBackend {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("ollama chat request failed")?
            .error_for_status()
            .context("ollama chat returned an error status")?;
        let parsed: ChatResponse = resp.json().await.context("ollama chat reply not JSON")?;
        Ok(parsed.message.content)
    }

    async fn list_models(&self) -> Result<HashSet<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("ollama tags request failed")?
            .error_for_status()
            .context("ollama tags returned an error status")?;
        let parsed: TagsResponse = resp.json().await.context("ollama tags reply not JSON")?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let backend = OllamaBackend::new("http://localhost:11434/");
        assert_eq!(backend.base_url, "http://localhost:11434");
    }
}
