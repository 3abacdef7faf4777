//! The chat backend seam and the JSON-tolerant parsing every gated prompt
//! relies on.
//!
//! Models wrap JSON in fences, prefix it with prose, or both. The parser
//! here takes the first fenced block if there is one, otherwise the
//! outermost brace span, and only then gives up.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String>;
    async fn list_models(&self) -> Result<HashSet<String>>;
}

/// Extract the most plausible JSON object from LLM output.
pub fn extract_json(text: &str) -> Option<String> {
    // First fenced block, with or without a language tag.
    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after[body_start..].find("```") {
            let block = after[body_start..body_start + end].trim();
            if block.starts_with('{') && block.ends_with('}') {
                return Some(block.to_string());
            }
        }
    }
    // Outermost braces.
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if close > open {
        Some(text[open..=close].trim().to_string())
    } else {
        None
    }
}

/// Parse a typed value out of noisy LLM output.
pub fn parse_json_reply<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let raw = extract_json(text)?;
    serde_json::from_str(&raw).ok()
}

/// Scripted backend for tests: pops replies in order, errors when empty.
pub struct NullBackend {
    replies: Mutex<VecDeque<String>>,
    models: HashSet<String>,
}

impl NullBackend {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            models: HashSet::from(["test-model".to_string()]),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ChatBackend for NullBackend {
    async fn chat(&self, _model: &str, _messages: &[ChatMessage]) -> Result<String> {
        self.replies
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted reply left"))
    }

    async fn list_models(&self) -> Result<HashSet<String>> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let raw = extract_json(r#"{"need_web": true}"#).unwrap();
        assert_eq!(raw, r#"{"need_web": true}"#);
    }

    #[test]
    fn test_extract_fenced_with_tag() {
        let text = "Sure, here you go:\n```json\n{\"a\": 1}\n```\nHope that helps!";
        assert_eq!(extract_json(text).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_prose_wrapped() {
        let text = "I think the answer is {\"need_web\": false, \"reason\": \"cached\"} based on context.";
        let parsed: serde_json::Value = serde_json::from_str(&extract_json(text).unwrap()).unwrap();
        assert_eq!(parsed["need_web"], false);
    }

    #[test]
    fn test_extract_none_on_no_json() {
        assert!(extract_json("no structure here at all").is_none());
    }

    #[test]
    fn test_parse_typed() {
        #[derive(Deserialize)]
        struct Gate {
            need_web: bool,
        }
        let g: Gate = parse_json_reply("```\n{\"need_web\": true}\n```").unwrap();
        assert!(g.need_web);
        assert!(parse_json_reply::<Gate>("{\"other\": 1}").is_none());
    }

    #[tokio::test]
    async fn test_null_backend_scripted() {
        let backend = NullBackend::new(vec!["one", "two"]);
        assert_eq!(backend.chat("m", &[]).await.unwrap(), "one");
        assert_eq!(backend.chat("m", &[]).await.unwrap(), "two");
        assert!(backend.chat("m", &[]).await.is_err());
        assert!(backend.list_models().await.unwrap().contains("test-model"));
    }
}
