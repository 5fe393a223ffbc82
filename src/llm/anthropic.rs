//! Anthropic Messages API client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use super::{ensure_success, load_image, LlmClient, MAX_OUTPUT_TOKENS};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    async fn send(&self, content: Value, system_prompt: Option<&str>) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);

        let mut body = json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [{"role": "user", "content": content}],
        });
        if let Some(system) = system_prompt {
            body["system"] = json!(system);
        }

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("failed to send HTTP request to Anthropic API")?;

        let response = ensure_success(response, "Anthropic").await?;
        let value: Value = response
            .json()
            .await
            .context("failed to parse Anthropic response")?;

        extract_text(&value)
    }
}

/// Concatenate the `text` blocks of a Messages API response.
fn extract_text(value: &Value) -> Result<String> {
    let texts: Vec<&str> = value["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect()
        })
        .unwrap_or_default();
    if texts.is_empty() {
        bail!("Anthropic response had no text content: {value}");
    }
    Ok(texts.concat())
}

#[async_trait]
impl LlmClient for AnthropicClient {
    #[instrument(skip(self, prompt), level = "debug")]
    async fn chat(&self, prompt: &str) -> Result<String> {
        self.send(json!(prompt), None).await
    }

    #[instrument(skip(self, prompt, system_prompt), level = "debug")]
    async fn vision(
        &self,
        prompt: &str,
        image_source: &str,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let image = load_image(&self.http, image_source).await?;
        let content = json!([
            {
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.media_type,
                    "data": image.base64,
                },
            },
            {"type": "text", "text": prompt},
        ]);
        self.send(content, system_prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_blocks_only() {
        let value = json!({
            "content": [
                {"type": "text", "text": "SKIP"},
                {"type": "tool_use", "id": "t1"},
                {"type": "text", "text": "!"},
            ]
        });
        assert_eq!(extract_text(&value).unwrap(), "SKIP!");
    }

    #[test]
    fn response_without_text_is_an_error() {
        let err = extract_text(&json!({"type": "error", "error": {"message": "overloaded"}}))
            .unwrap_err();
        assert!(err.to_string().contains("no text content"));

        let tool_only = json!({"content": [{"type": "tool_use", "id": "t1"}]});
        assert!(extract_text(&tool_only).is_err());
    }
}
