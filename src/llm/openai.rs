//! OpenAI-compatible Chat Completions client.
//!
//! Used for `openai` and for any provider name without a dedicated client
//! (self-hosted gateways, OpenRouter, etc.), pointed at `LLM_BASE_URL`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use super::{ensure_success, load_image, LlmClient, MAX_OUTPUT_TOKENS};

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    async fn send(&self, messages: Value) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": messages,
        });

        let mut request = self.http.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .context("failed to send HTTP request to chat completions endpoint")?;
        let response = ensure_success(response, "OpenAI").await?;
        let value: Value = response
            .json()
            .await
            .context("failed to parse chat completions response")?;

        extract_text(&value)
    }
}

/// Message content of the first choice.
fn extract_text(value: &Value) -> Result<String> {
    match value["choices"][0]["message"]["content"].as_str() {
        Some(text) => Ok(text.to_string()),
        None => bail!("chat completions response had no text content: {value}"),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    #[instrument(skip(self, prompt), level = "debug")]
    async fn chat(&self, prompt: &str) -> Result<String> {
        self.send(json!([{"role": "user", "content": prompt}])).await
    }

    #[instrument(skip(self, prompt, system_prompt), level = "debug")]
    async fn vision(
        &self,
        prompt: &str,
        image_source: &str,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let image = load_image(&self.http, image_source).await?;
        let data_url = format!("data:{};base64,{}", image.media_type, image.base64);

        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": prompt},
                {"type": "image_url", "image_url": {"url": data_url}},
            ],
        }));
        self.send(Value::Array(messages)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let value = json!({"choices": [{"message": {"role": "assistant", "content": "RETRIEVE"}}]});
        assert_eq!(extract_text(&value).unwrap(), "RETRIEVE");
    }

    #[test]
    fn missing_content_is_an_error() {
        let err = extract_text(&json!({"choices": []})).unwrap_err();
        assert!(err.to_string().contains("no text content"));

        let refusal = json!({"choices": [{"message": {"content": null, "refusal": "no"}}]});
        assert!(extract_text(&refusal).is_err());
    }
}
