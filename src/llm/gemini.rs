//! Google Gemini `generateContent` client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::instrument;

use super::{ensure_success, load_image, LlmClient, MAX_OUTPUT_TOKENS};

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: String, model: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    async fn send(&self, parts: Value, system_prompt: Option<&str>) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let mut body = json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {"maxOutputTokens": MAX_OUTPUT_TOKENS},
        });
        if let Some(system) = system_prompt {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to send HTTP request to Gemini model {}", self.model))?;

        let response = ensure_success(response, "Gemini").await?;
        let value: Value = response
            .json()
            .await
            .context("failed to parse Gemini response")?;

        extract_text(&value)
    }
}

/// Join the text parts of the first candidate.
fn extract_text(value: &Value) -> Result<String> {
    let texts: Vec<&str> = value["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();
    if texts.is_empty() {
        bail!("Gemini response had no text content: {value}");
    }
    Ok(texts.concat())
}

#[async_trait]
impl LlmClient for GeminiClient {
    #[instrument(skip(self, prompt), level = "debug")]
    async fn chat(&self, prompt: &str) -> Result<String> {
        self.send(json!([{"text": prompt}]), None).await
    }

    #[instrument(skip(self, prompt, system_prompt), level = "debug")]
    async fn vision(
        &self,
        prompt: &str,
        image_source: &str,
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let image = load_image(&self.http, image_source).await?;
        let parts = json!([
            {"inline_data": {"mime_type": image.media_type, "data": image.base64}},
            {"text": prompt},
        ]);
        self.send(parts, system_prompt).await
    }
}
