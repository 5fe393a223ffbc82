//! Gemini embeddings via `batchEmbedContents`.
//!
//! Requests are truncated to the configured dimension with `outputDimensionality`;
//! truncated Gemini vectors are not unit length, so every vector is re-normalized.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{finish_vector, EmbeddingProvider};
use crate::llm::ensure_success;

pub struct GeminiEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dims: usize,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        model: String,
        api_key: String,
        dims: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            dims,
        }
    }

    fn request_body(&self, texts: &[String]) -> Value {
        let model_ref = format!("models/{}", self.model);
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model_ref,
                    "content": {"parts": [{"text": text}]},
                    "outputDimensionality": self.dims,
                })
            })
            .collect();
        json!({ "requests": requests })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url, self.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(texts))
            .send()
            .await
            .context("failed to send Gemini embeddings request")?;
        let response = ensure_success(response, "Gemini embeddings").await?;
        let value: Value = response
            .json()
            .await
            .context("failed to parse Gemini embeddings response")?;

        let embeddings = value["embeddings"]
            .as_array()
            .context("Gemini embeddings response has no `embeddings` array")?;
        anyhow::ensure!(
            embeddings.len() == texts.len(),
            "Gemini returned {} vectors for {} inputs",
            embeddings.len(),
            texts.len()
        );

        embeddings
            .iter()
            .map(|e| {
                let values: Vec<f32> = serde_json::from_value(e["values"].clone())
                    .context("malformed Gemini embedding values")?;
                finish_vector(values, self.dims)
            })
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_targets_configured_dimension() {
        let provider = GeminiEmbeddingProvider::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com/".into(),
            "gemini-embedding-001".into(),
            "key".into(),
            768,
        );
        let body = provider.request_body(&["메뮤".to_string(), "memory".to_string()]);
        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["model"], "models/gemini-embedding-001");
        assert_eq!(requests[0]["outputDimensionality"], 768);
        assert_eq!(requests[1]["content"]["parts"][0]["text"], "memory");
        assert_eq!(provider.base_url, "https://generativelanguage.googleapis.com");
    }
}
