/// OpenAI-compatible embeddings via `POST {base}/embeddings`.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{finish_vector, EmbeddingProvider};
use crate::llm::ensure_success;

pub struct OpenAiEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dims: usize,
}

impl OpenAiEmbeddingProvider {
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

    /// Only the `text-embedding-3` family accepts a `dimensions` parameter.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let req = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.supports_dimensions().then_some(self.dims),
        };

        let mut request = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&req);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .context("failed to send embeddings request")?;
        let response = ensure_success(response, "OpenAI embeddings").await?;
        let mut resp: EmbeddingResponse = response
            .json()
            .await
            .context("failed to parse embeddings response")?;

        resp.data.sort_by_key(|d| d.index);
        anyhow::ensure!(
            resp.data.len() == texts.len(),
            "embeddings response has {} vectors for {} inputs",
            resp.data.len(),
            texts.len()
        );

        resp.data
            .into_iter()
            .map(|d| finish_vector(d.embedding, self.dims))
            .collect()
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
