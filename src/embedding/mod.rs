//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and HTTP implementations for Gemini and
//! OpenAI-compatible endpoints. The provider is created via [`create_provider`]
//! from configuration. Vectors are L2-normalized and have exactly
//! [`EmbeddingProvider::dimensions`] components.

pub mod gemini;
pub mod openai;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{BridgeConfig, EmbedProvider};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }

    /// Embed a batch of text strings, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier recorded in the database so a model switch can be detected.
    fn model_name(&self) -> &str;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;
}

/// Create an embedding provider from config.
pub fn create_provider(config: &BridgeConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .context("failed to build HTTP client")?;

    let api_key = config.embed_api_key();
    let base_url = config.embed_base_url();
    let model = config.embed_model();
    let dims = config.embed_dimensions();

    let provider: Arc<dyn EmbeddingProvider> = match config.embed_provider() {
        EmbedProvider::Gemini => Arc::new(gemini::GeminiEmbeddingProvider::new(
            http, base_url, model, api_key, dims,
        )),
        EmbedProvider::OpenAi => Arc::new(openai::OpenAiEmbeddingProvider::new(
            http, base_url, model, api_key, dims,
        )),
    };

    tracing::debug!(
        provider = %config.embed_provider_name(),
        model = provider.model_name(),
        dims,
        "embedding provider ready"
    );
    Ok(provider)
}

/// Check a provider response against the configured dimension and normalize it.
pub(crate) fn finish_vector(values: Vec<f32>, expected_dims: usize) -> Result<Vec<f32>> {
    anyhow::ensure!(
        values.len() == expected_dims,
        "embedding has {} dimensions, expected {expected_dims}",
        values.len()
    );
    Ok(l2_normalize(&values))
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Cosine similarity of two vectors of equal length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb)) as f64
}
