//! Chat and vision calls against hosted LLM providers.
//!
//! [`LlmClient`] is the seam used by the commands and the memory backend. The
//! provider is picked from configuration by [`create_client`]: Anthropic and Gemini
//! have dedicated clients, every other provider name is treated as an
//! OpenAI-compatible Chat Completions endpoint.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::sync::Arc;

use crate::config::{BridgeConfig, LlmProvider};

/// Upper bound on generated tokens for the short prompts this crate sends.
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single-turn completion of a user prompt. Returns the response text.
    async fn chat(&self, prompt: &str) -> Result<String>;

    /// Describe an image given by local path or `http(s)` URL.
    async fn vision(
        &self,
        prompt: &str,
        image_source: &str,
        system_prompt: Option<&str>,
    ) -> Result<String>;
}

/// Create the LLM client for the configured provider.
pub fn create_client(config: &BridgeConfig) -> Result<Arc<dyn LlmClient>> {
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .context("failed to build HTTP client")?;

    let base_url = config.llm_base_url();
    let model = config.llm_model();
    let api_key = config.llm.api_key.clone();

    if api_key.is_empty() {
        tracing::warn!(provider = %config.llm.provider, "no LLM API key configured");
    }

    let client: Arc<dyn LlmClient> = match config.llm_provider() {
        LlmProvider::Anthropic => Arc::new(anthropic::AnthropicClient::new(
            http, base_url, model, api_key,
        )),
        LlmProvider::Gemini => Arc::new(gemini::GeminiClient::new(http, base_url, model, api_key)),
        LlmProvider::OpenAi => Arc::new(openai::OpenAiClient::new(http, base_url, model, api_key)),
    };
    Ok(client)
}

/// Raw image bytes, base64-encoded, with their media type.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub media_type: &'static str,
    pub base64: String,
}

/// Read an image from disk or download it.
pub async fn load_image(http: &reqwest::Client, source: &str) -> Result<ImageData> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let response = http
            .get(source)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {source}"))?;
        let response = ensure_success(response, "image download").await?;
        response.bytes().await.context("error reading image body")?.to_vec()
    } else {
        let path = crate::config::expand_tilde(source);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read image: {}", path.display()))?
    };

    Ok(ImageData {
        media_type: media_type_for(source),
        base64: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

/// Infer the image media type from the path or URL extension.
pub fn media_type_for(source: &str) -> &'static str {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Strip a surrounding Markdown code fence from a model response.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Turn a non-2xx response into an error carrying the status and body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    provider: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{provider} API error (status {status}): {body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_extension() {
        assert_eq!(media_type_for("/tmp/moka.PNG"), "image/png");
        assert_eq!(media_type_for("https://x.test/a.webp?size=2"), "image/webp");
        assert_eq!(media_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(media_type_for("no-extension"), "image/jpeg");
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
        assert_eq!(strip_code_fence("  SKIP "), "SKIP");
    }

    #[tokio::test]
    async fn load_image_reads_local_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("pixel.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let image = load_image(&reqwest::Client::new(), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(image.media_type, "image/gif");
        assert_eq!(image.base64, "R0lGODlh");
    }

    #[tokio::test]
    async fn load_image_missing_file_errors() {
        let err = load_image(&reqwest::Client::new(), "/nonexistent/cat.png")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read image"));
    }
}
