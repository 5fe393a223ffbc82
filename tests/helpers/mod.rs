#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use memu_bridge::commands::Context;
use memu_bridge::config::BridgeConfig;
use memu_bridge::db;
use memu_bridge::embedding::{l2_normalize, EmbeddingProvider};
use memu_bridge::llm::LlmClient;
use memu_bridge::memory::LocalMemoryService;

pub const TEST_DIMS: usize = 64;

/// Deterministic bag-of-words embedder: each lowercase word bumps one bucket,
/// so texts sharing words have high cosine similarity.
pub struct FakeEmbedder;

pub fn fake_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; TEST_DIMS];
    for word in text.to_lowercase().split_whitespace() {
        let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % TEST_DIMS] += 1.0;
    }
    if v.iter().all(|x| *x == 0.0) {
        v[0] = 1.0;
    }
    l2_normalize(&v)
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| fake_embedding(t)).collect())
    }

    fn model_name(&self) -> &str {
        "fake-bag-of-words"
    }

    fn dimensions(&self) -> usize {
        TEST_DIMS
    }
}

type ChatHandler = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Scriptable LLM. Every prompt is recorded; responses come from the handler.
pub struct FakeLlm {
    handler: ChatHandler,
    vision_response: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(handler: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            vision_response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Summaries echo their input, routing and sufficiency pass through,
    /// extraction finds nothing, and the judge skips.
    pub fn echo() -> Self {
        Self::new(default_response)
    }

    pub fn with_vision(mut self, caption: &str) -> Self {
        self.vision_response = Some(caption.to_string());
        self
    }

    pub fn recorded(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn default_response(prompt: &str) -> Result<String> {
    if let Some(rest) = prompt.strip_prefix("Summarize in one concise sentence:\n") {
        return Ok(rest.trim_end_matches("\n\nSummary:").to_string());
    }
    if prompt.contains("You route queries") {
        return Ok("RETRIEVE".into());
    }
    if prompt.contains("SUFFICIENT or INSUFFICIENT") {
        return Ok("SUFFICIENT".into());
    }
    if prompt.starts_with("Extract the facts") {
        return Ok("[]".into());
    }
    if prompt.starts_with("Summarize what is known") {
        return Ok("Category summary.".into());
    }
    Ok("SKIP".into())
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn chat(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.handler)(prompt)
    }

    async fn vision(&self, prompt: &str, _image: &str, _system: Option<&str>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.vision_response
            .clone()
            .ok_or_else(|| anyhow::anyhow!("vision unavailable"))
    }
}

/// Defaults with LLM routing and sufficiency checks off, so retrieval is one search.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.retrieve.route_intention = false;
    config.retrieve.sufficiency_check = false;
    config
}

pub fn test_service(config: BridgeConfig, llm: Arc<FakeLlm>) -> LocalMemoryService {
    let conn = db::open_memory_database(TEST_DIMS).unwrap();
    LocalMemoryService::with_connection(conn, Arc::new(config), llm, Arc::new(FakeEmbedder))
        .unwrap()
}

/// A command context over an in-memory database.
pub fn test_context(config: BridgeConfig, llm: Arc<FakeLlm>) -> Context {
    let memory = test_service(config.clone(), Arc::clone(&llm));
    Context {
        config: Arc::new(config),
        memory: Arc::new(memory),
        llm,
    }
}
