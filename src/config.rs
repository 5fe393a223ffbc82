use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Top-level configuration, built once in `main` and passed down by reference.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    pub log_level: String,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub memorize: MemorizeConfig,
    pub retrieve: RetrieveConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Chat/vision provider. Empty `base_url`/`model` resolve to the provider defaults.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Embedding provider. An empty `provider` follows the LLM provider
/// (`gemini` when the LLM is `anthropic`, which has no embedding API).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemorizeConfig {
    pub memory_categories: Vec<CategorySpec>,
    pub enable_item_reinforcement: bool,
    pub category_assign_threshold: f64,
    pub capture_detail: CaptureDetail,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CategorySpec {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrieveConfig {
    pub route_intention: bool,
    pub sufficiency_check: bool,
    pub ranking: RankingStrategy,
    pub recency_decay_days: f64,
    pub rrf_k: usize,
    pub candidate_limit: usize,
}

/// How aggressively `store` without an explicit type filters conversation content.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureDetail {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for CaptureDetail {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown capture detail: {other}")),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    Similarity,
    #[default]
    Salience,
}

impl FromStr for RankingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "similarity" => Ok(Self::Similarity),
            "salience" => Ok(Self::Salience),
            other => Err(format!("unknown ranking strategy: {other}")),
        }
    }
}

/// Known LLM providers. Anything else is treated as OpenAI-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    Gemini,
}

impl LlmProvider {
    pub fn from_name(name: &str) -> Self {
        match name {
            "anthropic" => Self::Anthropic,
            "gemini" => Self::Gemini,
            _ => Self::OpenAi,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-haiku-4-5",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash",
        }
    }
}

/// Known embedding providers. Anything else is treated as OpenAI-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedProvider {
    OpenAi,
    Gemini,
}

impl EmbedProvider {
    pub fn from_name(name: &str) -> Self {
        match name {
            "gemini" => Self::Gemini,
            _ => Self::OpenAi,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::Gemini => "gemini-embedding-001",
        }
    }

    pub fn default_dimensions(&self) -> usize {
        match self {
            Self::OpenAi => 1536,
            Self::Gemini => 768,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".into(),
            storage: StorageConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            memorize: MemorizeConfig::default(),
            retrieve: RetrieveConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memory_dir()
            .join("memu.sqlite")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            base_url: String::new(),
            model: String::new(),
            dimensions: None,
        }
    }
}

impl Default for MemorizeConfig {
    fn default() -> Self {
        Self {
            memory_categories: default_categories(),
            enable_item_reinforcement: true,
            category_assign_threshold: 0.25,
            capture_detail: CaptureDetail::Medium,
        }
    }
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            route_intention: true,
            sufficiency_check: true,
            ranking: RankingStrategy::Salience,
            recency_decay_days: 30.0,
            rrf_k: 60,
            candidate_limit: 10,
        }
    }
}

fn default_categories() -> Vec<CategorySpec> {
    [
        ("User Profile", "User information and identity"),
        ("Preferences", "User preferences and settings"),
        ("Facts", "Important facts and knowledge"),
        ("Events", "Notable events and occurrences"),
    ]
    .into_iter()
    .map(|(name, description)| CategorySpec {
        name: name.into(),
        description: description.into(),
    })
    .collect()
}

/// Returns `~/.openclaw/memory/`
pub fn default_memory_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".openclaw")
        .join("memory")
}

/// Returns the default config file path: `~/.openclaw/memory/memu.toml`
pub fn default_config_path() -> PathBuf {
    default_memory_dir().join("memu.toml")
}

impl BridgeConfig {
    /// Load config from TOML (`MEMU_CONFIG` or the default path, if it exists)
    /// then apply env var overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var("MEMU_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());
        Self::load_from(path)
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            BridgeConfig::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = var("MEMU_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = var("MEMU_DB_PATH") {
            self.storage.db_path = val;
        }

        if let Some(val) = var("LLM_PROVIDER") {
            self.llm.provider = val;
        }
        if let Some(val) = var("ANTHROPIC_TOKEN") {
            self.llm.api_key = val;
        }
        if let Some(val) = var("LLM_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Some(val) = var("LLM_MODEL") {
            self.llm.model = val;
        }

        if let Some(val) = var("EMBED_PROVIDER") {
            self.embedding.provider = val;
        }
        if let Some(val) = var("GEMINI_API_KEY") {
            self.embedding.api_key = val;
        }
        if let Some(val) = var("EMBED_BASE_URL") {
            self.embedding.base_url = val;
        }
        if let Some(val) = var("EMBED_MODEL") {
            self.embedding.model = val;
        }
        if let Some(val) = var("EMBED_DIMENSIONS") {
            self.embedding.dimensions = Some(parse_env("EMBED_DIMENSIONS", &val)?);
        }

        if let Some(val) = var("CAPTURE_DETAIL") {
            self.memorize.capture_detail = val.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(val) = var("ENABLE_REINFORCEMENT") {
            self.memorize.enable_item_reinforcement = parse_flag(&val);
        }
        if let Some(val) = var("CATEGORY_ASSIGN_THRESHOLD") {
            self.memorize.category_assign_threshold =
                parse_env("CATEGORY_ASSIGN_THRESHOLD", &val)?;
        }

        if let Some(val) = var("ROUTE_INTENTION") {
            self.retrieve.route_intention = parse_flag(&val);
        }
        if let Some(val) = var("SUFFICIENCY_CHECK") {
            self.retrieve.sufficiency_check = parse_flag(&val);
        }
        if let Some(val) = var("RANKING_STRATEGY") {
            self.retrieve.ranking = val.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(val) = var("RECENCY_DECAY_DAYS") {
            self.retrieve.recency_decay_days = parse_env("RECENCY_DECAY_DAYS", &val)?;
        }

        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn llm_provider(&self) -> LlmProvider {
        LlmProvider::from_name(&self.llm.provider)
    }

    pub fn llm_base_url(&self) -> String {
        non_empty_or(&self.llm.base_url, self.llm_provider().default_base_url())
    }

    pub fn llm_model(&self) -> String {
        non_empty_or(&self.llm.model, self.llm_provider().default_model())
    }

    /// Embedding provider name after applying the LLM-provider fallback.
    pub fn embed_provider_name(&self) -> String {
        if !self.embedding.provider.is_empty() {
            return self.embedding.provider.clone();
        }
        if self.llm.provider == "anthropic" {
            "gemini".into()
        } else {
            self.llm.provider.clone()
        }
    }

    pub fn embed_provider(&self) -> EmbedProvider {
        EmbedProvider::from_name(&self.embed_provider_name())
    }

    /// The embedding key, falling back to the LLM key.
    pub fn embed_api_key(&self) -> String {
        non_empty_or(&self.embedding.api_key, &self.llm.api_key)
    }

    pub fn embed_base_url(&self) -> String {
        non_empty_or(&self.embedding.base_url, self.embed_provider().default_base_url())
    }

    pub fn embed_model(&self) -> String {
        non_empty_or(&self.embedding.model, self.embed_provider().default_model())
    }

    pub fn embed_dimensions(&self) -> usize {
        self.embedding
            .dimensions
            .unwrap_or_else(|| self.embed_provider().default_dimensions())
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Only the literal `true` (any case) enables a flag.
fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {value:?} ({e})"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
