//! [`LocalMemoryService`]: the SQLite-backed [`MemoryBackend`].
//!
//! Database work runs on the blocking pool through [`LocalMemoryService::with_conn`];
//! the connection lock is never held across an `.await`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

use super::search::{self, SearchConfig};
use super::store::{self, NewItem};
use super::types::{
    MemorizeResult, MemoryCategory, MemoryItem, MemoryType, Modality, RetrieveResult,
    RetrievedItem,
};
use super::{categories, forget, resources, MemoryBackend};
use crate::config::BridgeConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::llm::{strip_code_fence, LlmClient};

/// How many recent item summaries feed a category summary refresh.
const CATEGORY_SUMMARY_WINDOW: usize = 30;

const IMAGE_CAPTION_PROMPT: &str = "Describe this image in detail: people, animals, objects, \
visible text, setting, and anything that identifies who or what it is.";

pub struct LocalMemoryService {
    db: Arc<Mutex<Connection>>,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: Arc<BridgeConfig>,
    http: reqwest::Client,
}

/// Outcome of the intention-routing step.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub needs_retrieval: bool,
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedItem {
    #[serde(rename = "type", default)]
    memory_type: String,
    #[serde(default)]
    summary: String,
}

impl LocalMemoryService {
    /// Open the configured database and seed categories.
    pub fn open(
        config: Arc<BridgeConfig>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = crate::db::open_database(&db_path, embedder.dimensions())?;
        tracing::debug!(db = %db_path.display(), "memory database ready");
        Self::with_connection(conn, config, llm, embedder)
    }

    /// Wrap an already-open connection (in-memory databases in tests).
    pub fn with_connection(
        conn: Connection,
        config: Arc<BridgeConfig>,
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        crate::db::check_embedding_model(&conn, embedder.model_name())?;
        categories::seed_categories(&conn, &config.memorize.memory_categories)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            llm,
            embedder,
            config,
            http: reqwest::Client::new(),
        })
    }

    /// Run blocking database work on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await
        .context("db task failed")?
    }

    async fn search_once(&self, query: &str) -> Result<Vec<RetrievedItem>> {
        let embedding = self.embedder.embed(query).await?;
        let query_text = query.to_string();
        let search_config = SearchConfig::from(&self.config.retrieve);
        self.with_conn(move |conn| {
            search::search_items(
                conn,
                &embedding,
                &query_text,
                &search_config,
                chrono::Utc::now(),
            )
        })
        .await
    }

    /// Ask the LLM whether the query needs memory at all, and for a standalone
    /// rewrite. Any failure keeps the query as-is.
    async fn route_query(&self, query: &str) -> RouteDecision {
        let prompt = format!(
            "You route queries for a personal memory store.\n\
             Decide whether answering the query below requires the user's long-term memories.\n\
             If it does not, respond with exactly: NO_RETRIEVE\n\
             If it does, respond with RETRIEVE on the first line and, on the second line, \
             the query rewritten as a short standalone search query in its original language.\n\n\
             Query: {query}"
        );
        match self.llm.chat(&prompt).await {
            Ok(response) => parse_route_response(&response, query),
            Err(e) => {
                tracing::warn!(error = %e, "intention routing failed, searching with the raw query");
                RouteDecision {
                    needs_retrieval: true,
                    query: query.to_string(),
                }
            }
        }
    }

    async fn is_sufficient(&self, query: &str, items: &[RetrievedItem]) -> bool {
        let listing = items
            .iter()
            .map(|i| format!("- {}", i.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Query: {query}\n\nRetrieved memories:\n{listing}\n\n\
             Are these memories sufficient to answer the query? \
             Respond with exactly SUFFICIENT or INSUFFICIENT."
        );
        match self.llm.chat(&prompt).await {
            Ok(response) => !response.to_ascii_uppercase().contains("INSUFFICIENT"),
            Err(e) => {
                tracing::warn!(error = %e, "sufficiency check failed");
                true
            }
        }
    }

    /// Turn resource text into typed memory summaries.
    async fn extract_items(&self, text: &str, modality: Modality) -> Result<Vec<(MemoryType, String)>> {
        let prompt = format!(
            "Extract the facts worth remembering long-term about the user from this {modality}.\n\
             Respond with a JSON array only, each element shaped as\n\
             {{\"type\": \"profile|preference|fact|event\", \"summary\": \"one concise sentence\"}}.\n\
             Respond with [] if nothing is worth remembering.\n\n\
             {modality}:\n{text}"
        );
        let response = self.llm.chat(&prompt).await?;
        Ok(parse_extraction(&response))
    }

    /// Category names whose description embedding is close enough to each item.
    async fn assign_categories(&self, item_embeddings: &[Vec<f32>]) -> Result<Vec<Vec<String>>> {
        if item_embeddings.is_empty() {
            return Ok(Vec::new());
        }
        let cats = self
            .with_conn(|conn| categories::list_categories(conn))
            .await?;
        if cats.is_empty() {
            return Ok(vec![Vec::new(); item_embeddings.len()]);
        }

        let texts: Vec<String> = cats
            .iter()
            .map(|c| format!("{}: {}", c.name, c.description))
            .collect();
        let cat_embeddings = self.embedder.embed_batch(&texts).await?;
        let threshold = self.config.memorize.category_assign_threshold;

        Ok(item_embeddings
            .iter()
            .map(|item| {
                cats.iter()
                    .zip(&cat_embeddings)
                    .filter(|(_, cat)| cosine_similarity(item, cat) >= threshold)
                    .map(|(c, _)| c.name.clone())
                    .collect()
            })
            .collect())
    }

    /// Rewrite the rolling summary of each touched category. Best-effort.
    async fn refresh_category_summaries(&self, names: Vec<String>) {
        for name in names {
            let lookup = name.clone();
            let summaries = match self
                .with_conn(move |conn| {
                    categories::recent_summaries(conn, &lookup, CATEGORY_SUMMARY_WINDOW)
                })
                .await
            {
                Ok(s) if !s.is_empty() => s,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(category = %name, error = %e, "failed to load category items");
                    continue;
                }
            };

            let prompt = format!(
                "Summarize what is known about the user in the category \"{name}\" \
                 in at most three sentences, based on these memories:\n- {}",
                summaries.join("\n- ")
            );
            let summary = match self.llm.chat(&prompt).await {
                Ok(s) => s.trim().to_string(),
                Err(e) => {
                    tracing::warn!(category = %name, error = %e, "category summary failed");
                    continue;
                }
            };

            let category = name.clone();
            if let Err(e) = self
                .with_conn(move |conn| categories::set_category_summary(conn, &category, &summary))
                .await
            {
                tracing::warn!(category = %name, error = %e, "failed to save category summary");
            }
        }
    }

    /// Insert or reinforce one item.
    async fn write_item(
        &self,
        memory_type: MemoryType,
        summary: String,
        categories: Vec<String>,
        user_id: Option<String>,
        resource_id: Option<String>,
        embedding: Option<Vec<f32>>,
    ) -> Result<MemoryItem> {
        if self.config.memorize.enable_item_reinforcement {
            let key_summary = summary.clone();
            let cats = categories.clone();
            let reinforced = self
                .with_conn(move |conn| {
                    match store::find_reinforceable(conn, memory_type, &key_summary)? {
                        Some(id) => store::reinforce_item(conn, &id, &cats).map(Some),
                        None => Ok(None),
                    }
                })
                .await?;
            if let Some(item) = reinforced {
                return Ok(item);
            }
        }

        let embedding = match embedding {
            Some(e) => e,
            None => self.embedder.embed(&summary).await?,
        };

        self.with_conn(move |conn| {
            store::insert_item(
                conn,
                &NewItem {
                    memory_type,
                    summary: &summary,
                    user_id: user_id.as_deref(),
                    resource_id: resource_id.as_deref(),
                    categories: &categories,
                },
                &embedding,
            )
        })
        .await
    }
}

#[async_trait]
impl MemoryBackend for LocalMemoryService {
    async fn create_memory_item(
        &self,
        memory_type: MemoryType,
        content: &str,
        categories: &[String],
        user_id: Option<&str>,
    ) -> Result<MemoryItem> {
        anyhow::ensure!(!content.trim().is_empty(), "memory content must not be empty");
        let item = self
            .write_item(
                memory_type,
                content.trim().to_string(),
                categories.to_vec(),
                user_id.map(str::to_string),
                None,
                None,
            )
            .await?;
        tracing::info!(id = %item.id, memory_type = %memory_type, "memory item stored");
        Ok(item)
    }

    async fn retrieve(&self, query: &str) -> Result<RetrieveResult> {
        let retrieve = &self.config.retrieve;

        let route = if retrieve.route_intention {
            self.route_query(query).await
        } else {
            RouteDecision {
                needs_retrieval: true,
                query: query.to_string(),
            }
        };
        if !route.needs_retrieval {
            tracing::debug!(query = %query, "routing decided no retrieval is needed");
            return Ok(RetrieveResult::default());
        }

        let rewritten = (route.query != query).then(|| route.query.clone());
        let mut items = self.search_once(&route.query).await?;

        if retrieve.sufficiency_check
            && rewritten.is_some()
            && !self.is_sufficient(&route.query, &items).await
        {
            tracing::debug!("rewritten query judged insufficient, widening with the raw query");
            let extra = self.search_once(query).await?;
            items = search::merge_results(items, extra);
            items.truncate(retrieve.candidate_limit);
        }

        Ok(RetrieveResult {
            items,
            rewritten_query: rewritten,
        })
    }

    async fn delete_memory_item(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.with_conn(move |conn| forget::delete_item(conn, &id)).await
    }

    async fn list_memory_items(&self) -> Result<Vec<MemoryItem>> {
        self.with_conn(|conn| store::list_items(conn)).await
    }

    async fn list_memory_categories(&self) -> Result<Vec<MemoryCategory>> {
        self.with_conn(|conn| categories::list_categories(conn)).await
    }

    async fn memorize(
        &self,
        resource_url: &str,
        modality: Modality,
        user_id: Option<&str>,
    ) -> Result<MemorizeResult> {
        anyhow::ensure!(!resource_url.is_empty(), "resource URL must not be empty");

        // 1. Ingest + preprocess
        let (text, caption) = match modality {
            Modality::Image => {
                let caption = self
                    .llm
                    .vision(IMAGE_CAPTION_PROMPT, resource_url, None)
                    .await
                    .context("image captioning failed")?;
                (caption.clone(), Some(caption))
            }
            Modality::Conversation => {
                let raw = resources::read_text(&self.http, resource_url).await?;
                (resources::render_conversation(&raw), None)
            }
            Modality::Text | Modality::Document => {
                (resources::read_text(&self.http, resource_url).await?, None)
            }
        };

        // 2. Extract
        let extracted = if text.trim().is_empty() {
            Vec::new()
        } else {
            self.extract_items(&text, modality).await?
        };
        tracing::info!(url = %resource_url, %modality, extracted = extracted.len(), "resource extracted");

        // 3. Embed and categorize
        let summaries: Vec<String> = extracted.iter().map(|(_, s)| s.clone()).collect();
        let embeddings = if summaries.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&summaries).await?
        };
        let assigned = self.assign_categories(&embeddings).await?;

        // 4. Store
        let url = resource_url.to_string();
        let user = user_id.map(str::to_string);
        let resource = self
            .with_conn(move |conn| {
                resources::insert_resource(conn, &url, modality, user.as_deref(), caption.as_deref())
            })
            .await?;

        let mut items = Vec::with_capacity(extracted.len());
        let mut touched: Vec<String> = Vec::new();
        for (((memory_type, summary), embedding), cats) in
            extracted.into_iter().zip(embeddings).zip(assigned)
        {
            for c in &cats {
                if !touched.contains(c) {
                    touched.push(c.clone());
                }
            }
            let item = self
                .write_item(
                    memory_type,
                    summary,
                    cats,
                    user_id.map(str::to_string),
                    Some(resource.id.clone()),
                    Some(embedding),
                )
                .await?;
            items.push(item);
        }

        self.refresh_category_summaries(touched).await;

        Ok(MemorizeResult { resource, items })
    }
}

/// Interpret the routing response. Unrecognized output means "retrieve as-is".
pub fn parse_route_response(response: &str, query: &str) -> RouteDecision {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next().unwrap_or_default().to_ascii_uppercase();

    if first.starts_with("NO_RETRIEVE") {
        return RouteDecision {
            needs_retrieval: false,
            query: query.to_string(),
        };
    }

    let rewrite = if first.starts_with("RETRIEVE") {
        lines.next().map(|l| {
            l.trim_start_matches("Query:")
                .trim()
                .trim_matches('"')
                .to_string()
        })
    } else {
        None
    };

    RouteDecision {
        needs_retrieval: true,
        query: rewrite
            .filter(|q| !q.is_empty())
            .unwrap_or_else(|| query.to_string()),
    }
}

/// Parse the extraction response. Unknown types become facts; blank summaries are dropped.
fn parse_extraction(response: &str) -> Vec<(MemoryType, String)> {
    let cleaned = strip_code_fence(response);
    let parsed: Vec<ExtractedItem> = match serde_json::from_str(cleaned.trim()) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(error = %e, "extraction response was not a JSON array");
            return Vec::new();
        }
    };

    parsed
        .into_iter()
        .filter(|i| !i.summary.trim().is_empty())
        .map(|i| {
            let memory_type = i.memory_type.parse().unwrap_or(MemoryType::Fact);
            (memory_type, i.summary.trim().to_string())
        })
        .collect()
}
