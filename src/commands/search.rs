use anyhow::Result;
use serde::Serialize;

use super::Context;
use crate::memory::types::MemoryType;
use crate::preprocess::preprocess;

#[derive(Debug, Serialize)]
pub struct SearchOutput {
    pub success: bool,
    /// Number of items retrieved, before `limit` is applied.
    pub count: usize,
    pub items: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
}

/// Strip stopwords from the query, retrieve, and return the top `limit` hits.
pub async fn search(ctx: &Context, query: &str, limit: usize) -> Result<SearchOutput> {
    let processed = preprocess(query);
    tracing::debug!(raw = %query, processed = %processed, "search query preprocessed");

    let result = ctx.memory.retrieve(&processed).await?;
    if let Some(rewritten) = &result.rewritten_query {
        tracing::debug!(rewritten = %rewritten, "query rewritten by intention routing");
    }

    Ok(SearchOutput {
        success: true,
        count: result.items.len(),
        items: result
            .items
            .into_iter()
            .take(limit)
            .map(|item| SearchHit {
                id: item.id,
                summary: item.summary,
                memory_type: item.memory_type,
            })
            .collect(),
    })
}
