use anyhow::Result;
use serde::Serialize;

use super::Context;
use crate::memory::types::{MemoryItem, MemoryType};

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub success: bool,
    pub count: usize,
    pub total: usize,
    pub items: Vec<ListEntry>,
}

#[derive(Debug, Serialize)]
pub struct ListEntry {
    pub id: String,
    pub summary: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub created_at: String,
}

pub async fn list(ctx: &Context, limit: usize) -> Result<ListOutput> {
    let items = ctx.memory.list_memory_items().await?;
    let total = items.len();
    let items: Vec<ListEntry> = newest_first(items)
        .into_iter()
        .take(limit)
        .map(|item| ListEntry {
            id: item.id,
            summary: item.summary,
            memory_type: item.memory_type,
            created_at: item.created_at,
        })
        .collect();

    Ok(ListOutput {
        success: true,
        count: items.len(),
        total,
        items,
    })
}

/// Sort by `created_at` descending. Timestamps are RFC 3339 in UTC, so they sort as strings.
fn newest_first(mut items: Vec<MemoryItem>) -> Vec<MemoryItem> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}
