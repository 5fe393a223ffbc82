//! `cleanup`: age out memories that were never reinforced.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::Context;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CleanupParams {
    pub max_age_days: i64,
    /// Accepted for compatibility with existing callers. Has no effect.
    pub min_importance: f64,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            max_age_days: 90,
            min_importance: 0.3,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CleanupOutput {
    pub success: bool,
    pub deleted: usize,
    pub kept: usize,
    pub total_before: usize,
    pub deleted_ids: Vec<String>,
}

pub async fn cleanup(ctx: &Context, params: CleanupParams) -> Result<CleanupOutput> {
    cleanup_at(ctx, &params, Utc::now()).await
}

/// Delete items created before `now - max_age_days` whose reinforcement count is
/// at most 1. Items with an unreadable timestamp are kept. A failed delete is
/// logged and the item counts as neither deleted nor kept.
pub async fn cleanup_at(
    ctx: &Context,
    params: &CleanupParams,
    now: DateTime<Utc>,
) -> Result<CleanupOutput> {
    tracing::debug!(
        max_age_days = params.max_age_days,
        min_importance = params.min_importance,
        "cleanup started"
    );
    let cutoff = TimeDelta::try_days(params.max_age_days)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| anyhow::anyhow!("max_age_days out of range: {}", params.max_age_days))?;
    let items = ctx.memory.list_memory_items().await?;

    let mut deleted_ids = Vec::new();
    let mut kept = 0;
    for item in &items {
        let expired = item.created_at_utc().is_some_and(|created| created < cutoff);
        if !expired || item.reinforcement_count() > 1 {
            kept += 1;
            continue;
        }
        match ctx.memory.delete_memory_item(&item.id).await {
            Ok(()) => deleted_ids.push(item.id.clone()),
            Err(e) => tracing::warn!(id = %item.id, error = %e, "cleanup delete failed"),
        }
    }

    tracing::info!(deleted = deleted_ids.len(), kept, "cleanup finished");
    Ok(CleanupOutput {
        success: true,
        deleted: deleted_ids.len(),
        kept,
        total_before: items.len(),
        deleted_ids,
    })
}
