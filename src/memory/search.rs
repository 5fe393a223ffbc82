use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;

use super::store::{item_from_row, ITEM_COLUMNS};
use super::types::{MemoryItem, RetrievedItem};
use crate::config::{RankingStrategy, RetrieveConfig};

/// Search configuration knobs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub candidate_limit: usize,
    pub rrf_k: usize,
    pub ranking: RankingStrategy,
    pub recency_decay_days: f64,
}

impl From<&RetrieveConfig> for SearchConfig {
    fn from(config: &RetrieveConfig) -> Self {
        Self {
            candidate_limit: config.candidate_limit,
            rrf_k: config.rrf_k,
            ranking: config.ranking,
            recency_decay_days: config.recency_decay_days,
        }
    }
}

/// Hybrid search: vector KNN + FTS5 BM25 → RRF merge → rank → truncate.
pub fn search_items(
    conn: &Connection,
    query_embedding: &[f32],
    query_text: &str,
    config: &SearchConfig,
    now: DateTime<Utc>,
) -> Result<Vec<RetrievedItem>> {
    let candidate_limit = config.candidate_limit.max(1) * 3;

    let vec_results = vector_search(conn, query_embedding, candidate_limit)?;
    let fts_results = fts_search(conn, query_text, candidate_limit)?;
    let merged = rrf_merge(&vec_results, &fts_results, config.rrf_k);

    let ids: Vec<&str> = merged.iter().map(|(id, _)| id.as_str()).collect();
    let items = fetch_items(conn, &ids)?;

    let mut ranked: Vec<RetrievedItem> = merged
        .iter()
        .filter_map(|(id, fused)| {
            let item = items.get(id)?;
            Some(RetrievedItem {
                id: item.id.clone(),
                memory_type: item.memory_type,
                summary: item.summary.clone(),
                created_at: item.created_at.clone(),
                score: rank_score(*fused, item, config, now),
            })
        })
        .collect();

    sort_by_score(&mut ranked);
    ranked.truncate(config.candidate_limit);
    Ok(ranked)
}

/// Merge two result lists by id, keeping the higher score, and re-sort.
pub fn merge_results(primary: Vec<RetrievedItem>, extra: Vec<RetrievedItem>) -> Vec<RetrievedItem> {
    let mut by_id: HashMap<String, RetrievedItem> = HashMap::new();
    for item in primary.into_iter().chain(extra) {
        match by_id.get(&item.id) {
            Some(existing) if existing.score >= item.score => {}
            _ => {
                by_id.insert(item.id.clone(), item);
            }
        }
    }
    let mut merged: Vec<RetrievedItem> = by_id.into_values().collect();
    sort_by_score(&mut merged);
    merged
}

fn sort_by_score(items: &mut [RetrievedItem]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Final score for an item given its fused retrieval score.
///
/// `Similarity` uses the fused score as-is. `Salience` weights it by
/// `ln(e - 1 + reinforcement_count)` (1.0 for a never-reinforced item) and by a
/// half-life recency decay of `recency_decay_days`.
pub fn rank_score(
    fused: f64,
    item: &MemoryItem,
    config: &SearchConfig,
    now: DateTime<Utc>,
) -> f64 {
    match config.ranking {
        RankingStrategy::Similarity => fused,
        RankingStrategy::Salience => {
            let reinforcement = (std::f64::consts::E - 1.0 + item.reinforcement_count() as f64).ln();
            let recency = match item.created_at_utc() {
                Some(created) if config.recency_decay_days > 0.0 => {
                    let age_days = (now - created).num_seconds().max(0) as f64 / 86_400.0;
                    0.5f64.powf(age_days / config.recency_decay_days)
                }
                _ => 1.0,
            };
            fused * reinforcement * recency
        }
    }
}

/// Vector KNN search via sqlite-vec (cosine distance).
fn vector_search(conn: &Connection, embedding: &[f32], limit: usize) -> Result<Vec<(String, f64)>> {
    let embedding_bytes = super::embedding_to_bytes(embedding);
    let mut stmt = conn.prepare(
        "SELECT id, distance FROM memory_items_vec \
         WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
    )?;
    let results = stmt
        .query_map(params![embedding_bytes, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

/// FTS5 BM25 keyword search. Returns (id, rank) pairs, best first.
fn fts_search(conn: &Connection, query_text: &str, limit: usize) -> Result<Vec<(String, f64)>> {
    let escaped = escape_fts_query(query_text);
    if escaped.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT id, rank FROM memory_items_fts \
         WHERE memory_items_fts MATCH ?1 ORDER BY rank LIMIT ?2",
    )?;
    let results = stmt
        .query_map(params![escaped, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(results)
}

/// Quote each whitespace-delimited word and join with `OR`, so any matching
/// term contributes and FTS5 operators in user text are inert.
fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|w| !w.is_empty())
        .map(|w| format!("\"{w}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Reciprocal Rank Fusion merge.
fn rrf_merge(
    vec_results: &[(String, f64)],
    fts_results: &[(String, f64)],
    k: usize,
) -> Vec<(String, f64)> {
    let mut scores: HashMap<String, f64> = HashMap::new();

    for (rank, (id, _distance)) in vec_results.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k as f64 + rank as f64 + 1.0);
    }
    for (rank, (id, _bm25)) in fts_results.iter().enumerate() {
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k as f64 + rank as f64 + 1.0);
    }

    let mut merged: Vec<(String, f64)> = scores.into_iter().collect();
    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

fn fetch_items(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, MemoryItem>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM memory_items WHERE id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> =
        ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

    let rows = stmt
        .query_map(params.as_slice(), item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows.into_iter().map(|item| (item.id.clone(), item)).collect())
}
