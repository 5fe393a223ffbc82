//! Write path: insertion, reinforcement, and item reads.
//!
//! [`insert_item`] runs inside a transaction: insert the row, sync the FTS5 index,
//! insert the embedding, and link categories. [`reinforce_item`] is the
//! alternative taken when an identical item already exists.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;

use super::categories::link_item;
use super::types::{MemoryItem, MemoryType};

/// Columns selected by every item query, in [`item_from_row`] order.
pub(crate) const ITEM_COLUMNS: &str =
    "id, memory_type, summary, user_id, resource_id, extra, created_at, updated_at";

/// An item about to be written.
pub struct NewItem<'a> {
    pub memory_type: MemoryType,
    pub summary: &'a str,
    pub user_id: Option<&'a str>,
    pub resource_id: Option<&'a str>,
    pub categories: &'a [String],
}

/// Normalized form used to detect repeated items: lowercase, single-spaced.
pub fn summary_key(summary: &str) -> String {
    summary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Insert a new item with its embedding. Returns the stored record.
pub fn insert_item(conn: &mut Connection, item: &NewItem, embedding: &[f32]) -> Result<MemoryItem> {
    let tx = conn.transaction()?;

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let extra = serde_json::json!({"reinforcement_count": 1});

    tx.execute(
        "INSERT INTO memory_items (id, memory_type, summary, summary_key, user_id, resource_id, extra, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            id,
            item.memory_type.as_str(),
            item.summary,
            summary_key(item.summary),
            item.user_id,
            item.resource_id,
            extra.to_string(),
            now,
        ],
    )?;
    let rowid = tx.last_insert_rowid();

    // FTS5 external content table must be synced with the same rowid
    tx.execute(
        "INSERT INTO memory_items_fts (rowid, summary, id) VALUES (?1, ?2, ?3)",
        params![rowid, item.summary, id],
    )?;

    tx.execute(
        "INSERT INTO memory_items_vec (id, embedding) VALUES (?1, ?2)",
        params![id, super::embedding_to_bytes(embedding)],
    )?;

    let categories = link_item(&tx, &id, item.categories)?;

    tx.commit()?;

    tracing::debug!(id = %id, memory_type = %item.memory_type, "memory item inserted");

    Ok(MemoryItem {
        id,
        memory_type: item.memory_type,
        summary: item.summary.to_string(),
        user_id: item.user_id.map(str::to_string),
        resource_id: item.resource_id.map(str::to_string),
        created_at: now.clone(),
        updated_at: now,
        extra,
        categories,
    })
}

/// Find an existing item of the same type whose summary normalizes identically.
pub fn find_reinforceable(
    conn: &Connection,
    memory_type: MemoryType,
    summary: &str,
) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM memory_items WHERE memory_type = ?1 AND summary_key = ?2 \
             ORDER BY created_at LIMIT 1",
            params![memory_type.as_str(), summary_key(summary)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Bump an item's `reinforcement_count`, link any new categories, and return it.
pub fn reinforce_item(
    conn: &mut Connection,
    item_id: &str,
    categories: &[String],
) -> Result<MemoryItem> {
    let tx = conn.transaction()?;

    let extra_json: Option<String> = tx
        .query_row(
            "SELECT extra FROM memory_items WHERE id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(extra_json) = extra_json else {
        bail!("memory item not found: {item_id}");
    };

    let mut extra: serde_json::Value =
        serde_json::from_str(&extra_json).unwrap_or_else(|_| serde_json::json!({}));
    if !extra.is_object() {
        extra = serde_json::json!({});
    }
    let count = extra
        .get("reinforcement_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(1);
    let now = chrono::Utc::now().to_rfc3339();
    extra["reinforcement_count"] = serde_json::json!(count + 1);
    extra["last_reinforced_at"] = serde_json::json!(now);

    tx.execute(
        "UPDATE memory_items SET extra = ?1, updated_at = ?2 WHERE id = ?3",
        params![extra.to_string(), now, item_id],
    )?;
    link_item(&tx, item_id, categories)?;

    tx.commit()?;

    tracing::debug!(id = %item_id, count = count + 1, "memory item reinforced");
    get_item(conn, item_id)
}

/// Fetch a single item with its categories.
pub fn get_item(conn: &Connection, item_id: &str) -> Result<MemoryItem> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM memory_items WHERE id = ?1");
    let item = conn
        .query_row(&sql, params![item_id], item_from_row)
        .optional()?;
    let Some(mut item) = item else {
        bail!("memory item not found: {item_id}");
    };
    item.categories = super::categories::category_names_for_item(conn, item_id)?;
    Ok(item)
}

/// All items, oldest first, with categories attached.
pub fn list_items(conn: &Connection) -> Result<Vec<MemoryItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM memory_items ORDER BY created_at, rowid");
    let mut stmt = conn.prepare(&sql)?;
    let mut items = stmt
        .query_map([], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    let mut stmt = conn.prepare(
        "SELECT ci.item_id, c.name FROM category_items ci \
         JOIN memory_categories c ON c.id = ci.category_id ORDER BY c.rowid",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (item_id, name) = row?;
        links.entry(item_id).or_default().push(name);
    }

    for item in &mut items {
        if let Some(names) = links.remove(&item.id) {
            item.categories = names;
        }
    }
    Ok(items)
}

/// Map a row selected with [`ITEM_COLUMNS`]. Categories are left empty.
pub(crate) fn item_from_row(row: &Row) -> rusqlite::Result<MemoryItem> {
    let type_str: String = row.get(1)?;
    let memory_type = type_str.parse::<MemoryType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;
    let extra_str: String = row.get(5)?;
    Ok(MemoryItem {
        id: row.get(0)?,
        memory_type,
        summary: row.get(2)?,
        user_id: row.get(3)?,
        resource_id: row.get(4)?,
        extra: serde_json::from_str(&extra_str).unwrap_or_else(|_| serde_json::json!({})),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        categories: Vec::new(),
    })
}
