//! Category catalogue and item membership.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::types::MemoryCategory;
use crate::config::CategorySpec;

/// Insert the configured categories that do not exist yet. Returns how many were added.
pub fn seed_categories(conn: &Connection, specs: &[CategorySpec]) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut added = 0;
    for spec in specs {
        added += conn.execute(
            "INSERT OR IGNORE INTO memory_categories (id, name, description, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![uuid::Uuid::now_v7().to_string(), spec.name, spec.description, now],
        )?;
    }
    if added > 0 {
        tracing::info!(added, "seeded memory categories");
    }
    Ok(added)
}

/// All categories in creation order.
pub fn list_categories(conn: &Connection) -> Result<Vec<MemoryCategory>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, summary FROM memory_categories ORDER BY rowid",
    )?;
    let categories = stmt
        .query_map([], |row| {
            Ok(MemoryCategory {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                summary: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Link an item to categories by name, creating unknown categories on the fly.
/// Returns the names now linked, in the order given, without duplicates.
pub(crate) fn link_item(conn: &Connection, item_id: &str, names: &[String]) -> Result<Vec<String>> {
    let mut linked: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() || linked.iter().any(|n| n == name) {
            continue;
        }
        let category_id = ensure_category(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO category_items (category_id, item_id) VALUES (?1, ?2)",
            params![category_id, item_id],
        )?;
        linked.push(name.to_string());
    }
    Ok(linked)
}

fn ensure_category(conn: &Connection, name: &str) -> Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM memory_categories WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO memory_categories (id, name, description, created_at, updated_at) \
         VALUES (?1, ?2, '', ?3, ?3)",
        params![id, name, now],
    )?;
    tracing::info!(category = %name, "created memory category");
    Ok(id)
}

pub fn category_names_for_item(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.name FROM category_items ci JOIN memory_categories c ON c.id = ci.category_id \
         WHERE ci.item_id = ?1 ORDER BY c.rowid",
    )?;
    let names = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Most recent item summaries in a category, newest first.
pub fn recent_summaries(conn: &Connection, name: &str, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT m.summary FROM memory_items m \
         JOIN category_items ci ON ci.item_id = m.id \
         JOIN memory_categories c ON c.id = ci.category_id \
         WHERE c.name = ?1 ORDER BY m.created_at DESC LIMIT ?2",
    )?;
    let summaries = stmt
        .query_map(params![name, limit as i64], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(summaries)
}

pub fn set_category_summary(conn: &Connection, name: &str, summary: &str) -> Result<()> {
    conn.execute(
        "UPDATE memory_categories SET summary = ?1, updated_at = ?2 WHERE name = ?3",
        params![summary, chrono::Utc::now().to_rfc3339(), name],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::db;

    #[test]
    fn seeding_is_idempotent() {
        let conn = db::open_memory_database(8).unwrap();
        let specs = BridgeConfig::default().memorize.memory_categories;

        assert_eq!(seed_categories(&conn, &specs).unwrap(), 4);
        assert_eq!(seed_categories(&conn, &specs).unwrap(), 0);

        let names: Vec<String> = list_categories(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["User Profile", "Preferences", "Facts", "Events"]);
    }

    #[test]
    fn link_creates_unknown_categories_and_skips_duplicates() {
        let conn = db::open_memory_database(8).unwrap();
        conn.execute(
            "INSERT INTO memory_items (id, memory_type, summary, summary_key, extra, created_at, updated_at) \
             VALUES ('i1', 'fact', 's', 's', '{}', 't', 't')",
            [],
        )
        .unwrap();

        let linked = link_item(
            &conn,
            "i1",
            &["Pets".to_string(), " Pets ".to_string(), String::new()],
        )
        .unwrap();
        assert_eq!(linked, vec!["Pets".to_string()]);
        assert_eq!(category_names_for_item(&conn, "i1").unwrap(), vec!["Pets".to_string()]);

        set_category_summary(&conn, "Pets", "The user has pets.").unwrap();
        let cat = list_categories(&conn).unwrap().pop().unwrap();
        assert_eq!(cat.summary.as_deref(), Some("The user has pets."));
        assert_eq!(recent_summaries(&conn, "Pets", 5).unwrap(), vec!["s".to_string()]);
    }
}
