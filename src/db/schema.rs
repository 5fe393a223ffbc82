//! SQL DDL for the memory store.
//!
//! Defines `resources`, `memory_items`, `memory_items_fts` (FTS5),
//! `memory_items_vec` (vec0), `memory_categories`, `category_items`, and
//! `schema_meta`. All DDL uses `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

const SCHEMA_SQL: &str = r#"
-- Ingested resources (files, images, URLs)
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    modality TEXT NOT NULL CHECK(modality IN ('text','conversation','document','image')),
    user_id TEXT,
    caption TEXT,
    created_at TEXT NOT NULL
);

-- Memory items
CREATE TABLE IF NOT EXISTS memory_items (
    id TEXT PRIMARY KEY,
    memory_type TEXT NOT NULL CHECK(memory_type IN ('profile','preference','fact','event')),
    summary TEXT NOT NULL,
    summary_key TEXT NOT NULL,
    user_id TEXT,
    resource_id TEXT REFERENCES resources(id) ON DELETE SET NULL,
    extra TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_type ON memory_items(memory_type);
CREATE INDEX IF NOT EXISTS idx_items_key ON memory_items(summary_key);
CREATE INDEX IF NOT EXISTS idx_items_created ON memory_items(created_at);

-- Full-text search (BM25)
CREATE VIRTUAL TABLE IF NOT EXISTS memory_items_fts USING fts5(
    summary,
    id UNINDEXED,
    content='memory_items',
    content_rowid='rowid'
);

-- Categories and their membership
CREATE TABLE IF NOT EXISTS memory_categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    summary TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS category_items (
    category_id TEXT NOT NULL REFERENCES memory_categories(id) ON DELETE CASCADE,
    item_id TEXT NOT NULL REFERENCES memory_items(id) ON DELETE CASCADE,
    PRIMARY KEY (category_id, item_id)
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 DDL. The dimension is fixed per database and recorded in `schema_meta`.
fn vec_table_sql(dimensions: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memory_items_vec USING vec0(\n\
         id TEXT PRIMARY KEY,\n\
         embedding FLOAT[{dimensions}] distance_metric=cosine\n\
         );"
    )
}

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection, dimensions: usize) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&vec_table_sql(dimensions))?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_dimensions', ?1)",
        [dimensions.to_string()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, 8).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "resources",
            "memory_items",
            "memory_items_fts",
            "memory_items_vec",
            "memory_categories",
            "category_items",
            "schema_meta",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }

        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, 8).unwrap();
        init_schema(&conn, 8).unwrap();
    }

    #[test]
    fn records_embedding_dimensions() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, 16).unwrap();
        let dims: String = conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'embedding_dimensions'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(dims, "16");
    }
}
