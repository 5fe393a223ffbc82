//! Memory item deletion.
//!
//! Removes an item from the items table, the FTS5 index, and the vector index.
//! Category links go with it via `ON DELETE CASCADE`.

use anyhow::Result;
use rusqlite::{params, Connection};

/// Permanently delete a memory item by ID.
pub fn delete_item(conn: &mut Connection, item_id: &str) -> Result<()> {
    let tx = conn.transaction()?;

    let (rowid, summary): (i64, String) = tx
        .query_row(
            "SELECT rowid, summary FROM memory_items WHERE id = ?1",
            params![item_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                anyhow::anyhow!("memory item not found: {item_id}")
            }
            other => anyhow::anyhow!("database error: {other}"),
        })?;

    // External content FTS5 tables need the original values to delete
    tx.execute(
        "INSERT INTO memory_items_fts(memory_items_fts, rowid, summary, id) VALUES('delete', ?1, ?2, ?3)",
        params![rowid, summary, item_id],
    )?;

    tx.execute("DELETE FROM memory_items_vec WHERE id = ?1", params![item_id])?;
    tx.execute("DELETE FROM memory_items WHERE id = ?1", params![item_id])?;

    tx.commit()?;

    tracing::debug!(id = %item_id, "memory item deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::memory::store::{self, NewItem};
    use crate::memory::types::MemoryType;

    fn insert(conn: &mut Connection, summary: &str) -> String {
        let mut emb = vec![0.0f32; 8];
        emb[0] = 1.0;
        store::insert_item(
            conn,
            &NewItem {
                memory_type: MemoryType::Event,
                summary,
                user_id: None,
                resource_id: None,
                categories: &["Events".to_string()],
            },
            &emb,
        )
        .unwrap()
        .id
    }

    #[test]
    fn delete_removes_row_indexes_and_links() {
        let mut conn = db::open_memory_database(8).unwrap();
        let id = insert(&mut conn, "Adopted a dog named Moka");

        delete_item(&mut conn, &id).unwrap();

        for table in ["memory_items", "memory_items_vec", "category_items"] {
            let column = if table == "category_items" { "item_id" } else { "id" };
            let count: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
                    [&id],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 0, "{table} still references the item");
        }

        let fts: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM memory_items_fts WHERE memory_items_fts MATCH '\"Moka\"'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(fts, 0);
    }

    #[test]
    fn delete_missing_item_errors() {
        let mut conn = db::open_memory_database(8).unwrap();
        let err = delete_item(&mut conn, "missing").unwrap_err();
        assert_eq!(err.to_string(), "memory item not found: missing");
    }
}
