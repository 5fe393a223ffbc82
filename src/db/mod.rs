pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the memory database at the given path, with all extensions
/// loaded, schema initialized, and migrations applied.
///
/// `dimensions` sizes the vector table on first creation; an existing database
/// created with a different dimension is rejected.
pub fn open_database(path: impl AsRef<Path>, dimensions: usize) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    prepare(&conn, dimensions)?;

    tracing::debug!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database, used by tests.
pub fn open_memory_database(dimensions: usize) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    prepare(&conn, dimensions)?;
    Ok(conn)
}

fn prepare(conn: &Connection, dimensions: usize) -> Result<()> {
    schema::init_schema(conn, dimensions).context("failed to initialize schema")?;
    migrations::run_migrations(conn).context("failed to run migrations")?;

    if let Some(stored) = migrations::get_embedding_dimensions(conn)? {
        anyhow::ensure!(
            stored == dimensions,
            "embedding dimensions changed (database has {stored}, configured {dimensions}); \
             point MEMU_DB_PATH at a new database or set EMBED_DIMENSIONS={stored}"
        );
    }
    Ok(())
}

/// Record the embedding model, warning when it differs from the one stored.
pub fn check_embedding_model(conn: &Connection, model: &str) -> Result<()> {
    match migrations::get_embedding_model(conn)? {
        Some(stored) if stored != model => {
            tracing::warn!(
                stored = %stored,
                configured = %model,
                "embedding model changed; similarity against older items will be unreliable"
            );
        }
        Some(_) => {}
        None => migrations::set_embedding_model(conn, model)?,
    }
    Ok(())
}
