//! Schema for the durable store.
//!
//! `schema_version` records every applied step. Each step runs in its own
//! transaction together with its version row, so a failed step leaves the
//! schema at the previous version.

use chrono::Utc;
use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// Schema steps in application order.
const STEPS: &[(u32, &str, &str)] = &[
    (1, "search cache", include_str!("../../migrations/001_search_cache.sql")),
    (2, "listings", include_str!("../../migrations/002_listings.sql")),
];

/// Version the schema reaches once every step is applied.
pub const LATEST_VERSION: u32 = STEPS.len() as u32;

fn current_version(conn: &rusqlite::Connection) -> Result<u32, Error> {
    let version: u32 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;
    Ok(version)
}

fn apply_pending(conn: &mut rusqlite::Connection, target: u32) -> Result<u32, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let mut version = current_version(conn)?;
    for (step, name, sql) in STEPS.iter().filter(move |(step, _, _)| *step > version && *step <= target) {
        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("step {step} ({name}): {e}")))?;
        tx.execute(
            "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![step, name, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        tracing::debug!(version = step, name, "Applied schema step");
        version = *step;
    }

    Ok(version)
}

/// Bring the schema up to [`LATEST_VERSION`]; returns the resulting version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step whose SQL failed.
pub async fn run(conn: &Connection) -> Result<u32, Error> {
    conn.call(|conn| apply_pending(conn, LATEST_VERSION)).await.map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, table: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                [table],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_twice_is_noop() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), LATEST_VERSION);
        assert_eq!(run(&conn).await.unwrap(), LATEST_VERSION);

        assert!(table_exists(&conn, "search_cache").await);
        assert!(table_exists(&conn, "listings").await);

        let rows: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(rows, i64::from(LATEST_VERSION));
    }

    #[tokio::test]
    async fn test_upgrade_from_first_step() {
        let conn = Connection::open_in_memory().await.unwrap();
        let first: u32 = conn.call(|conn| apply_pending(conn, 1)).await.unwrap();
        assert_eq!(first, 1);
        assert!(table_exists(&conn, "search_cache").await);
        assert!(!table_exists(&conn, "listings").await);

        assert_eq!(run(&conn).await.unwrap(), 2);
        assert!(table_exists(&conn, "listings").await);
    }
}
