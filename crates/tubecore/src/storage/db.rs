use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Creates the parent directory if needed, initializes a pool with up to
/// 8 connections and brings the schema up to date.
///
/// # Example
///
/// ```no_run
/// use tubecore::storage::create_pool;
///
/// let pool = create_pool("config/app.db")?;
/// # Ok::<(), tubecore::AppError>(())
/// ```
pub fn create_pool(database_path: impl AsRef<Path>) -> AppResult<DbPool> {
    let database_path = database_path.as_ref();
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    log::info!("Opening database at {}", database_path.display());

    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(Duration::from_secs(5))
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> AppResult<DbConnection> {
    Ok(pool.get()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_pool_creates_parent_dir_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("app.db");

        let pool = create_pool(&path).unwrap();
        let conn = get_connection(&pool).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let dir = tempdir().unwrap();
        let pool = create_pool(dir.path().join("app.db")).unwrap();
        let conn = get_connection(&pool).unwrap();

        let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(enabled, 1);
    }
}
