//! SQLite persistence behind a long-lived connection pool.
//!
//! The pool is owned by `Database` and connections are acquired per operation,
//! so no handler ever opens its own connection or holds one across an await.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result as SqliteResult;

use super::cache::DbCache;

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
    pub(crate) cache: DbCache,
}

impl Database {
    /// Open (or create) the database at `path` and run schema init.
    /// `":memory:"` is supported for tests; the pool is then capped at one
    /// connection so every caller sees the same in-memory database.
    pub fn new(path: &str) -> Result<Self, String> {
        let manager = if path == ":memory:" {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path)
        };

        let builder = if path == ":memory:" {
            Pool::builder().max_size(1)
        } else {
            Pool::builder().max_size(8)
        };

        let pool = builder
            .build(manager)
            .map_err(|e| format!("Failed to build connection pool: {}", e))?;

        let db = Database {
            pool,
            cache: DbCache::new(),
        };
        db.init_schema()
            .map_err(|e| format!("Failed to initialize database schema: {}", e))?;
        Ok(db)
    }

    /// Acquire a pooled connection for one operation. Acquisition failure
    /// (a saturated pool at the checkout timeout) is reported as SQLITE_BUSY
    /// so it travels the same storage-error path as any other query failure.
    pub(crate) fn conn(&self) -> SqliteResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                Some(format!("failed to acquire pooled connection: {}", e)),
            )
        })
    }

    fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id          INTEGER PRIMARY KEY,
                api_key           TEXT,
                current_model     TEXT,
                model_message_id  INTEGER,
                model_channel_id  INTEGER,
                welcome_sent      INTEGER NOT NULL DEFAULT 0,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}
