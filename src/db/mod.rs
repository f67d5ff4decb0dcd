pub mod migrations;
pub mod queries;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

use crate::errors::AppError;

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let mut conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("failed to set busy timeout")?;

    migrations::run_migrations(&mut conn)?;

    Ok(conn)
}

/// Async gateway to the single SQLite connection.
///
/// Each call runs on the blocking pool while holding the connection lock, and
/// is abandoned with [`AppError::StorageTimeout`] once `timeout` elapses. An
/// abandoned call still finishes in the background; a transaction it opened
/// either commits or rolls back as a whole.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl Db {
    pub fn new(conn: Connection, timeout: Duration) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        }
    }

    pub async fn call<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Internal("database lock poisoned".to_string()))?;
            f(&mut guard)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AppError::Internal(format!("storage task failed: {e}"))),
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "storage call timed out");
                Err(AppError::StorageTimeout)
            }
        }
    }

    /// Direct access for seeding and tests.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}
