//! # SQLite
//!
//! Single connection behind an async mutex. Writes are serialized, which is
//! all an event site needs.
//!
//! ## Tables
//!
//! - users, roles, users_roles
//! - events, categories, resources
//! - projects + project_versions (one snapshot per save)
//! - activities (the project log: create, update, star, boost, review)
//! - sessions (signed cookie id -> user + queued flashes)
//!
//! Schema history lives in [`migrations`], keyed by `PRAGMA user_version`.
use std::path::Path;

use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AppError;

pub mod migrations;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens `:memory:` or a file path and brings the schema up to date.
    pub fn open(database_url: &str) -> Result<Self, AppError> {
        let path = database_url.trim_start_matches("sqlite://");
        let conn = if path == ":memory:" || path.is_empty() {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(path))?
        };

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        apply_pragmas(&conn)?;
        migrations::run_migrations(&conn)?;
        info!(
            version = migrations::current_version(&conn)?,
            "database ready"
        );

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let guard = self.conn.lock().await;
        f(&guard)
    }

    /// Runs `f` inside a transaction, rolled back when `f` fails.
    pub async fn transaction<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let guard = self.conn.lock().await;
        let tx = guard.unchecked_transaction()?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }
}

fn apply_pragmas(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    // in-memory databases report "memory" and ignore WAL
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(())
}
