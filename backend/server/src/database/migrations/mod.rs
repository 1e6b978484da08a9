//! Schema migrations using PRAGMA user_version.

pub mod v001_initial;
pub mod v002_project_versions;
pub mod v003_event_hashtags;
pub mod v004_sessions;
pub mod v005_activation_hash;

use rusqlite::Connection;
use tracing::info;

use crate::error::AppError;

pub const LATEST_VERSION: u32 = 5;

const MIGRATIONS: &[(&str, u32)] = &[
    (v001_initial::MIGRATION_SQL, 1),
    (v002_project_versions::MIGRATION_SQL, 2),
    (v003_event_hashtags::MIGRATION_SQL, 3),
    (v004_sessions::MIGRATION_SQL, 4),
    (v005_activation_hash::MIGRATION_SQL, 5),
];

/// Applies every migration above the stored version, each in its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    let current = current_version(conn)?;

    for (sql, version) in MIGRATIONS {
        if current >= *version {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;

        info!(version = version, "applied migration");
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<u32, AppError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
