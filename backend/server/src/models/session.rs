use chrono::{Duration, NaiveDateTime};
use rand::{thread_rng, RngCore};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::now;
use crate::error::AppError;

/// Sessions are remembered for a month.
pub const SESSION_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Warning,
    Danger,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl Flash {
    pub fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// A session as one request sees it. Changes are kept apart from what was
/// loaded so that [`SessionRow::store`] only writes what this request touched.
#[derive(Clone, Debug)]
pub struct SessionRow {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    user_id: Option<i64>,
    oauth_state: Option<String>,
    stored_flashes: Vec<Flash>,
    new_flashes: Vec<Flash>,
    consumed: usize,
    user_changed: bool,
    oauth_changed: bool,
    persisted: bool,
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn read_flashes(conn: &Connection, id: &str) -> Result<Vec<Flash>, AppError> {
    let raw: Option<String> = conn
        .query_row("SELECT flashes FROM sessions WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    match raw {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

impl SessionRow {
    /// A fresh session that only reaches the table once something is stored.
    pub fn new() -> Self {
        let created_at = now();
        Self {
            id: new_session_id(),
            created_at,
            expires_at: created_at + Duration::days(SESSION_DAYS),
            user_id: None,
            oauth_state: None,
            stored_flashes: Vec::new(),
            new_flashes: Vec::new(),
            consumed: 0,
            user_changed: false,
            oauth_changed: false,
            persisted: false,
        }
    }

    /// Live session by id; expired rows are treated as missing.
    pub fn load(conn: &Connection, id: &str) -> Result<Option<Self>, AppError> {
        let found = conn
            .query_row(
                "SELECT id, user_id, flashes, oauth_state, created_at, expires_at
                 FROM sessions WHERE id = ?1 AND expires_at > ?2",
                params![id, now()],
                |row| {
                    Ok((
                        Self {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            oauth_state: row.get(3)?,
                            created_at: row.get(4)?,
                            expires_at: row.get(5)?,
                            persisted: true,
                            ..Self::new()
                        },
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match found {
            Some((mut session, flashes)) => {
                session.stored_flashes = serde_json::from_str(&flashes)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn set_user_id(&mut self, user_id: Option<i64>) {
        if self.user_id != user_id {
            self.user_id = user_id;
            self.user_changed = true;
        }
    }

    pub fn oauth_state(&self) -> Option<&str> {
        self.oauth_state.as_deref()
    }

    pub fn set_oauth_state(&mut self, state: Option<String>) {
        if self.oauth_state != state {
            self.oauth_state = state;
            self.oauth_changed = true;
        }
    }

    pub fn take_oauth_state(&mut self) -> Option<String> {
        let state = self.oauth_state.clone();
        self.set_oauth_state(None);
        state
    }

    pub fn push_flash(&mut self, flash: Flash) {
        self.new_flashes.push(flash);
    }

    /// Queued flashes, oldest first. They are shown once.
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        self.consumed += self.stored_flashes.len();
        let mut flashes = std::mem::take(&mut self.stored_flashes);
        flashes.append(&mut self.new_flashes);
        flashes
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_dirty(&self) -> bool {
        self.user_changed || self.oauth_changed || self.consumed > 0 || !self.new_flashes.is_empty()
    }

    /// Writes back what this request changed. A session that was never stored
    /// is inserted; an untouched one is left alone.
    ///
    /// Flashes are merged with the stored queue, so requests racing on one
    /// session keep each other's messages.
    pub fn store(&mut self, conn: &Connection) -> Result<(), AppError> {
        if !self.is_dirty() {
            return Ok(());
        }

        if !self.persisted {
            conn.execute(
                "INSERT INTO sessions (id, user_id, flashes, oauth_state, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.id,
                    self.user_id,
                    serde_json::to_string(&self.new_flashes)?,
                    self.oauth_state,
                    self.created_at,
                    self.expires_at,
                ],
            )?;
            self.persisted = true;
        } else {
            let mut flashes = read_flashes(conn, &self.id)?;
            flashes.drain(..self.consumed.min(flashes.len()));
            flashes.extend(self.new_flashes.iter().cloned());
            conn.execute(
                "UPDATE sessions SET flashes = ?2 WHERE id = ?1",
                params![self.id, serde_json::to_string(&flashes)?],
            )?;

            if self.user_changed {
                conn.execute(
                    "UPDATE sessions SET user_id = ?2 WHERE id = ?1",
                    params![self.id, self.user_id],
                )?;
            }
            if self.oauth_changed {
                conn.execute(
                    "UPDATE sessions SET oauth_state = ?2 WHERE id = ?1",
                    params![self.id, self.oauth_state],
                )?;
            }
        }

        self.new_flashes.clear();
        self.consumed = 0;
        self.user_changed = false;
        self.oauth_changed = false;
        Ok(())
    }

    /// Deletes expired sessions, returning how many went.
    pub fn prune(conn: &Connection) -> Result<usize, AppError> {
        Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now()])?)
    }
}

impl Default for SessionRow {
    fn default() -> Self {
        Self::new()
    }
}
