use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::AppError;

#[derive(Clone, Debug, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub logo_color: Option<String>,
    pub logo_icon: Option<String>,
    pub event_id: Option<i64>,
}

impl Category {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            logo_color: row.get(3)?,
            logo_icon: row.get(4)?,
            event_id: row.get(5)?,
        })
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Self>, AppError> {
        Ok(conn
            .query_row(
                "SELECT id, name, description, logo_color, logo_icon, event_id
                 FROM categories WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?)
    }

    /// Categories of the event plus the ones shared by all events.
    /// Without an event, every category is listed.
    pub fn for_event(conn: &Connection, event_id: Option<i64>) -> Result<Vec<Self>, AppError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, logo_color, logo_icon, event_id FROM categories
             WHERE ?1 IS NULL OR event_id IS NULL OR event_id = ?1
             ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt
            .query_map([event_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn insert(
        conn: &Connection,
        name: &str,
        description: Option<&str>,
        event_id: Option<i64>,
    ) -> Result<Self, AppError> {
        conn.execute(
            "INSERT INTO categories (name, description, event_id) VALUES (?1, ?2, ?3)",
            params![name.trim(), description, event_id],
        )?;
        Self::get(conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::internal("inserted category vanished"))
    }

    /// Removes the category; its projects become uncategorized.
    pub fn delete(conn: &Connection, id: i64) -> Result<(), AppError> {
        conn.execute("UPDATE projects SET category_id = NULL WHERE category_id = ?1", [id])?;
        conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
        Ok(())
    }
}
