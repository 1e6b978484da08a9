use std::{fmt::Display, str::FromStr};

use chrono::NaiveDateTime;
use rusqlite::{
    params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, OptionalExtension, Params, Row, ToSql,
};
use serde::Serialize;

use super::now;
use crate::error::AppError;

const ACTIVITY_SELECT: &str = "SELECT a.id, a.name, a.action, a.timestamp, a.content, a.user_id, \
     a.project_id, a.project_progress, a.project_score, a.project_version, a.resource_id, \
     a.ref_url, u.username, p.name \
     FROM activities a \
     LEFT JOIN users u ON u.id = a.user_id \
     LEFT JOIN projects p ON p.id = a.project_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Create,
    Update,
    Star,
    Boost,
    Review,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Star => "star",
            Self::Boost => "boost",
            Self::Review => "review",
        }
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "star" => Ok(Self::Star),
            "boost" => Ok(Self::Boost),
            "review" => Ok(Self::Review),
            other => Err(format!("unknown activity type '{other}'")),
        }
    }
}

impl ToSql for ActivityType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ActivityType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Activity {
    pub id: i64,
    pub name: ActivityType,
    pub action: Option<String>,
    pub timestamp: NaiveDateTime,
    pub content: Option<String>,
    pub user_id: i64,
    pub project_id: i64,
    pub project_progress: Option<i64>,
    pub project_score: Option<i64>,
    pub project_version: Option<i64>,
    pub resource_id: Option<i64>,
    pub ref_url: Option<String>,
    pub username: Option<String>,
    pub project_name: Option<String>,
}

#[derive(Debug)]
pub struct NewActivity {
    pub name: ActivityType,
    pub action: Option<String>,
    pub content: Option<String>,
    pub user_id: i64,
    pub project_id: i64,
    pub project_progress: Option<i64>,
    pub project_score: Option<i64>,
    pub project_version: Option<i64>,
    pub ref_url: Option<String>,
}

/// One page of a newest-first listing.
#[derive(Debug, Serialize)]
pub struct Pagination<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Activity {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            action: row.get(2)?,
            timestamp: row.get(3)?,
            content: row.get(4)?,
            user_id: row.get(5)?,
            project_id: row.get(6)?,
            project_progress: row.get(7)?,
            project_score: row.get(8)?,
            project_version: row.get(9)?,
            resource_id: row.get(10)?,
            ref_url: row.get(11)?,
            username: row.get(12)?,
            project_name: row.get(13)?,
        })
    }

    /// Runs the shared select with a trailing `WHERE ... ORDER BY ...` clause.
    pub fn query<P: Params>(
        conn: &Connection,
        clause: &str,
        params: P,
    ) -> Result<Vec<Self>, AppError> {
        let sql = format!("{ACTIVITY_SELECT} {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Self>, AppError> {
        let sql = format!("{ACTIVITY_SELECT} WHERE a.id = ?1");
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn insert(conn: &Connection, new: NewActivity) -> Result<Self, AppError> {
        conn.execute(
            "INSERT INTO activities (name, action, timestamp, content, user_id, project_id,
                 project_progress, project_score, project_version, ref_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.name,
                new.action,
                now(),
                new.content,
                new.user_id,
                new.project_id,
                new.project_progress,
                new.project_score,
                new.project_version,
                new.ref_url,
            ],
        )?;

        Self::get(conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::internal("inserted activity vanished"))
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<(), AppError> {
        conn.execute("DELETE FROM activities WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Project log in insertion order.
    pub fn for_project(conn: &Connection, project_id: i64) -> Result<Vec<Self>, AppError> {
        Self::query(conn, "WHERE a.project_id = ?1 ORDER BY a.id ASC", [project_id])
    }

    /// Posts across all projects, newest first.
    pub fn posts_page(
        conn: &Connection,
        page: usize,
        per_page: usize,
    ) -> Result<Pagination<Self>, AppError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE action = 'post'",
            [],
            |row| row.get(0),
        )?;
        let total = total as usize;

        let items = Self::query(
            conn,
            "WHERE a.action = 'post' ORDER BY a.id DESC LIMIT ?1 OFFSET ?2",
            params![per_page as i64, ((page - 1) * per_page) as i64],
        )?;

        Ok(Pagination {
            items,
            page,
            per_page,
            total,
            has_prev: page > 1,
            has_next: page * per_page < total,
        })
    }
}
