use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::Serialize;
use serde_json::{json, Value};

use super::{now, Category, Project};
use crate::error::AppError;

const EVENT_COLUMNS: &str = "id, name, hostname, location, description, boilerplate, resources, \
     logo_url, custom_css, webpage_url, community_url, community_embed, certificate_path, \
     starts_at, ends_at, is_hidden, is_current, lock_editing, lock_starting, lock_resources, \
     hashtags";

#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub boilerplate: Option<String>,
    pub resources: Option<String>,
    pub logo_url: Option<String>,
    pub custom_css: Option<String>,
    pub webpage_url: Option<String>,
    pub community_url: Option<String>,
    pub community_embed: Option<String>,
    pub certificate_path: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub is_hidden: bool,
    pub is_current: bool,
    pub lock_editing: bool,
    pub lock_starting: bool,
    pub lock_resources: bool,
    pub hashtags: Option<String>,
}

#[derive(Debug, Default)]
pub struct NewEvent {
    pub name: String,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub boilerplate: Option<String>,
    pub community_embed: Option<String>,
    pub logo_url: Option<String>,
    pub webpage_url: Option<String>,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub is_hidden: bool,
    pub lock_resources: bool,
}

/// A category with the visible projects filed under it.
#[derive(Debug, Serialize)]
pub struct CategoryProjects {
    #[serde(flatten)]
    pub category: Category,
    pub projects: Vec<Project>,
}

impl Event {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            hostname: row.get(2)?,
            location: row.get(3)?,
            description: row.get(4)?,
            boilerplate: row.get(5)?,
            resources: row.get(6)?,
            logo_url: row.get(7)?,
            custom_css: row.get(8)?,
            webpage_url: row.get(9)?,
            community_url: row.get(10)?,
            community_embed: row.get(11)?,
            certificate_path: row.get(12)?,
            starts_at: row.get(13)?,
            ends_at: row.get(14)?,
            is_hidden: row.get(15)?,
            is_current: row.get(16)?,
            lock_editing: row.get(17)?,
            lock_starting: row.get(18)?,
            lock_resources: row.get(19)?,
            hashtags: row.get(20)?,
        })
    }

    pub fn query<P: Params>(
        conn: &Connection,
        clause: &str,
        params: P,
    ) -> Result<Vec<Self>, AppError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn current(conn: &Connection) -> Result<Option<Self>, AppError> {
        Ok(Self::query(conn, "WHERE is_current = 1 ORDER BY id LIMIT 1", [])?
            .into_iter()
            .next())
    }

    /// Current event, or else the most recently created one.
    pub fn current_or_latest(conn: &Connection) -> Result<Option<Self>, AppError> {
        match Self::current(conn)? {
            Some(event) => Ok(Some(event)),
            None => Ok(Self::query(conn, "ORDER BY id DESC LIMIT 1", [])?
                .into_iter()
                .next()),
        }
    }

    pub fn list(conn: &Connection) -> Result<Vec<Self>, AppError> {
        Self::query(conn, "ORDER BY starts_at DESC", [])
    }

    pub fn name_taken(
        conn: &Connection,
        name: &str,
        except: Option<i64>,
    ) -> Result<bool, AppError> {
        Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM events WHERE lower(name) = lower(?1) AND id IS NOT ?2)",
            params![name.trim(), except],
            |row| row.get(0),
        )?)
    }

    pub fn insert(conn: &Connection, new: NewEvent) -> Result<Self, AppError> {
        conn.execute(
            "INSERT INTO events (name, hostname, location, description, boilerplate,
                 community_embed, logo_url, webpage_url, starts_at, ends_at, is_hidden,
                 lock_resources)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.name.trim(),
                new.hostname,
                new.location,
                new.description,
                new.boilerplate,
                new.community_embed,
                new.logo_url,
                new.webpage_url,
                new.starts_at,
                new.ends_at,
                new.is_hidden,
                new.lock_resources,
            ],
        )?;

        Self::get(conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::internal("inserted event vanished"))
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        conn.execute(
            "UPDATE events SET name = ?2, hostname = ?3, location = ?4, description = ?5,
                 boilerplate = ?6, resources = ?7, logo_url = ?8, custom_css = ?9,
                 webpage_url = ?10, community_url = ?11, community_embed = ?12,
                 certificate_path = ?13, starts_at = ?14, ends_at = ?15, is_hidden = ?16,
                 is_current = ?17, lock_editing = ?18, lock_starting = ?19, lock_resources = ?20,
                 hashtags = ?21
             WHERE id = ?1",
            params![
                self.id,
                self.name,
                self.hostname,
                self.location,
                self.description,
                self.boilerplate,
                self.resources,
                self.logo_url,
                self.custom_css,
                self.webpage_url,
                self.community_url,
                self.community_embed,
                self.certificate_path,
                self.starts_at,
                self.ends_at,
                self.is_hidden,
                self.is_current,
                self.lock_editing,
                self.lock_starting,
                self.lock_resources,
                self.hashtags,
            ],
        )?;
        Ok(())
    }

    /// Makes this the only current event.
    pub fn set_current(conn: &Connection, id: i64) -> Result<(), AppError> {
        conn.execute("UPDATE events SET is_current = (id = ?1)", [id])?;
        Ok(())
    }

    pub fn has_started(&self) -> bool {
        self.starts_at <= now()
    }

    pub fn has_finished(&self) -> bool {
        self.ends_at < now()
    }

    /// schema.org description of the event.
    pub fn get_schema(&self, host_url: &str) -> Value {
        let host_url = host_url.trim_end_matches('/');
        let url = self
            .webpage_url
            .clone()
            .unwrap_or_else(|| format!("{host_url}/event/{}", self.id));

        json!({
            "@context": "http://schema.org",
            "@type": "Event",
            "name": self.name,
            "url": url,
            "description": self.description.clone().unwrap_or_default(),
            "startDate": self.starts_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "endDate": self.ends_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "logo": self.logo_url,
            "location": {
                "@type": "Place",
                "name": self.location.clone().unwrap_or_default(),
            },
            "organizer": {
                "@type": "Organization",
                "name": self.hostname.clone().unwrap_or_default(),
            },
        })
    }

    /// Event and global categories, each with their visible projects.
    pub fn categories_for_event(
        &self,
        conn: &Connection,
    ) -> Result<Vec<CategoryProjects>, AppError> {
        Category::for_event(conn, Some(self.id))?
            .into_iter()
            .map(|category| {
                let projects = Project::query(
                    conn,
                    "WHERE event_id = ?1 AND category_id = ?2 AND is_hidden = 0 ORDER BY name",
                    params![self.id, category.id],
                )?;
                Ok(CategoryProjects { category, projects })
            })
            .collect()
    }
}
