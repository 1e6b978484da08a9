use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::Serialize;

use super::{now, Activity, Category, Event, User};
use crate::{error::AppError, versioning::VersionTracker};

const PROJECT_COLUMNS: &str = "id, name, summary, image_url, source_url, webpage_url, is_webembed, \
     contact_url, autotext_url, is_autoupdate, autotext, longtext, hashtag, logo_color, logo_icon, \
     created_at, updated_at, is_hidden, user_id, event_id, category_id, progress, score";

pub const MAX_SCORE: i64 = 100;

#[derive(Clone, Debug, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
    pub webpage_url: Option<String>,
    pub is_webembed: bool,
    pub contact_url: Option<String>,
    pub autotext_url: Option<String>,
    pub is_autoupdate: bool,
    pub autotext: Option<String>,
    pub longtext: String,
    pub hashtag: Option<String>,
    pub logo_color: Option<String>,
    pub logo_icon: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub is_hidden: bool,
    pub user_id: Option<i64>,
    pub event_id: Option<i64>,
    pub category_id: Option<i64>,
    pub progress: Option<i64>,
    pub score: Option<i64>,
}

#[derive(Debug, Default)]
pub struct NewProject {
    pub name: String,
    pub summary: Option<String>,
    pub longtext: String,
    pub autotext_url: Option<String>,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    pub event_id: Option<i64>,
    pub progress: Option<i64>,
    pub is_hidden: bool,
}

impl Project {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            summary: row.get(2)?,
            image_url: row.get(3)?,
            source_url: row.get(4)?,
            webpage_url: row.get(5)?,
            is_webembed: row.get(6)?,
            contact_url: row.get(7)?,
            autotext_url: row.get(8)?,
            is_autoupdate: row.get(9)?,
            autotext: row.get(10)?,
            longtext: row.get(11)?,
            hashtag: row.get(12)?,
            logo_color: row.get(13)?,
            logo_icon: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
            is_hidden: row.get(17)?,
            user_id: row.get(18)?,
            event_id: row.get(19)?,
            category_id: row.get(20)?,
            progress: row.get(21)?,
            score: row.get(22)?,
        })
    }

    pub fn query<P: Params>(
        conn: &Connection,
        clause: &str,
        params: P,
    ) -> Result<Vec<Self>, AppError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects {clause}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], Self::from_row).optional()?)
    }

    pub fn name_taken(
        conn: &Connection,
        name: &str,
        except: Option<i64>,
    ) -> Result<bool, AppError> {
        Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM projects WHERE lower(name) = lower(?1) AND id IS NOT ?2)",
            params![name.trim(), except],
            |row| row.get(0),
        )?)
    }

    /// Visible projects of an event.
    pub fn for_event(conn: &Connection, event_id: i64) -> Result<Vec<Self>, AppError> {
        Self::query(conn, "WHERE event_id = ?1 AND is_hidden = 0 ORDER BY id", [event_id])
    }

    /// Visible projects at a given progress, across all resource-type events.
    pub fn in_resource_events(
        conn: &Connection,
        progress: Option<i64>,
    ) -> Result<Vec<Self>, AppError> {
        Self::query(
            conn,
            "WHERE is_hidden = 0 AND progress IS ?1
               AND event_id IN (SELECT id FROM events WHERE lock_resources = 1)
             ORDER BY name",
            [progress],
        )
    }

    pub fn autoupdating(conn: &Connection) -> Result<Vec<Self>, AppError> {
        Self::query(conn, "WHERE is_autoupdate = 1 AND is_hidden = 0 ORDER BY id", [])
    }

    /// Inserts the project and records its first version.
    pub fn create(conn: &Connection, new: NewProject) -> Result<Self, AppError> {
        let timestamp = now();
        let mut project = Self {
            id: 0,
            name: new.name.trim().to_string(),
            summary: new.summary,
            image_url: None,
            source_url: None,
            webpage_url: None,
            is_webembed: false,
            contact_url: None,
            autotext_url: new.autotext_url,
            is_autoupdate: false,
            autotext: None,
            longtext: new.longtext,
            hashtag: None,
            logo_color: None,
            logo_icon: None,
            created_at: timestamp,
            updated_at: timestamp,
            is_hidden: new.is_hidden,
            user_id: new.user_id,
            event_id: new.event_id,
            category_id: new.category_id,
            progress: new.progress,
            score: Some(0),
        };
        project.normalize();
        project.score = Some(project.compute_score(0, 0));

        conn.execute(
            "INSERT INTO projects (name, summary, autotext_url, is_autoupdate, longtext, created_at,
                 updated_at, is_hidden, user_id, event_id, category_id, progress, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                project.name,
                project.summary,
                project.autotext_url,
                project.is_autoupdate,
                project.longtext,
                project.created_at,
                project.updated_at,
                project.is_hidden,
                project.user_id,
                project.event_id,
                project.category_id,
                project.progress,
                project.score,
            ],
        )?;
        project.id = conn.last_insert_rowid();

        VersionTracker::snapshot(conn, &project)?;
        Ok(project)
    }

    /// Normalizes, rescores and writes the project, then records a new version.
    /// Returns the version number.
    pub fn save(&mut self, conn: &Connection) -> Result<i64, AppError> {
        self.normalize();
        self.updated_at = now();
        self.refresh_score(conn)?;

        conn.execute(
            "UPDATE projects SET name = ?2, summary = ?3, image_url = ?4, source_url = ?5,
                 webpage_url = ?6, is_webembed = ?7, contact_url = ?8, autotext_url = ?9,
                 is_autoupdate = ?10, autotext = ?11, longtext = ?12, hashtag = ?13,
                 logo_color = ?14, logo_icon = ?15, updated_at = ?16, is_hidden = ?17,
                 user_id = ?18, event_id = ?19, category_id = ?20, progress = ?21, score = ?22
             WHERE id = ?1",
            params![
                self.id,
                self.name,
                self.summary,
                self.image_url,
                self.source_url,
                self.webpage_url,
                self.is_webembed,
                self.contact_url,
                self.autotext_url,
                self.is_autoupdate,
                self.autotext,
                self.longtext,
                self.hashtag,
                self.logo_color,
                self.logo_icon,
                self.updated_at,
                self.is_hidden,
                self.user_id,
                self.event_id,
                self.category_id,
                self.progress,
                self.score,
            ],
        )?;

        VersionTracker::snapshot(conn, self)
    }

    /// Writes only the score; used after team or log changes.
    pub fn store_score(&mut self, conn: &Connection) -> Result<(), AppError> {
        self.refresh_score(conn)?;
        conn.execute(
            "UPDATE projects SET score = ?2 WHERE id = ?1",
            params![self.id, self.score],
        )?;
        Ok(())
    }

    /// Field clean-up applied before every write.
    pub fn normalize(&mut self) {
        if self.category_id.is_some_and(|id| id < 0) {
            self.category_id = None;
        }
        if let Some(icon) = self.logo_icon.as_deref() {
            let icon = icon.trim().trim_start_matches("fa-").to_string();
            self.logo_icon = Some(icon).filter(|i| !i.is_empty());
        }
        if self
            .logo_color
            .as_deref()
            .is_some_and(|c| c.trim().is_empty() || c.eq_ignore_ascii_case("#000000"))
        {
            self.logo_color = None;
        }
        self.is_autoupdate = self
            .autotext_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());
        if !self.is_autoupdate {
            self.autotext = None;
        }
    }

    pub fn is_challenge(&self) -> bool {
        self.progress.unwrap_or(0) < 0
    }

    fn refresh_score(&mut self, conn: &Connection) -> Result<(), AppError> {
        let team_size = self.team_size(conn)?;
        let post_count = self.post_count(conn)?;
        self.score = Some(self.compute_score(team_size, post_count));
        Ok(())
    }

    /// Completeness score out of [`MAX_SCORE`]; challenges always score 0.
    pub fn compute_score(&self, team_size: usize, post_count: usize) -> i64 {
        if self.is_challenge() {
            return 0;
        }

        let filled =
            |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        let mut score = 0;

        if self.summary.as_deref().is_some_and(|s| s.trim().chars().count() >= 10) {
            score += 5;
        }
        let description = self.longtext.trim().chars().count();
        if description >= 100 {
            score += 10;
        }
        if description >= 500 {
            score += 5;
        }
        for link in [&self.image_url, &self.source_url, &self.webpage_url, &self.autotext] {
            if filled(link) {
                score += 5;
            }
        }
        score += 5 * team_size.min(5) as i64;
        score += post_count.min(10) as i64;
        score += self.progress.unwrap_or(0).clamp(0, 100) / 10;

        score.min(MAX_SCORE)
    }

    pub fn team_size(&self, conn: &Connection) -> Result<usize, AppError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM activities
             WHERE project_id = ?1 AND name = 'star'",
            [self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn post_count(&self, conn: &Connection) -> Result<usize, AppError> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE project_id = ?1 AND action = 'post'",
            [self.id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Team members in the order they joined.
    pub fn team(&self, conn: &Connection) -> Result<Vec<User>, AppError> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM activities WHERE project_id = ?1 AND name = 'star'
             GROUP BY user_id ORDER BY MIN(id)",
        )?;
        let ids = stmt
            .query_map([self.id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut team = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = User::get(conn, id)? {
                team.push(user);
            }
        }
        Ok(team)
    }

    /// Log entries shown on the project page, newest first.
    pub fn all_dribs(&self, conn: &Connection) -> Result<Vec<Activity>, AppError> {
        Activity::query(
            conn,
            "WHERE a.project_id = ?1
               AND (a.action IN ('post', 'sync') OR a.name IN ('boost', 'review'))
             ORDER BY a.id DESC",
            [self.id],
        )
    }

    pub fn event(&self, conn: &Connection) -> Result<Option<Event>, AppError> {
        match self.event_id {
            Some(id) => Event::get(conn, id),
            None => Ok(None),
        }
    }

    /// Categories the project may be filed under.
    pub fn categories_all(&self, conn: &Connection) -> Result<Vec<Category>, AppError> {
        Category::for_event(conn, self.event_id)
    }
}
