use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now, Activity, Event, Project};
use crate::{error::AppError, utils::social_card};

const USER_COLUMNS: &str = "id, username, email, webpage_url, sso_id, password, created_at, \
     active, is_admin, cardtype, carddata, my_story, my_goals, activation_hash";

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub webpage_url: Option<String>,
    #[serde(skip)]
    pub sso_id: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub created_at: NaiveDateTime,
    pub active: bool,
    pub is_admin: bool,
    pub cardtype: Option<String>,
    pub carddata: Option<String>,
    pub my_story: Option<String>,
    pub my_goals: Option<String>,
    #[serde(skip)]
    pub activation_hash: Option<String>,
}

/// What other visitors get to see of a user.
#[derive(Clone, Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub webpage_url: Option<String>,
    pub cardtype: Option<String>,
    pub carddata: Option<String>,
    pub is_admin: bool,
}

/// A public profile page: the summary plus the story, never contact details.
#[derive(Clone, Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub my_story: Option<String>,
    pub my_goals: Option<String>,
}

#[derive(Debug, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub webpage_url: Option<String>,
    /// Already hashed, see [`hash_password`].
    pub password_hash: Option<String>,
    pub sso_id: Option<String>,
    pub active: bool,
}

pub fn is_user_active(user: Option<&User>) -> bool {
    user.is_some_and(|u| u.active)
}

pub fn hash_password(raw: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            webpage_url: row.get(3)?,
            sso_id: row.get(4)?,
            password: row.get(5)?,
            created_at: row.get(6)?,
            active: row.get(7)?,
            is_admin: row.get(8)?,
            cardtype: row.get(9)?,
            carddata: row.get(10)?,
            my_story: row.get(11)?,
            my_goals: row.get(12)?,
            activation_hash: row.get(13)?,
        })
    }

    fn find_by(
        conn: &Connection,
        column: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        Ok(conn.query_row(&sql, params![value], Self::from_row).optional()?)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Self>, AppError> {
        Self::find_by(conn, "id", &id)
    }

    pub fn by_username(conn: &Connection, username: &str) -> Result<Option<Self>, AppError> {
        Self::find_by(conn, "username", &username)
    }

    pub fn by_email(conn: &Connection, email: &str) -> Result<Option<Self>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)");
        Ok(conn.query_row(&sql, [email], Self::from_row).optional()?)
    }

    pub fn by_sso_id(conn: &Connection, sso_id: &str) -> Result<Option<Self>, AppError> {
        Self::find_by(conn, "sso_id", &sso_id)
    }

    /// The not yet activated account an activation link was mailed to.
    pub fn by_activation_hash(conn: &Connection, hash: &str) -> Result<Option<Self>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE activation_hash = ?1 AND active = 0"
        );
        Ok(conn.query_row(&sql, [hash], Self::from_row).optional()?)
    }

    pub fn count(conn: &Connection) -> Result<i64, AppError> {
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    pub fn list(conn: &Connection) -> Result<Vec<Self>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username COLLATE NOCASE");
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn insert(conn: &Connection, new: NewUser) -> Result<Self, AppError> {
        let (cardtype, carddata) = social_card(new.webpage_url.as_deref());

        conn.execute(
            "INSERT INTO users (username, email, webpage_url, sso_id, password, created_at,
                 active, is_admin, cardtype, carddata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9)",
            params![
                new.username.trim(),
                new.email.trim(),
                new.webpage_url,
                new.sso_id,
                new.password_hash,
                now(),
                new.active,
                cardtype,
                carddata,
            ],
        )?;

        Self::get(conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::internal("inserted user vanished"))
    }

    pub fn save(&self, conn: &Connection) -> Result<(), AppError> {
        conn.execute(
            "UPDATE users SET username = ?2, email = ?3, webpage_url = ?4, sso_id = ?5,
                 password = ?6, active = ?7, is_admin = ?8, cardtype = ?9, carddata = ?10,
                 my_story = ?11, my_goals = ?12, activation_hash = ?13
             WHERE id = ?1",
            params![
                self.id,
                self.username,
                self.email,
                self.webpage_url,
                self.sso_id,
                self.password,
                self.active,
                self.is_admin,
                self.cardtype,
                self.carddata,
                self.my_story,
                self.my_goals,
                self.activation_hash,
            ],
        )?;
        Ok(())
    }

    pub fn check_password(&self, raw: &str) -> bool {
        let Some(stored) = self.password.as_deref() else {
            return false;
        };

        PasswordHash::new(stored)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(raw.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Refreshes the profile card from the webpage link.
    pub fn socialize(&mut self) {
        let (cardtype, carddata) = social_card(self.webpage_url.as_deref());
        self.cardtype = cardtype;
        self.carddata = carddata;
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            webpage_url: self.webpage_url.clone(),
            cardtype: self.cardtype.clone(),
            carddata: self.carddata.clone(),
            is_admin: self.is_admin,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            summary: self.summary(),
            active: self.active,
            created_at: self.created_at,
            my_story: self.my_story.clone(),
            my_goals: self.my_goals.clone(),
        }
    }

    /// Projects this user has starred, most recently joined first.
    pub fn joined_projects(
        &self,
        conn: &Connection,
        with_challenges: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Project>, AppError> {
        let challenge_filter = if with_challenges {
            ""
        } else {
            "AND COALESCE(p.progress, 0) >= 0"
        };
        let sql = format!(
            "SELECT p.id FROM projects p
             JOIN activities a ON a.project_id = p.id
             WHERE a.name = 'star' AND a.user_id = ?1 AND p.is_hidden = 0 {challenge_filter}
             GROUP BY p.id
             ORDER BY MAX(a.id) DESC"
        );

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([self.id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut projects = Vec::new();
        for id in ids.into_iter().take(limit.unwrap_or(usize::MAX)) {
            if let Some(project) = Project::get(conn, id)? {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    pub fn posted_challenges(&self, conn: &Connection) -> Result<Vec<Project>, AppError> {
        Project::query(
            conn,
            "WHERE user_id = ?1 AND is_hidden = 0 AND COALESCE(progress, 0) < 0 ORDER BY id DESC",
            params![self.id],
        )
    }

    pub fn latest_posts(&self, conn: &Connection, limit: usize) -> Result<Vec<Activity>, AppError> {
        Activity::query(
            conn,
            "WHERE a.user_id = ?1 AND a.action = 'post' ORDER BY a.id DESC LIMIT ?2",
            params![self.id, limit as i64],
        )
    }

    /// Certificate link for participants of the event, when the event offers one.
    pub fn get_cert_path(
        &self,
        conn: &Connection,
        event: &Event,
    ) -> Result<Option<String>, AppError> {
        let template = event.certificate_path.as_deref().filter(|p| !p.trim().is_empty());
        let Some(template) = template else {
            return Ok(None);
        };

        let on_team: bool = conn.query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM activities a JOIN projects p ON p.id = a.project_id
                 WHERE a.name = 'star' AND a.user_id = ?1 AND p.event_id = ?2
             )",
            params![self.id, event.id],
            |row| row.get(0),
        )?;
        if !on_team {
            return Ok(None);
        }

        Ok(Some(
            template
                .replace("{username}", &self.username)
                .replace("{email}", &self.email)
                .replace("{sso}", self.sso_id.as_deref().unwrap_or("")),
        ))
    }
}
