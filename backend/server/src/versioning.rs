//! Project history. Every save stores a JSON snapshot under the next version
//! number, starting at 1; activities remember the version that was current
//! when they were logged.
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::AppError,
    models::{now, Activity, Project},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
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
    pub is_hidden: bool,
    pub category_id: Option<i64>,
    pub progress: Option<i64>,
    pub score: Option<i64>,
}

impl From<&Project> for ProjectSnapshot {
    fn from(p: &Project) -> Self {
        Self {
            name: p.name.clone(),
            summary: p.summary.clone(),
            image_url: p.image_url.clone(),
            source_url: p.source_url.clone(),
            webpage_url: p.webpage_url.clone(),
            is_webembed: p.is_webembed,
            contact_url: p.contact_url.clone(),
            autotext_url: p.autotext_url.clone(),
            is_autoupdate: p.is_autoupdate,
            autotext: p.autotext.clone(),
            longtext: p.longtext.clone(),
            hashtag: p.hashtag.clone(),
            logo_color: p.logo_color.clone(),
            logo_icon: p.logo_icon.clone(),
            is_hidden: p.is_hidden,
            category_id: p.category_id,
            progress: p.progress,
            score: p.score,
        }
    }
}

impl ProjectSnapshot {
    /// Copies the archived fields over `project`. Ownership, event and
    /// timestamps stay as they are.
    pub fn apply_to(self, project: &mut Project) {
        project.name = self.name;
        project.summary = self.summary;
        project.image_url = self.image_url;
        project.source_url = self.source_url;
        project.webpage_url = self.webpage_url;
        project.is_webembed = self.is_webembed;
        project.contact_url = self.contact_url;
        project.autotext_url = self.autotext_url;
        project.is_autoupdate = self.is_autoupdate;
        project.autotext = self.autotext;
        project.longtext = self.longtext;
        project.hashtag = self.hashtag;
        project.logo_color = self.logo_color;
        project.logo_icon = self.logo_icon;
        project.is_hidden = self.is_hidden;
        project.category_id = self.category_id;
        project.progress = self.progress;
        project.score = self.score;
    }
}

pub struct VersionTracker;

impl VersionTracker {
    /// Stores the project as its next version and returns the number.
    pub fn snapshot(conn: &Connection, project: &Project) -> Result<i64, AppError> {
        let version = Self::latest(conn, project.id)? + 1;
        let data = serde_json::to_string(&ProjectSnapshot::from(project))?;

        conn.execute(
            "INSERT INTO project_versions (project_id, version, data, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![project.id, version, data, now()],
        )?;
        Ok(version)
    }

    /// Highest stored version, 0 when none.
    pub fn latest(conn: &Connection, project_id: i64) -> Result<i64, AppError> {
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM project_versions WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?)
    }

    pub fn count(conn: &Connection, project_id: i64) -> Result<i64, AppError> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM project_versions WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?)
    }

    pub fn get_version(
        conn: &Connection,
        project_id: i64,
        version: i64,
    ) -> Result<Option<ProjectSnapshot>, AppError> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM project_versions WHERE project_id = ?1 AND version = ?2",
                params![project_id, version],
                |row| row.get(0),
            )
            .optional()?;

        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(AppError::from)
    }
}

/// Why a version could not be used.
#[derive(Debug, PartialEq, Eq)]
pub enum RevertRefusal {
    NoVersion,
    Earliest,
    Missing,
}

impl RevertRefusal {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoVersion => "Could not revert: data not available.",
            Self::Earliest => "Could not revert: this is the earliest version.",
            Self::Missing => "Could not revert: version not found.",
        }
    }
}

fn snapshot_for(
    conn: &Connection,
    project: &Project,
    activity: &Activity,
) -> Result<Result<(i64, ProjectSnapshot), RevertRefusal>, AppError> {
    let Some(version) = activity.project_version.filter(|v| *v > 0) else {
        return Ok(Err(RevertRefusal::NoVersion));
    };
    match VersionTracker::get_version(conn, project.id, version)? {
        Some(snapshot) => Ok(Ok((version, snapshot))),
        None => Ok(Err(RevertRefusal::Missing)),
    }
}

/// The project as it was when `activity` was logged. Nothing is written.
pub fn preview(
    conn: &Connection,
    project: &Project,
    activity: &Activity,
) -> Result<Result<Project, RevertRefusal>, AppError> {
    Ok(snapshot_for(conn, project, activity)?.map(|(_, snapshot)| {
        let mut archived = project.clone();
        snapshot.apply_to(&mut archived);
        archived
    }))
}

/// Restores the version `activity` refers to and saves it as a new version.
/// The first version cannot be restored.
pub fn revert_project_by_activity(
    conn: &Connection,
    project: &mut Project,
    activity: &Activity,
) -> Result<Result<i64, RevertRefusal>, AppError> {
    if activity.project_version == Some(1) {
        return Ok(Err(RevertRefusal::Earliest));
    }
    let (version, snapshot) = match snapshot_for(conn, project, activity)? {
        Ok(found) => found,
        Err(refusal) => return Ok(Err(refusal)),
    };

    snapshot.apply_to(project);
    let saved = project.save(conn)?;
    info!(project = project.id, from = version, to = saved, "project reverted");
    Ok(Ok(saved))
}
