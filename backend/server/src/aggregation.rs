//! The project log: recording activities, team membership, and pulling
//! project data from remote READMEs.
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::{
    database::Database,
    error::AppError,
    models::{Activity, ActivityType, NewActivity, Project, User},
    remote::{RemoteProject, RemoteSource},
    versioning::VersionTracker,
};

pub fn is_project_starred(
    conn: &Connection,
    project_id: i64,
    user_id: i64,
) -> Result<bool, AppError> {
    Ok(conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM activities WHERE project_id = ?1 AND user_id = ?2 AND name = 'star'
         )",
        params![project_id, user_id],
        |row| row.get(0),
    )?)
}

/// Logs an activity against the project with its current progress, score and
/// version. Starring twice does nothing and returns `None`.
pub fn project_activity(
    conn: &Connection,
    project: &mut Project,
    kind: ActivityType,
    user_id: i64,
    action: Option<&str>,
    text: Option<&str>,
) -> Result<Option<Activity>, AppError> {
    if kind == ActivityType::Star && is_project_starred(conn, project.id, user_id)? {
        return Ok(None);
    }

    let activity = Activity::insert(
        conn,
        NewActivity {
            name: kind,
            action: action.map(str::to_string),
            content: text.map(str::to_string).filter(|t| !t.trim().is_empty()),
            user_id,
            project_id: project.id,
            project_progress: project.progress,
            project_score: project.score,
            project_version: Some(VersionTracker::latest(conn, project.id)?),
            ref_url: None,
        },
    )?;

    if kind == ActivityType::Star || action == Some("post") {
        project.store_score(conn)?;
    }
    Ok(Some(activity))
}

/// Takes the user off the team. Nothing is logged.
pub fn unstar(conn: &Connection, project: &mut Project, user_id: i64) -> Result<usize, AppError> {
    let removed = conn.execute(
        "DELETE FROM activities WHERE project_id = ?1 AND user_id = ?2 AND name = 'star'",
        params![project.id, user_id],
    )?;
    project.store_score(conn)?;
    Ok(removed)
}

/// Everyone on a team in the event, by username.
pub fn get_event_users(conn: &Connection, event_id: i64) -> Result<Vec<User>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.id FROM users u
         JOIN activities a ON a.user_id = u.id AND a.name = 'star'
         JOIN projects p ON p.id = a.project_id
         WHERE p.event_id = ?1 AND p.is_hidden = 0
         ORDER BY u.username COLLATE NOCASE",
    )?;
    let ids = stmt
        .query_map([event_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut users = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(user) = User::get(conn, id)? {
            users.push(user);
        }
    }
    Ok(users)
}

/// Resource tips for a stage.
pub fn get_suggestions_for_stage(
    conn: &Connection,
    progress: Option<i64>,
) -> Result<Vec<Project>, AppError> {
    Project::in_resource_events(conn, progress)
}

/// Copies remote data onto the project. The README always replaces the
/// synced text; other fields are only filled when empty.
pub fn sync_project_data(project: &mut Project, data: &RemoteProject) {
    fn fill(field: &mut Option<String>, value: &Option<String>) {
        let empty = field.as_deref().map_or(true, |f| f.trim().is_empty());
        if empty {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                *field = Some(value.to_string());
            }
        }
    }

    if project.name.trim().is_empty() && !data.name.trim().is_empty() {
        project.name = data.name.trim().to_string();
    }
    let summary = data.summary.as_deref().map(|s| s.chars().take(120).collect::<String>());
    fill(&mut project.summary, &summary);
    fill(&mut project.webpage_url, &data.homepage_url);
    fill(&mut project.source_url, &data.source_url);
    fill(&mut project.image_url, &data.image_url);
    fill(&mut project.contact_url, &data.contact_url);
    project.autotext = Some(data.description.clone());
}

#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Synced; carries the source kind, e.g. "GitHub".
    Synced(String),
    NothingFound,
}

/// Fetches the project's README source and stores what it finds, logging a
/// `sync` update under `user_id` (the owner when `None`).
pub async fn autoupdate_project(
    db: &Database,
    remote: &dyn RemoteSource,
    project_id: i64,
    user_id: Option<i64>,
) -> Result<SyncOutcome, AppError> {
    let project = db
        .with_conn(|conn| Project::get(conn, project_id))
        .await?
        .ok_or(AppError::NotFound)?;
    let Some(url) = project.autotext_url.clone() else {
        return Ok(SyncOutcome::NothingFound);
    };

    let data = match remote.fetch(&url).await {
        Ok(Some(data)) => data,
        Ok(None) => return Ok(SyncOutcome::NothingFound),
        Err(e) => {
            warn!(project = project_id, url = %url, "sync failed: {e}");
            return Ok(SyncOutcome::NothingFound);
        }
    };

    db.transaction(|conn| {
        let mut project = Project::get(conn, project_id)?.ok_or(AppError::NotFound)?;
        sync_project_data(&mut project, &data);
        project.save(conn)?;

        if let Some(user_id) = user_id.or(project.user_id) {
            let bytes = project.autotext.as_deref().map_or(0, str::len);
            let note = format!("{bytes} bytes");
            project_activity(
                conn,
                &mut project,
                ActivityType::Update,
                user_id,
                Some("sync"),
                Some(note.as_str()),
            )?;
        }
        Ok(())
    })
    .await?;

    info!(project = project_id, kind = %data.kind, "project synced");
    Ok(SyncOutcome::Synced(data.kind))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::models::{NewProject, NewUser};

    fn setup(conn: &Connection) -> (User, Project) {
        let user = User::insert(
            conn,
            NewUser {
                username: "ann".to_string(),
                email: "ann@example.org".to_string(),
                active: true,
                ..Default::default()
            },
        )
        .unwrap();
        let project = Project::create(
            conn,
            NewProject {
                name: "Robot".to_string(),
                user_id: Some(user.id),
                progress: Some(5),
                autotext_url: Some("https://github.com/example/robot".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        (user, project)
    }

    #[test]
    fn test_star_is_idempotent_and_unstar_logs_nothing() {
        let db_conn = Connection::open_in_memory().unwrap();
        crate::database::migrations::run_migrations(&db_conn).unwrap();
        let (user, mut project) = setup(&db_conn);

        let star = ActivityType::Star;
        let first = project_activity(&db_conn, &mut project, star, user.id, None, None).unwrap();
        assert!(first.is_some());
        let again = project_activity(&db_conn, &mut project, star, user.id, None, None).unwrap();
        assert!(again.is_none());
        assert_eq!(project.team_size(&db_conn).unwrap(), 1);
        assert!(is_project_starred(&db_conn, project.id, user.id).unwrap());

        let before = Activity::for_project(&db_conn, project.id).unwrap().len();
        assert_eq!(unstar(&db_conn, &mut project, user.id).unwrap(), 1);
        assert!(!is_project_starred(&db_conn, project.id, user.id).unwrap());
        assert_eq!(Activity::for_project(&db_conn, project.id).unwrap().len(), before - 1);
    }

    #[test]
    fn test_activity_captures_version_and_dribs() {
        let conn = Connection::open_in_memory().unwrap();
        crate::database::migrations::run_migrations(&conn).unwrap();
        let (user, mut project) = setup(&conn);

        project.longtext = "Changed".to_string();
        project.save(&conn).unwrap();
        let update =
            project_activity(&conn, &mut project, ActivityType::Update, user.id, None, None)
                .unwrap()
                .unwrap();
        assert_eq!(update.project_version, Some(2));

        project_activity(
            &conn,
            &mut project,
            ActivityType::Update,
            user.id,
            Some("post"),
            Some("Day one"),
        )
        .unwrap();
        project_activity(
            &conn,
            &mut project,
            ActivityType::Boost,
            user.id,
            Some("Data wizards"),
            None,
        )
        .unwrap();

        let dribs = project.all_dribs(&conn).unwrap();
        assert_eq!(dribs.len(), 2);
        assert_eq!(dribs[0].name, ActivityType::Boost);
        assert_eq!(dribs[1].content.as_deref(), Some("Day one"));
    }

    #[test]
    fn test_sync_fills_empty_fields() {
        let conn = Connection::open_in_memory().unwrap();
        crate::database::migrations::run_migrations(&conn).unwrap();
        let (_, mut project) = setup(&conn);
        project.source_url = Some("https://example.org/mine".to_string());

        sync_project_data(
            &mut project,
            &RemoteProject {
                kind: "GitHub".to_string(),
                name: "robot".to_string(),
                summary: Some("Builds robots".to_string()),
                description: "# Robot\nBeep".to_string(),
                source_url: Some("https://github.com/example/robot".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(project.name, "Robot");
        assert_eq!(project.summary.as_deref(), Some("Builds robots"));
        assert_eq!(project.source_url.as_deref(), Some("https://example.org/mine"));
        assert_eq!(project.autotext.as_deref(), Some("# Robot\nBeep"));
    }

    struct StaticRemote(Option<RemoteProject>);

    #[async_trait]
    impl RemoteSource for StaticRemote {
        async fn fetch(&self, _url: &str) -> Result<Option<RemoteProject>, AppError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_autoupdate_project() {
        let db = Database::open_in_memory().unwrap();
        let (user, project) = db.with_conn(|conn| Ok(setup(conn))).await.unwrap();

        let missing = autoupdate_project(&db, &StaticRemote(None), project.id, Some(user.id))
            .await
            .unwrap();
        assert_eq!(missing, SyncOutcome::NothingFound);

        let remote = StaticRemote(Some(RemoteProject {
            kind: "GitHub".to_string(),
            name: "robot".to_string(),
            description: "x".repeat(42),
            ..Default::default()
        }));
        let synced = autoupdate_project(&db, &remote, project.id, Some(user.id))
            .await
            .unwrap();
        assert_eq!(synced, SyncOutcome::Synced("GitHub".to_string()));

        let log = db
            .with_conn(|conn| Activity::for_project(conn, project.id))
            .await
            .unwrap();
        let last = log.last().unwrap();
        assert_eq!(last.action.as_deref(), Some("sync"));
        assert_eq!(last.content.as_deref(), Some("42 bytes"));
    }
}
