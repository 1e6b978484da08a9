//! # Maintenance jobs
//!
//! Jobs run against the same database the server uses, from cron or by hand.
//!
//! - `migrate`: bring the schema up to date and report its version
//! - `sync`: pull README data into every visible project that has autoupdate on
//! - `promote`: make a user an active administrator
//! - `prune-sessions`: drop expired sessions
//!
//! Sync goes through the same code path as the autoupdate button on a project
//! page, so each synced project gets a `sync` entry in its log under its owner.
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use dribdat::{
    aggregation::{autoupdate_project, SyncOutcome},
    database::{migrations::current_version, Database},
    models::{Project, SessionRow, User},
    remote::RemoteSource,
};

pub async fn migrate(db: &Database) -> Result<u32> {
    let version = db.with_conn(current_version).await?;
    println!("Schema version: {version}");
    Ok(version)
}

/// Totals of a sync run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub empty: usize,
    pub failed: usize,
}

pub async fn sync_projects(db: &Database, remote: &dyn RemoteSource) -> Result<SyncReport> {
    let projects = db.with_conn(Project::autoupdating).await?;
    println!("Autoupdating projects: {}\n", projects.len());

    let pb = ProgressBar::new(projects.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut report = SyncReport::default();
    for project in projects {
        pb.set_message(format!("Syncing {}", project.name));

        match autoupdate_project(db, remote, project.id, None).await {
            Ok(SyncOutcome::Synced(kind)) => {
                info!(project = project.id, kind = %kind, "synced");
                report.synced += 1;
            }
            Ok(SyncOutcome::NothingFound) => report.empty += 1,
            Err(e) => {
                warn!(project = project.id, "sync failed: {e}");
                report.failed += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "\nSynced: {}, nothing found: {}, failed: {}",
        report.synced, report.empty, report.failed
    );
    Ok(report)
}

pub async fn promote(db: &Database, username: &str) -> Result<User> {
    let user = db
        .with_conn(|conn| {
            let Some(mut user) = User::by_username(conn, username)? else {
                return Ok(None);
            };
            user.is_admin = true;
            user.active = true;
            user.save(conn)?;
            Ok(Some(user))
        })
        .await?
        .ok_or_else(|| anyhow!("user {username} not found"))?;

    println!("{} is now an administrator", user.username);
    Ok(user)
}

pub async fn prune_sessions(db: &Database) -> Result<usize> {
    let removed = db.with_conn(SessionRow::prune).await?;
    println!("Removed {removed} expired sessions");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use dribdat::{
        error::AppError,
        models::{NewProject, NewUser},
        remote::RemoteProject,
    };

    use super::*;

    struct Readme;

    #[async_trait]
    impl RemoteSource for Readme {
        async fn fetch(&self, url: &str) -> Result<Option<RemoteProject>, AppError> {
            if url.contains("empty") {
                return Ok(None);
            }
            Ok(Some(RemoteProject {
                kind: "Markdown".to_string(),
                name: "Readme".to_string(),
                description: "# Readme\n\nAll about it.".to_string(),
                ..Default::default()
            }))
        }
    }

    async fn user(db: &Database, name: &str) -> User {
        db.with_conn(|conn| {
            User::insert(
                conn,
                NewUser {
                    username: name.to_string(),
                    email: format!("{name}@example.org"),
                    ..Default::default()
                },
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_promote() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "rosa").await;

        let promoted = promote(&db, "rosa").await.unwrap();
        assert!(promoted.is_admin);
        assert!(promoted.active);

        assert!(promote(&db, "nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_projects() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "rosa").await;
        db.with_conn(|conn| {
            let sources = [
                ("Alpha", "https://example.org/readme.md"),
                ("Beta", "https://example.org/empty.md"),
            ];
            for (name, url) in sources {
                Project::create(
                    conn,
                    NewProject {
                        name: name.to_string(),
                        autotext_url: Some(url.to_string()),
                        user_id: Some(owner.id),
                        ..Default::default()
                    },
                )?;
            }
            Ok(())
        })
        .await
        .unwrap();

        let report = sync_projects(&db, &Readme).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                synced: 1,
                empty: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_migrate_reports_latest() {
        let db = Database::open_in_memory().unwrap();
        let version = migrate(&db).await.unwrap();
        assert_eq!(version, dribdat::database::migrations::LATEST_VERSION);
    }
}
