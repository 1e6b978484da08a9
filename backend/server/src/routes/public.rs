use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{flash_redirect, redirect, render};
use crate::{
    aggregation::get_event_users,
    error::AppError,
    forms::EventNewForm,
    models::{non_blank, now, Activity, Event, FlashCategory, NewEvent, Project, User},
    presets::{CODE_OF_CONDUCT, EVENT_START_TIPS, QUICKSTART},
    session::{CurrentUser, RequireUser, Session},
    stages::STAGES,
    state::AppState,
};

const DRIBS_PER_PAGE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct EmbedQuery {
    pub embed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DribsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

fn load_event(conn: &Connection, id: i64) -> Result<Event, AppError> {
    Event::get(conn, id)?.ok_or(AppError::NotFound)
}

fn load_user(conn: &Connection, username: &str) -> Result<User, AppError> {
    User::by_username(conn, username)?.ok_or(AppError::NotFound)
}

fn visible_projects(conn: &Connection, event_id: i64) -> Result<Vec<Project>, AppError> {
    Project::query(conn, "WHERE event_id = ?1 AND is_hidden = 0", params![event_id])
}

pub async fn home(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let current = Event::current(conn)?;
            let today = now();

            let events = Event::query(
                conn,
                "WHERE is_hidden = 0 AND id IS NOT ?1 ORDER BY starts_at DESC",
                params![current.as_ref().map(|e| e.id)],
            )?;
            let (mut resource_events, timed): (Vec<Event>, Vec<Event>) =
                events.into_iter().partition(|e| e.lock_resources);
            resource_events.sort_by_key(|e| e.name.to_lowercase());

            let featured = current.or_else(|| {
                timed
                    .iter()
                    .find(|e| e.starts_at <= today && e.ends_at >= today)
                    .cloned()
            });
            let events_next: Vec<&Event> = timed.iter().filter(|e| e.ends_at > today).collect();
            let events_past: Vec<&Event> = timed.iter().filter(|e| e.ends_at < today).collect();

            let my_projects = match &user {
                Some(user) => Some(user.joined_projects(conn, true, Some(3))?),
                None => None,
            };

            Ok(json!({
                "current_event": featured,
                "events_next": events_next,
                "events_past": events_past,
                "events_tips": resource_events,
                "my_projects": my_projects,
            }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "home", data).await
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let Some(event) = state.db.with_conn(Event::current).await? else {
        return Ok("No current event".into_response());
    };

    let with_social_wall = event
        .community_url
        .as_deref()
        .is_some_and(|url| url.contains("twitter.com"));
    render(
        &state,
        &session,
        user.as_ref(),
        "dashboard",
        json!({ "current_event": event, "with_social_wall": with_social_wall }),
    )
    .await
}

pub async fn hackathon_json(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let event = state
        .db
        .with_conn(Event::current_or_latest)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(event.get_schema(&state.config.base_url())).into_response())
}

pub async fn about(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    render(&state, &session, user.as_ref(), "about", json!({ "active": "about" })).await
}

pub async fn favicon() -> Result<Response, AppError> {
    redirect("/static/img/favicon.ico")
}

pub async fn user_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(current): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let (user, data) = state
        .db
        .with_conn(|conn| {
            let user = load_user(conn, &username)?;
            let submissions = user.posted_challenges(conn)?;
            let projects = user.joined_projects(conn, true, None)?;
            let score: i64 = projects.iter().filter_map(|p| p.score).sum();
            let posts = user.latest_posts(conn, 10)?;
            let data = json!({
                "active": "profile",
                "user": user.profile(),
                "projects": projects,
                "score": score,
                "submissions": submissions,
                "posts": posts,
            });
            Ok((user, data))
        })
        .await?;

    if !user.active {
        session
            .flash(
                FlashCategory::Warning,
                "This user account is under review. \
                 Please contact the organizing team if you have any questions.",
            )
            .await;
    }
    render(&state, &session, current.as_ref(), "user", data).await
}

pub async fn user_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let projects = state
        .db
        .with_conn(|conn| load_user(conn, &username)?.joined_projects(conn, false, None))
        .await?;

    match projects.first() {
        Some(project) => redirect(&format!("/project/{}/post", project.id)),
        None => {
            flash_redirect(
                &session,
                FlashCategory::Info,
                "Please Join a project to be able to Post an update.",
                "/",
            )
            .await
        }
    }
}

pub async fn event_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
    Query(query): Query<EmbedQuery>,
) -> Result<Response, AppError> {
    let (event, mut projects) = state
        .db
        .with_conn(|conn| Ok((load_event(conn, event_id)?, visible_projects(conn, event_id)?)))
        .await?;

    if non_blank(query.embed).is_some() {
        return render(
            &state,
            &session,
            user.as_ref(),
            "embed",
            json!({ "current_event": event, "projects": projects }),
        )
        .await;
    }

    projects.sort_by(|a, b| {
        b.score
            .unwrap_or(0)
            .cmp(&a.score.unwrap_or(0))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    render(
        &state,
        &session,
        user.as_ref(),
        "event",
        json!({
            "active": "projects",
            "current_event": event,
            "project_count": projects.len(),
            "projects": projects,
        }),
    )
    .await
}

pub async fn event_participants(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let event = load_event(conn, event_id)?;
            let participants: Vec<_> = get_event_users(conn, event.id)?
                .iter()
                .map(User::summary)
                .collect();
            let cert_path = match &user {
                Some(user) => user.get_cert_path(conn, &event)?,
                None => None,
            };
            Ok(json!({
                "active": "participants",
                "current_event": event,
                "cert_path": cert_path,
                "usercount": participants.len(),
                "participants": participants,
            }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "event_participants", data).await
}

pub async fn event_stages(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let event = load_event(conn, event_id)?;
            let projects = visible_projects(conn, event.id)?;
            let steps: Vec<_> = STAGES
                .iter()
                .map(|stage| {
                    let at_stage: Vec<&Project> =
                        projects.iter().filter(|p| p.progress == Some(stage.id)).collect();
                    json!({ "stage": stage, "projects": at_stage })
                })
                .collect();
            Ok(json!({ "active": "stages", "current_event": event, "steps": steps }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "event_stages", data).await
}

pub async fn event_instruction(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let event = load_event(conn, event_id)?;
            let mut steps = Vec::with_capacity(STAGES.len());
            for stage in STAGES {
                let projects = Project::in_resource_events(conn, Some(stage.id))?;
                steps.push(json!({ "stage": stage, "projects": projects }));
            }
            Ok(json!({ "active": "instruction", "current_event": event, "steps": steps }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "event_instruction", data).await
}

pub async fn event_categories(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let event = load_event(conn, event_id)?;
            let steps = event.categories_for_event(conn)?;
            let uncategorized = Project::query(
                conn,
                "WHERE event_id = ?1 AND is_hidden = 0 AND category_id IS NULL",
                params![event.id],
            )?;
            Ok(json!({
                "active": "categories",
                "current_event": event,
                "steps": steps,
                "projects": uncategorized,
            }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "event_categories", data).await
}

pub async fn event_print(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let data = state
        .db
        .with_conn(|conn| {
            let event = load_event(conn, event_id)?;
            let projects = Project::query(
                conn,
                "WHERE event_id = ?1 AND is_hidden = 0 AND progress >= 0 ORDER BY name",
                params![event.id],
            )?;
            Ok(json!({
                "active": "print",
                "current_event": event,
                "projects": projects,
                "curdate": now().format("%d.%m.%Y %H:%M").to_string(),
            }))
        })
        .await?;

    render(&state, &session, user.as_ref(), "event_print", data).await
}

fn may_start_events(state: &AppState, user: &User) -> bool {
    state.config.allow_events || (user.is_admin && user.active)
}

pub async fn event_start(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
) -> Result<Response, AppError> {
    if !may_start_events(&state, &user) {
        session
            .flash(FlashCategory::Danger, "Only administrators may start events here.")
            .await;
    }
    render(&state, &session, Some(&user), "event_start", json!({ "tips": EVENT_START_TIPS })).await
}

pub async fn event_new_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
) -> Result<Response, AppError> {
    if !may_start_events(&state, &user) {
        return redirect("/event/start");
    }
    render(&state, &session, Some(&user), "event_new", json!({ "form": { "name": "" } })).await
}

pub async fn event_new(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Form(form): Form<EventNewForm>,
) -> Result<Response, AppError> {
    if !may_start_events(&state, &user) {
        return redirect("/event/start");
    }

    let form_view = json!({
        "form": {
            "name": form.name,
            "hostname": form.hostname,
            "location": form.location,
            "starts_at": form.starts_at,
            "ends_at": form.ends_at,
        }
    });
    let schedule = form.schedule();
    let errors = form.validate();
    let (starts_at, ends_at) = match schedule {
        Ok(schedule) if errors.is_empty() => schedule,
        _ => {
            for error in errors {
                session.flash(FlashCategory::Danger, error).await;
            }
            return render(&state, &session, Some(&user), "event_new", form_view).await;
        }
    };

    let event = state
        .db
        .transaction(|conn| {
            if Event::name_taken(conn, &form.name, None)? {
                return Ok(None);
            }
            Ok(Some(Event::insert(
                conn,
                NewEvent {
                    name: form.name.trim().to_string(),
                    hostname: non_blank(form.hostname.clone()),
                    location: non_blank(form.location.clone()),
                    description: non_blank(form.description.clone()),
                    boilerplate: Some(QUICKSTART.to_string()),
                    community_embed: Some(CODE_OF_CONDUCT.to_string()),
                    logo_url: non_blank(form.logo_url.clone()),
                    webpage_url: non_blank(form.webpage_url.clone()),
                    starts_at,
                    ends_at,
                    is_hidden: true,
                    lock_resources: false,
                },
            )?))
        })
        .await?;

    let Some(event) = event else {
        session
            .flash(FlashCategory::Warning, "An event with this name already exists.")
            .await;
        return render(&state, &session, Some(&user), "event_new", form_view).await;
    };

    info!(event = event.id, user = %user.username, "event planned");
    session
        .flash(FlashCategory::Success, "A new event has been planned!")
        .await;
    if !user.is_admin {
        session
            .flash(
                FlashCategory::Warning,
                "Please contact an administrator to make changes \
                 or to promote this event on the home page.",
            )
            .await;
    }
    redirect(&format!("/event/{}", event.id))
}

pub async fn dribs(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<DribsQuery>,
) -> Result<Response, AppError> {
    let page = query.page.unwrap_or(1);
    let per_page = query.limit.unwrap_or(DRIBS_PER_PAGE);
    let data = state
        .db
        .with_conn(|conn| Activity::posts_page(conn, page, per_page))
        .await?;

    render(
        &state,
        &session,
        user.as_ref(),
        "dribs",
        json!({ "active": "dribs", "endpoint": "/dribs", "data": data }),
    )
    .await
}
