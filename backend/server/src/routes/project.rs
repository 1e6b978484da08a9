use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Form,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;

use super::{flash_redirect, redirect, render};
use crate::{
    aggregation::{
        autoupdate_project, get_suggestions_for_stage, is_project_starred, project_activity, unstar,
        SyncOutcome,
    },
    error::AppError,
    forms::{
        checked, parse_id, ProjectBoostForm, ProjectCommentForm, ProjectForm, ProjectNewForm,
        ProjectPostForm, StarUserForm,
    },
    models::{
        non_blank, Activity, ActivityType, Category, Event, FlashCategory, NewProject, Project,
        User,
    },
    presets::{is_valid_boost, BOOST_TYPES},
    session::{CurrentUser, RequireAdmin, RequireUser, Session},
    stages::{next_stage, validate_project_data},
    state::AppState,
    versioning::{preview, revert_project_by_activity},
};

fn project_url(id: i64) -> String {
    format!("/project/{id}")
}

fn is_admin(user: Option<&User>) -> bool {
    user.is_some_and(|u| u.active && u.is_admin)
}

/// Team members and administrators may edit, unless the event locks
/// editing for everyone but administrators.
fn may_edit(starred: bool, user: Option<&User>, event: Option<&Event>) -> bool {
    let admin = is_admin(user);
    (starred || admin) && (admin || !event.is_some_and(|e| e.lock_editing))
}

fn load_project(conn: &Connection, id: i64) -> Result<Project, AppError> {
    Project::get(conn, id)?.ok_or(AppError::NotFound)
}

fn starred_by(conn: &Connection, project_id: i64, user: Option<&User>) -> Result<bool, AppError> {
    match user {
        Some(user) => is_project_starred(conn, project_id, user.id),
        None => Ok(false),
    }
}

/// Category choices, led by an empty one when there are any.
fn category_choices(conn: &Connection, project_event: Option<i64>) -> Result<Value, AppError> {
    let categories = Category::for_event(conn, project_event)?;
    if categories.is_empty() {
        return Ok(json!([]));
    }
    let mut choices = vec![json!([-1, ""])];
    choices.extend(categories.iter().map(|c| json!([c.id, c.name])));
    Ok(Value::Array(choices))
}

const CATEGORY_UNKNOWN: &str = "Please choose one of the categories of this event.";
const NAME_TAKEN: &str = "A project with this name already exists.";

/// Whether `category_id` is one the project's event offers.
fn category_allowed(
    conn: &Connection,
    event_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<bool, AppError> {
    let Some(category_id) = category_id else {
        return Ok(true);
    };
    Ok(Category::for_event(conn, event_id)?
        .iter()
        .any(|c| c.id == category_id))
}

/// Everything the project page shows about `project`.
fn project_view_model(
    conn: &Connection,
    project: &Project,
    user: Option<&User>,
    base_url: &str,
) -> Result<Value, AppError> {
    let event = project.event(conn)?;
    let starred = starred_by(conn, project.id, user)?;
    let allow_edit = may_edit(starred, user, event.as_ref());
    let allow_post = starred;

    let team: Vec<_> = project.team(conn)?.iter().map(User::summary).collect();
    let dribs = project.all_dribs(conn)?;

    let project_image_url = project
        .image_url
        .clone()
        .or_else(|| event.as_ref().and_then(|e| e.logo_url.clone()))
        .unwrap_or_else(|| format!("{base_url}/static/img/badge-black.png"));

    let (stage, all_valid, suggestions) = if allow_post {
        let (stage, all_valid) = validate_project_data(project);
        let suggestions = if event.as_ref().is_some_and(|e| e.lock_resources) {
            Vec::new()
        } else {
            get_suggestions_for_stage(conn, project.progress)?
        };
        (Some(stage), Some(all_valid), Some(suggestions))
    } else {
        (None, None, None)
    };

    let category = match project.category_id {
        Some(id) => Category::get(conn, id)?,
        None => None,
    };

    Ok(json!({
        "project": project,
        "current_event": event,
        "category": category,
        "project_starred": starred,
        "project_team": team,
        "project_dribs": dribs,
        "project_image_url": project_image_url,
        "allow_edit": allow_edit,
        "allow_post": allow_post,
        "stage": stage,
        "all_valid": all_valid,
        "suggestions": suggestions,
    }))
}

async fn show_project(
    state: &Arc<AppState>,
    session: &Session,
    user: Option<&User>,
    project_id: i64,
) -> Result<Response, AppError> {
    let base_url = state.config.base_url();
    let data = state
        .db
        .with_conn(|conn| {
            let project = load_project(conn, project_id)?;
            project_view_model(conn, &project, user, &base_url)
        })
        .await?;
    render(state, session, user, "project", data).await
}

pub async fn project_view(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    show_project(&state, &session, user.as_ref(), id).await
}

pub async fn project_view_posted(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    session
        .flash(FlashCategory::Success, "Thanks for your Post in the project Log!")
        .await;
    show_project(&state, &session, user.as_ref(), id).await
}

/// Loads the project and checks the user may edit it.
async fn editable_project(
    state: &AppState,
    user: &User,
    id: i64,
) -> Result<Option<Project>, AppError> {
    state
        .db
        .with_conn(|conn| {
            let project = load_project(conn, id)?;
            let starred = is_project_starred(conn, id, user.id)?;
            let event = project.event(conn)?;
            Ok(may_edit(starred, Some(user), event.as_ref()).then_some(project))
        })
        .await
}

async fn render_edit(
    state: &Arc<AppState>,
    session: &Session,
    user: &User,
    project: &Project,
    detail_view: bool,
) -> Result<Response, AppError> {
    let (event, categories) = state
        .db
        .with_conn(|conn| Ok((project.event(conn)?, category_choices(conn, project.event_id)?)))
        .await?;
    render(
        state,
        session,
        Some(user),
        "project_edit",
        json!({
            "project": project,
            "current_event": event,
            "detail_view": detail_view,
            "category_choices": if detail_view { json!(null) } else { categories },
        }),
    )
    .await
}

async fn edit_page(
    state: Arc<AppState>,
    session: Session,
    user: User,
    id: i64,
    detail_view: bool,
) -> Result<Response, AppError> {
    match editable_project(&state, &user, id).await? {
        Some(project) => render_edit(&state, &session, &user, &project, detail_view).await,
        None => {
            flash_redirect(
                &session,
                FlashCategory::Warning,
                "You do not have access to edit this project.",
                &project_url(id),
            )
            .await
        }
    }
}

fn apply_edit(project: &mut Project, form: ProjectForm, detail_view: bool) {
    fn set(field: &mut Option<String>, value: Option<String>) {
        if let Some(value) = value {
            *field = non_blank(Some(value));
        }
    }

    if !detail_view {
        if let Some(name) = form.name {
            project.name = name.trim().to_string();
        }
        set(&mut project.summary, form.summary);
        if let Some(longtext) = form.longtext {
            project.longtext = longtext;
        }
        set(&mut project.autotext_url, form.autotext_url);
        if form.category_id.is_some() {
            project.category_id = parse_id(&form.category_id);
        }
    }
    project.is_webembed = checked(&form.is_webembed);
    set(&mut project.webpage_url, form.webpage_url);
    set(&mut project.source_url, form.source_url);
    set(&mut project.image_url, form.image_url);
    set(&mut project.contact_url, form.contact_url);
    set(&mut project.hashtag, form.hashtag);
    set(&mut project.logo_color, form.logo_color);
    set(&mut project.logo_icon, form.logo_icon);
}

async fn edit_action(
    state: Arc<AppState>,
    session: Session,
    user: User,
    id: i64,
    form: ProjectForm,
    detail_view: bool,
) -> Result<Response, AppError> {
    let Some(mut project) = editable_project(&state, &user, id).await? else {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You do not have access to edit this project.",
            &project_url(id),
        )
        .await;
    };

    let errors = form.validate();
    if !errors.is_empty() {
        for error in errors {
            session.flash(FlashCategory::Danger, error).await;
        }
        return render_edit(&state, &session, &user, &project, detail_view).await;
    }

    apply_edit(&mut project, form, detail_view);
    let user_id = user.id;
    let rejected = state
        .db
        .transaction(|conn| {
            if !category_allowed(conn, project.event_id, project.category_id)? {
                return Ok(Some(CATEGORY_UNKNOWN));
            }
            if Project::name_taken(conn, &project.name, Some(project.id))? {
                return Ok(Some(NAME_TAKEN));
            }
            project.save(conn)?;
            project_activity(conn, &mut project, ActivityType::Update, user_id, None, None)?;
            Ok(None)
        })
        .await?;

    if let Some(message) = rejected {
        session.flash(FlashCategory::Warning, message).await;
        return render_edit(&state, &session, &user, &project, detail_view).await;
    }

    info!(project = id, user = %user.username, "project updated");
    flash_redirect(&session, FlashCategory::Success, "Project updated.", &project_url(id)).await
}

pub async fn project_edit_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    edit_page(state, session, user, id, false).await
}

pub async fn project_edit(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, AppError> {
    edit_action(state, session, user, id, form, false).await
}

pub async fn project_details_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    edit_page(state, session, user, id, true).await
}

pub async fn project_details(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<ProjectForm>,
) -> Result<Response, AppError> {
    edit_action(state, session, user, id, form, true).await
}

async fn render_boost(
    state: &Arc<AppState>,
    session: &Session,
    user: &User,
    id: i64,
) -> Result<Response, AppError> {
    let project = state.db.with_conn(|conn| load_project(conn, id)).await?;
    render(
        state,
        session,
        Some(user),
        "project_boost",
        json!({ "project": project, "boost_types": BOOST_TYPES }),
    )
    .await
}

pub async fn project_boost_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    if !is_admin(Some(&user)) {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You do not have access to boost this project.",
            &project_url(id),
        )
        .await;
    }
    render_boost(&state, &session, &user, id).await
}

pub async fn project_boost(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<ProjectBoostForm>,
) -> Result<Response, AppError> {
    if !is_admin(Some(&user)) {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You do not have access to boost this project.",
            &project_url(id),
        )
        .await;
    }
    if !is_valid_boost(&form.boost_type) {
        session.flash(FlashCategory::Danger, "Please select a boost.").await;
        return render_boost(&state, &session, &user, id).await;
    }

    let user_id = user.id;
    state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, id)?;
            project_activity(
                conn,
                &mut project,
                ActivityType::Boost,
                user_id,
                Some(form.boost_type.as_str()),
                form.note.as_deref(),
            )
        })
        .await?;

    flash_redirect(
        &session,
        FlashCategory::Success,
        "Thanks for your boost!",
        &project_url(id),
    )
    .await
}

async fn postable_project(
    state: &AppState,
    user: &User,
    id: i64,
) -> Result<Option<Project>, AppError> {
    state
        .db
        .with_conn(|conn| {
            let project = load_project(conn, id)?;
            Ok(is_project_starred(conn, id, user.id)?.then_some(project))
        })
        .await
}

pub async fn project_post_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let Some(project) = postable_project(&state, &user, id).await? else {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You do not have access to post to this project.",
            &project_url(id),
        )
        .await;
    };

    let (stage, all_valid) = validate_project_data(&project);
    render(
        &state,
        &session,
        Some(&user),
        "project_post",
        json!({
            "project": project,
            "stage": stage,
            "all_valid": all_valid,
            "next_stage": next_stage(&project),
        }),
    )
    .await
}

pub async fn project_post(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<ProjectPostForm>,
) -> Result<Response, AppError> {
    let Some(mut project) = postable_project(&state, &user, id).await? else {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You do not have access to post to this project.",
            &project_url(id),
        )
        .await;
    };

    if checked(&form.has_progress) {
        match next_stage(&project) {
            Some(stage) => {
                project.progress = Some(stage.id);
                session
                    .flash(FlashCategory::Info, "Your project has been promoted!")
                    .await;
            }
            None => {
                session
                    .flash(FlashCategory::Info, "Your project did not meet stage requirements.")
                    .await;
            }
        }
    }

    let user_id = user.id;
    state
        .db
        .transaction(|conn| {
            project.save(conn)?;
            project_activity(
                conn,
                &mut project,
                ActivityType::Update,
                user_id,
                Some("post"),
                form.note.as_deref(),
            )
        })
        .await?;

    redirect(&format!("/project/{id}/posted"))
}

pub async fn project_comment_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let project = state.db.with_conn(|conn| load_project(conn, id)).await?;
    render(&state, &session, Some(&user), "project_comment", json!({ "project": project })).await
}

pub async fn project_comment(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
    Form(form): Form<ProjectCommentForm>,
) -> Result<Response, AppError> {
    let Some(note) = form.note() else {
        session.flash(FlashCategory::Danger, "Please write a comment.").await;
        let project = state.db.with_conn(|conn| load_project(conn, id)).await?;
        let data = json!({ "project": project });
        return render(&state, &session, Some(&user), "project_comment", data).await;
    };

    let user_id = user.id;
    state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, id)?;
            project_activity(
                conn,
                &mut project,
                ActivityType::Review,
                user_id,
                Some("post"),
                Some(note.as_str()),
            )
        })
        .await?;

    redirect(&format!("/project/{id}/posted"))
}

/// Loads an activity of this project.
fn project_activity_row(
    conn: &Connection,
    project_id: i64,
    activity_id: i64,
) -> Result<Activity, AppError> {
    Activity::get(conn, activity_id)?
        .filter(|a| a.project_id == project_id)
        .ok_or(AppError::NotFound)
}

pub async fn post_delete(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path((id, activity_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let admin = is_admin(Some(&user));
    let deleted = state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, id)?;
            let activity = project_activity_row(conn, id, activity_id)?;
            if activity.user_id != user.id && !admin {
                return Ok(false);
            }
            Activity::delete(conn, activity.id)?;
            project.store_score(conn)?;
            Ok(true)
        })
        .await?;

    if deleted {
        flash_redirect(
            &session,
            FlashCategory::Success,
            "The post has been deleted.",
            &project_url(id),
        )
        .await
    } else {
        flash_redirect(
            &session,
            FlashCategory::Warning,
            "You may only delete your own posts.",
            &project_url(id),
        )
        .await
    }
}

pub async fn post_preview(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Path((id, activity_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let base_url = state.config.base_url();
    let archived = state
        .db
        .with_conn(|conn| {
            let project = load_project(conn, id)?;
            let activity = project_activity_row(conn, id, activity_id)?;
            match preview(conn, &project, &activity)? {
                Ok(archived) => {
                    let mut data = project_view_model(conn, &archived, user.as_ref(), &base_url)?;
                    data["archived"] = json!(true);
                    data["project_version"] = json!(activity.project_version);
                    data["allow_edit"] = json!(false);
                    data["allow_post"] = json!(false);
                    Ok(Ok(data))
                }
                Err(refusal) => Ok(Err(refusal)),
            }
        })
        .await?;

    match archived {
        Ok(data) => {
            session
                .flash(FlashCategory::Info, "This is an archived version of the project")
                .await;
            render(&state, &session, user.as_ref(), "project", data).await
        }
        Err(refusal) => {
            flash_redirect(
                &session,
                FlashCategory::Warning,
                refusal.message(),
                &project_url(id),
            )
            .await
        }
    }
}

pub async fn revert(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path((id, activity_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let admin = is_admin(Some(&user));
    let user_id = user.id;
    let outcome = state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, id)?;
            if !admin && !is_project_starred(conn, id, user_id)? {
                return Ok(None);
            }
            let activity = project_activity_row(conn, id, activity_id)?;
            let reverted = revert_project_by_activity(conn, &mut project, &activity)?;
            if let Ok(version) = reverted {
                let version = activity.project_version.unwrap_or(version);
                let note = format!("Reverted to version {version}");
                project_activity(
                    conn,
                    &mut project,
                    ActivityType::Update,
                    user_id,
                    None,
                    Some(note.as_str()),
                )?;
            }
            Ok(Some(reverted))
        })
        .await?;

    match outcome {
        None => {
            flash_redirect(
                &session,
                FlashCategory::Warning,
                "You do not have access to revert this project.",
                &project_url(id),
            )
            .await
        }
        Some(Ok(_)) => {
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Project data has been reverted.",
                &project_url(id),
            )
            .await
        }
        Some(Err(refusal)) => {
            flash_redirect(
                &session,
                FlashCategory::Warning,
                refusal.message(),
                &project_url(id),
            )
            .await
        }
    }
}

async fn star_for(state: &AppState, project_id: i64, user_id: i64) -> Result<(), AppError> {
    state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, project_id)?;
            project_activity(conn, &mut project, ActivityType::Star, user_id, None, None)?;
            Ok(())
        })
        .await
}

async fn unstar_for(state: &AppState, project_id: i64, user_id: i64) -> Result<(), AppError> {
    state
        .db
        .transaction(|conn| {
            let mut project = load_project(conn, project_id)?;
            unstar(conn, &mut project, user_id)?;
            Ok(())
        })
        .await
}

pub async fn project_star(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    if !user.active {
        return Ok("User not allowed. Please contact event organizers.".into_response());
    }
    star_for(&state, id, user.id).await?;
    flash_redirect(&session, FlashCategory::Success, "Welcome to the team!", &project_url(id)).await
}

pub async fn project_star_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<StarUserForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim().to_string();
    let Some(member) = state.db.with_conn(|conn| User::by_username(conn, &username)).await? else {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            format!("User [{username}] not found. Please try again."),
            &project_url(id),
        )
        .await;
    };

    star_for(&state, id, member.id).await?;
    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("Added {username} to the team!"),
        &project_url(id),
    )
    .await
}

pub async fn project_unstar_me(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    unstar_for(&state, id, user.id).await?;
    flash_redirect(
        &session,
        FlashCategory::Success,
        "You have left the project",
        &project_url(id),
    )
    .await
}

pub async fn project_unstar(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<Response, AppError> {
    let member = state
        .db
        .with_conn(|conn| User::get(conn, user_id))
        .await?
        .ok_or(AppError::NotFound)?;

    unstar_for(&state, id, member.id).await?;
    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("User {} has left the project", member.username),
        &project_url(id),
    )
    .await
}

/// Checks the user may start a project in the event; `Err` carries the
/// redirect to send instead.
async fn startable_event(
    state: &AppState,
    session: &Session,
    user: &User,
    event_id: i64,
) -> Result<Result<Event, Response>, AppError> {
    let event_url = format!("/event/{event_id}");
    if !user.active {
        let response = flash_redirect(
            session,
            FlashCategory::Warning,
            "Your account needs to be activated - please contact an organizer.",
            &event_url,
        )
        .await?;
        return Ok(Err(response));
    }

    let event = state
        .db
        .with_conn(|conn| Event::get(conn, event_id))
        .await?
        .ok_or(AppError::NotFound)?;
    if event.lock_starting {
        let response = flash_redirect(
            session,
            FlashCategory::Error,
            "Starting a new project is disabled for this event.",
            &event_url,
        )
        .await?;
        return Ok(Err(response));
    }
    Ok(Ok(event))
}

async fn render_new(
    state: &Arc<AppState>,
    session: &Session,
    user: &User,
    event: &Event,
    form: Value,
) -> Result<Response, AppError> {
    let categories = state
        .db
        .with_conn(|conn| category_choices(conn, Some(event.id)))
        .await?;
    render(
        state,
        session,
        Some(user),
        "project_new",
        json!({ "current_event": event, "category_choices": categories, "form": form }),
    )
    .await
}

pub async fn project_new_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    match startable_event(&state, &session, &user, event_id).await? {
        Ok(event) => render_new(&state, &session, &user, &event, json!({ "name": "" })).await,
        Err(response) => Ok(response),
    }
}

pub async fn project_new(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(event_id): Path<i64>,
    Form(form): Form<ProjectNewForm>,
) -> Result<Response, AppError> {
    let event = match startable_event(&state, &session, &user, event_id).await? {
        Ok(event) => event,
        Err(response) => return Ok(response),
    };

    let form_view = json!({
        "name": form.name,
        "summary": form.summary,
        "autotext_url": form.autotext_url,
    });
    let errors = form.validate();
    if !errors.is_empty() {
        for error in errors {
            session.flash(FlashCategory::Danger, error).await;
        }
        return render_new(&state, &session, &user, &event, form_view).await;
    }

    let started = event.has_started();
    let user_id = user.id;
    let created = state
        .db
        .transaction(|conn| {
            let category_id = parse_id(&form.category_id);
            if !category_allowed(conn, Some(event.id), category_id)? {
                return Ok(Err(CATEGORY_UNKNOWN));
            }
            if Project::name_taken(conn, &form.name, None)? {
                return Ok(Err(NAME_TAKEN));
            }
            let mut project = Project::create(
                conn,
                NewProject {
                    name: form.name.trim().to_string(),
                    summary: non_blank(form.summary.clone()),
                    longtext: form.longtext.clone().unwrap_or_default(),
                    autotext_url: non_blank(form.autotext_url.clone()),
                    category_id,
                    user_id: Some(user_id),
                    event_id: Some(event.id),
                    progress: Some(if started { 5 } else { -1 }),
                    is_hidden: false,
                },
            )?;
            project_activity(conn, &mut project, ActivityType::Create, user_id, None, None)?;
            if started {
                project_activity(conn, &mut project, ActivityType::Star, user_id, None, None)?;
            }
            Ok(Ok(project))
        })
        .await?;

    let project = match created {
        Ok(project) => project,
        Err(message) => {
            session.flash(FlashCategory::Warning, message).await;
            return render_new(&state, &session, &user, &event, form_view).await;
        }
    };

    info!(project = project.id, event = event.id, user = %user.username, "project created");
    session
        .flash(FlashCategory::Success, "Invite your team to Join this page!")
        .await;

    if project.is_autoupdate {
        return sync_and_redirect(&state, &session, &project, user.id).await;
    }
    redirect(&project_url(project.id))
}

async fn sync_and_redirect(
    state: &AppState,
    session: &Session,
    project: &Project,
    user_id: i64,
) -> Result<Response, AppError> {
    match autoupdate_project(&state.db, state.remote.as_ref(), project.id, Some(user_id)).await? {
        SyncOutcome::Synced(kind) => {
            flash_redirect(
                session,
                FlashCategory::Success,
                format!("Project data synced from {kind}"),
                &project_url(project.id),
            )
            .await
        }
        SyncOutcome::NothingFound => {
            flash_redirect(
                session,
                FlashCategory::Warning,
                "Could not sync: check that the remote site contains a README.",
                &project_url(project.id),
            )
            .await
        }
    }
}

pub async fn project_autoupdate(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let (project, starred) = state
        .db
        .with_conn(|conn| Ok((load_project(conn, id)?, is_project_starred(conn, id, user.id)?)))
        .await?;

    let allowed = starred || is_admin(Some(&user));
    if !allowed || project.is_hidden || !project.is_autoupdate {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You may not sync this project.",
            &project_url(id),
        )
        .await;
    }
    sync_and_redirect(&state, &session, &project, user.id).await
}
