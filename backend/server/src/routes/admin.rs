//! Organizer views. Every handler requires an active administrator.
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};
use serde_json::json;
use tracing::info;

use super::{flash_redirect, render};
use crate::{
    error::AppError,
    forms::{checked, parse_id, AdminEventForm, CategoryForm, ToggleForm},
    models::{non_blank, Category, Event, FlashCategory, User},
    session::{RequireAdmin, Session},
    state::AppState,
};

pub async fn users(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Response, AppError> {
    let users = state.db.with_conn(User::list).await?;
    render(&state, &session, Some(&admin), "admin_users", json!({ "users": users })).await
}

pub async fn user_toggle(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<i64>,
    Form(form): Form<ToggleForm>,
) -> Result<Response, AppError> {
    if user_id == admin.id && form.field == "admin" {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "You cannot remove your own administrator rights.",
            "/admin/users",
        )
        .await;
    }

    let toggled = state
        .db
        .with_conn(|conn| {
            let mut user = User::get(conn, user_id)?.ok_or(AppError::NotFound)?;
            match form.field.as_str() {
                "active" => user.active = !user.active,
                "admin" => user.is_admin = !user.is_admin,
                _ => return Err(AppError::MalformedPayload),
            }
            user.save(conn)?;
            Ok(user)
        })
        .await?;

    info!(
        user = %toggled.username,
        active = toggled.active,
        admin = toggled.is_admin,
        by = %admin.username,
        "user toggled"
    );
    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("User {} updated.", toggled.username),
        "/admin/users",
    )
    .await
}

pub async fn events(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Response, AppError> {
    let events = state.db.with_conn(Event::list).await?;
    render(&state, &session, Some(&admin), "admin_events", json!({ "events": events })).await
}

pub async fn event_edit(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path(event_id): Path<i64>,
    Form(form): Form<AdminEventForm>,
) -> Result<Response, AppError> {
    let event = state
        .db
        .with_conn(|conn| {
            let mut event = Event::get(conn, event_id)?.ok_or(AppError::NotFound)?;
            event.is_hidden = checked(&form.is_hidden);
            event.lock_editing = checked(&form.lock_editing);
            event.lock_starting = checked(&form.lock_starting);
            event.lock_resources = checked(&form.lock_resources);
            if form.certificate_path.is_some() {
                event.certificate_path = non_blank(form.certificate_path.clone());
            }
            if form.hashtags.is_some() {
                event.hashtags = non_blank(form.hashtags.clone());
            }
            event.save(conn)?;
            Ok(event)
        })
        .await?;

    info!(event = event.id, "event settings saved");
    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("Event {} updated.", event.name),
        "/admin/events",
    )
    .await
}

pub async fn event_current(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path(event_id): Path<i64>,
) -> Result<Response, AppError> {
    let event = state
        .db
        .transaction(|conn| {
            let event = Event::get(conn, event_id)?.ok_or(AppError::NotFound)?;
            Event::set_current(conn, event.id)?;
            Ok(event)
        })
        .await?;

    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("{} is now the current event.", event.name),
        "/admin/events",
    )
    .await
}

pub async fn categories(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Response, AppError> {
    let (categories, events) = state
        .db
        .with_conn(|conn| Ok((Category::for_event(conn, None)?, Event::list(conn)?)))
        .await?;
    render(
        &state,
        &session,
        Some(&admin),
        "admin_categories",
        json!({ "categories": categories, "events": events }),
    )
    .await
}

pub async fn category_create(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Form(form): Form<CategoryForm>,
) -> Result<Response, AppError> {
    if form.name.trim().is_empty() {
        return flash_redirect(
            &session,
            FlashCategory::Danger,
            "Please give the category a name.",
            "/admin/categories",
        )
        .await;
    }

    let description = non_blank(form.description.clone());
    let category = state
        .db
        .with_conn(|conn| {
            let event_id = match parse_id(&form.event_id) {
                Some(id) => Some(Event::get(conn, id)?.ok_or(AppError::NotFound)?.id),
                None => None,
            };
            Category::insert(conn, &form.name, description.as_deref(), event_id)
        })
        .await?;

    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("Category {} added.", category.name),
        "/admin/categories",
    )
    .await
}

pub async fn category_delete(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireAdmin(_admin): RequireAdmin,
    Path(category_id): Path<i64>,
) -> Result<Response, AppError> {
    let category = state
        .db
        .transaction(|conn| {
            let category = Category::get(conn, category_id)?.ok_or(AppError::NotFound)?;
            Category::delete(conn, category.id)?;
            Ok(category)
        })
        .await?;

    flash_redirect(
        &session,
        FlashCategory::Success,
        format!("Category {} deleted.", category.name),
        "/admin/categories",
    )
    .await
}
