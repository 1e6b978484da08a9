//! Request handlers. Pages answer with a JSON view model naming the view,
//! the queued flash messages and the logged-in user; form posts answer with
//! redirects.
use std::sync::Arc;

use axum::{
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::{json, Map, Value};

use crate::{
    error::AppError,
    models::{Event, FlashCategory, User},
    session::Session,
    state::AppState,
};

pub mod admin;
pub mod auth;
pub mod project;
pub mod public;

/// Builds the JSON page for `view`, draining the session's flashes into it.
/// `data` must be a JSON object; its keys sit next to the common ones.
pub async fn render(
    state: &Arc<AppState>,
    session: &Session,
    user: Option<&User>,
    view: &str,
    data: Value,
) -> Result<Response, AppError> {
    let current_event = match data.get("current_event") {
        Some(event) => event.clone(),
        None => serde_json::to_value(state.db.with_conn(Event::current).await?)?,
    };

    let mut page = Map::new();
    page.insert("view".to_string(), json!(view));
    page.insert("flashes".to_string(), serde_json::to_value(session.take_flashes().await)?);
    page.insert(
        "current_user".to_string(),
        serde_json::to_value(user.map(User::summary))?,
    );
    page.insert("current_event".to_string(), current_event);
    page.insert("analytics".to_string(), serde_json::to_value(&state.config.analytics)?);
    page.insert(
        "oauth_provider".to_string(),
        json!(state.identity.as_ref().map(|p| p.name())),
    );

    if let Value::Object(extra) = data {
        page.extend(extra);
    }

    Ok(Json(Value::Object(page)).into_response())
}

/// Queues a flash and redirects.
pub async fn flash_redirect(
    session: &Session,
    category: FlashCategory,
    message: impl Into<String>,
    to: &str,
) -> Result<Response, AppError> {
    session.flash(category, message).await;
    Ok(Redirect::to(to).into_response())
}

pub fn redirect(to: &str) -> Result<Response, AppError> {
    Ok(Redirect::to(to).into_response())
}
