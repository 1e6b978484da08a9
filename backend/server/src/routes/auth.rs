use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::{flash_redirect, redirect, render};
use crate::{
    error::AppError,
    forms::{LoginForm, RegisterForm, UserForm},
    mailer::user_activation,
    models::{hash_password, non_blank, FlashCategory, NewUser, User},
    oauth::bridge_identity,
    session::{CurrentUser, RequireUser, Session},
    state::AppState,
    utils::{random_password, safe_next},
};

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterQuery {
    pub name: Option<String>,
    pub email: Option<String>,
    pub web: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn login_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    render(
        &state,
        &session,
        user.as_ref(),
        "login",
        json!({ "form": { "username": "" }, "next": query.next }),
    )
    .await
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim().to_string();
    let found = state
        .db
        .with_conn(|conn| User::by_username(conn, &username))
        .await?;

    let problem = match &found {
        None => Some("Unknown user"),
        Some(user) if !user.check_password(&form.password) => Some("Invalid password"),
        Some(user) if !user.active => Some("User not activated"),
        Some(_) => None,
    };

    match (problem, found) {
        (None, Some(user)) => {
            session.login(&user).await;
            info!(user = %user.username, "logged in");
            flash_redirect(
                &session,
                FlashCategory::Success,
                "You are logged in.",
                &safe_next(query.next.as_deref()),
            )
            .await
        }
        (problem, _) => {
            session
                .flash(FlashCategory::Danger, problem.unwrap_or("Unknown user"))
                .await;
            render(
                &state,
                &session,
                None,
                "login",
                json!({ "form": { "username": username }, "next": query.next }),
            )
            .await
        }
    }
}

pub async fn register_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    CurrentUser(user): CurrentUser,
    Query(query): Query<RegisterQuery>,
) -> Result<Response, AppError> {
    if state.config.not_register {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "Registration currently not possible.",
            "/login/",
        )
        .await;
    }

    render(
        &state,
        &session,
        user.as_ref(),
        "register",
        json!({
            "form": {
                "username": query.name.unwrap_or_default(),
                "email": query.email.unwrap_or_default(),
                "webpage_url": query.web.unwrap_or_default(),
            }
        }),
    )
    .await
}

enum Registered {
    EmailTaken,
    NameTaken,
    Created { user: User, first: bool },
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if state.config.not_register {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "Registration currently not possible.",
            "/login/",
        )
        .await;
    }

    let form_view = json!({
        "form": {
            "username": form.username,
            "email": form.email,
            "webpage_url": form.webpage_url,
        }
    });

    let errors = form.validate();
    let email_taken = state
        .db
        .with_conn(|conn| User::by_email(conn, form.email.trim()))
        .await?
        .is_some();

    if email_taken {
        session
            .flash(FlashCategory::Warning, "A user account with this email already exists")
            .await;
        return render(&state, &session, None, "register", form_view).await;
    }
    if !errors.is_empty() {
        for error in errors {
            session.flash(FlashCategory::Danger, error).await;
        }
        return render(&state, &session, None, "register", form_view).await;
    }

    let approve = state.config.user_approve;
    let password_hash = hash_password(&form.password)?;
    let outcome = state
        .db
        .transaction(|conn| {
            if User::by_email(conn, form.email.trim())?.is_some() {
                return Ok(Registered::EmailTaken);
            }
            if User::by_username(conn, form.username.trim())?.is_some() {
                return Ok(Registered::NameTaken);
            }

            let first = User::count(conn)? == 0;
            let mut user = User::insert(
                conn,
                NewUser {
                    username: form.username.trim().to_string(),
                    email: form.email.trim().to_string(),
                    webpage_url: non_blank(form.webpage_url.clone()),
                    password_hash: Some(password_hash),
                    sso_id: None,
                    active: first || !approve,
                },
            )?;
            if first {
                user.is_admin = true;
                user.save(conn)?;
            }
            Ok(Registered::Created { user, first })
        })
        .await?;

    match outcome {
        Registered::EmailTaken => {
            session
                .flash(FlashCategory::Warning, "A user account with this email already exists")
                .await;
            render(&state, &session, None, "register", form_view).await
        }
        Registered::NameTaken => {
            session
                .flash(FlashCategory::Warning, "A user with this name already exists")
                .await;
            render(&state, &session, None, "register", form_view).await
        }
        Registered::Created { user, first: true } => {
            session.login(&user).await;
            info!(user = %user.username, "administrative user created");
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Administrative user created - have fun!",
                "/",
            )
            .await
        }
        Registered::Created { user, .. } if !user.active => {
            let base_url = state.config.base_url();
            user_activation(&state.db, state.mailer.as_ref(), user.id, &base_url).await?;
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Thank you for registering. Please check your e-mail to activate your account.",
                "/",
            )
            .await
        }
        Registered::Created { user, .. } => {
            session.login(&user).await;
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Thank you for registering. You can now log in and submit projects.",
                "/",
            )
            .await
        }
    }
}

pub async fn logout(
    session: Session,
    RequireUser(user): RequireUser,
) -> Result<Response, AppError> {
    session.logout().await;
    info!(user = %user.username, "logged out");
    flash_redirect(&session, FlashCategory::Info, "You are logged out.", "/").await
}

fn profile_view(user: &User) -> serde_json::Value {
    json!({
        "user": user,
        "form": {
            "username": user.username,
            "email": user.email,
            "webpage_url": user.webpage_url,
            "my_story": user.my_story,
            "my_goals": user.my_goals,
        }
    })
}

pub async fn profile_page(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
) -> Result<Response, AppError> {
    render(&state, &session, Some(&user), "user_profile", profile_view(&user)).await
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    RequireUser(user): RequireUser,
    Form(form): Form<UserForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        for error in errors {
            session.flash(FlashCategory::Danger, error).await;
        }
        return render(&state, &session, Some(&user), "user_profile", profile_view(&user)).await;
    }

    let password_hash = form
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(hash_password)
        .transpose()?;

    let user_id = user.id;
    let conflict = state
        .db
        .transaction(|conn| {
            if User::by_username(conn, form.username.trim())?.is_some_and(|u| u.id != user_id) {
                return Ok(Some("A user with this name already exists"));
            }
            if User::by_email(conn, form.email.trim())?.is_some_and(|u| u.id != user_id) {
                return Ok(Some("A user account with this email already exists"));
            }

            let mut user = User::get(conn, user_id)?.ok_or(AppError::NotFound)?;
            user.username = form.username.trim().to_string();
            user.email = form.email.trim().to_string();
            user.webpage_url = non_blank(form.webpage_url.clone());
            user.my_story = non_blank(form.my_story.clone());
            user.my_goals = non_blank(form.my_goals.clone());
            if password_hash.is_some() {
                user.password = password_hash;
            }
            user.socialize();
            user.save(conn)?;
            Ok(None)
        })
        .await?;

    match conflict {
        Some(message) => {
            session.flash(FlashCategory::Warning, message).await;
            render(&state, &session, Some(&user), "user_profile", profile_view(&user)).await
        }
        None => {
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Profile updated.",
                "/user/profile",
            )
            .await
        }
    }
}

pub async fn activate(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(userhash): Path<String>,
) -> Result<Response, AppError> {
    let activated = state
        .db
        .with_conn(|conn| {
            let Some(mut user) = User::by_activation_hash(conn, &userhash)? else {
                return Ok(None);
            };
            user.activation_hash = None;
            user.active = true;
            user.save(conn)?;
            Ok(Some(user))
        })
        .await?;

    match activated {
        Some(user) => {
            session.login(&user).await;
            info!(user = %user.username, "account activated");
            flash_redirect(
                &session,
                FlashCategory::Success,
                "Welcome! Your user account has been activated.",
                "/",
            )
            .await
        }
        None => {
            flash_redirect(
                &session,
                FlashCategory::Danger,
                "Activation not found. Try again, or ask an organizer.",
                "/",
            )
            .await
        }
    }
}

fn callback_url(state: &AppState) -> String {
    format!("{}/oauth/callback", state.config.base_url())
}

pub async fn oauth_login(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, AppError> {
    let Some(provider) = state.identity.clone() else {
        return flash_redirect(
            &session,
            FlashCategory::Warning,
            "Single sign-on is not configured.",
            "/login/",
        )
        .await;
    };

    let oauth_state = random_password(24);
    session.set_oauth_state(Some(oauth_state.clone())).await;
    redirect(&provider.authorize_url(&oauth_state, &callback_url(&state)))
}

pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let Some(provider) = state.identity.clone() else {
        return Err(AppError::NotFound);
    };

    let expected = session.take_oauth_state().await;
    let code = match (query.code, query.state, expected) {
        (Some(code), Some(given), Some(expected)) if given == expected => code,
        _ => {
            if let Some(error) = query.error {
                warn!("sign-in refused by provider: {error}");
            }
            return flash_redirect(
                &session,
                FlashCategory::Danger,
                "Could not sign in, please try again.",
                "/login/",
            )
            .await;
        }
    };

    let identity = match provider.exchange(&code, &callback_url(&state)).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("sign-in with {} failed: {e}", provider.name());
            return flash_redirect(
                &session,
                FlashCategory::Danger,
                format!("Could not sign in with {}.", provider.name()),
                "/login/",
            )
            .await;
        }
    };

    let user = state
        .db
        .transaction(|conn| bridge_identity(conn, &identity))
        .await?;
    if !user.active {
        return flash_redirect(
            &session,
            FlashCategory::Danger,
            "User not activated",
            "/login/",
        )
        .await;
    }

    session.login(&user).await;
    info!(user = %user.username, provider = %provider.name(), "logged in with single sign-on");
    flash_redirect(&session, FlashCategory::Success, "You are logged in.", "/").await
}
