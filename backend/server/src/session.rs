//! Cookie sessions.
//!
//! The cookie holds `<session id>.<hmac>`, signed with the configured secret.
//! Everything else (logged-in user, queued flashes, pending OAuth state) lives
//! in the `sessions` table. A row is only created once a request has
//! something to keep, and only the parts a request changed are written back.
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
    error::AppError,
    models::{session::SESSION_DAYS, Flash, FlashCategory, SessionRow, User},
    state::AppState,
};

pub const COOKIE_NAME: &str = "dribdat_session";

type HmacSha256 = Hmac<Sha256>;

fn signature(secret: &str, id: &str) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    Some(mac.finalize().into_bytes().to_vec())
}

pub fn sign(secret: &str, id: &str) -> String {
    match signature(secret, id) {
        Some(sig) => format!("{id}.{}", hex::encode(sig)),
        None => id.to_string(),
    }
}

/// The session id, if the signature checks out.
pub fn verify(secret: &str, value: &str) -> Option<String> {
    let (id, sig) = value.rsplit_once('.')?;
    let sig = hex::decode(sig).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(id.as_bytes());
    mac.verify_slice(&sig).ok()?;
    Some(id.to_string())
}

fn cookie_value(parts: &axum::http::HeaderMap) -> Option<String> {
    parts
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}

/// Per-request handle on the session row.
#[derive(Clone)]
pub struct Session(Arc<Mutex<SessionRow>>);

impl Session {
    pub async fn user_id(&self) -> Option<i64> {
        self.0.lock().await.user_id()
    }

    pub async fn login(&self, user: &User) {
        self.0.lock().await.set_user_id(Some(user.id));
    }

    pub async fn logout(&self) {
        self.0.lock().await.set_user_id(None);
    }

    pub async fn flash(&self, category: FlashCategory, message: impl Into<String>) {
        self.0.lock().await.push_flash(Flash::new(category, message));
    }

    pub async fn take_flashes(&self) -> Vec<Flash> {
        self.0.lock().await.take_flashes()
    }

    pub async fn set_oauth_state(&self, state: Option<String>) {
        self.0.lock().await.set_oauth_state(state);
    }

    pub async fn take_oauth_state(&self) -> Option<String> {
        self.0.lock().await.take_oauth_state()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::internal("session layer missing"))
    }
}

/// Loads or starts the session, runs the request, then stores what changed.
/// The cookie is only sent when a new session was stored.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secret = state.config.secret_key.clone();
    let presented = cookie_value(req.headers()).and_then(|v| verify(&secret, &v));

    let row = match presented {
        Some(id) => state.db.with_conn(|conn| SessionRow::load(conn, &id)).await?,
        None => None,
    };
    let row = row.unwrap_or_else(|| {
        debug!("no live session, starting a new one");
        SessionRow::new()
    });

    let session = Session(Arc::new(Mutex::new(row)));
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    let mut row = session.0.lock().await.clone();
    let was_persisted = row.is_persisted();
    let stored = state
        .db
        .transaction(|conn| {
            row.store(conn)?;
            Ok(row)
        })
        .await;
    let row = match stored {
        Ok(row) => row,
        Err(e) => {
            error!("failed to store session: {e}");
            return Ok(response);
        }
    };
    if was_persisted || !row.is_persisted() {
        return Ok(response);
    }

    let secure = if state.config.server_ssl { "; Secure" } else { "" };
    let cookie = format!(
        "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        sign(&secret, &row.id),
        SESSION_DAYS * 24 * 60 * 60,
    );
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => error!("invalid session cookie: {e}"),
    }

    Ok(response)
}

/// The logged-in user, if any.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let Some(user_id) = session.user_id().await else {
            return Ok(Self(None));
        };

        let user = state.db.with_conn(|conn| User::get(conn, user_id)).await?;
        if user.is_none() {
            session.logout().await;
        }
        Ok(Self(user))
    }
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// A logged-in user; anonymous visitors are sent to the login page.
pub struct RequireUser(pub User);

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await?.0 {
            Some(user) => Ok(Self(user)),
            None => Err(AppError::LoginRequired {
                next: requested_path(parts),
            }),
        }
    }
}

/// An active administrator.
pub struct RequireAdmin(pub User);

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireUser(user) = RequireUser::from_request_parts(parts, state).await?;
        if user.is_admin && user.active {
            Ok(Self(user))
        } else {
            Err(AppError::Forbidden(
                "You need to be an administrator to access this page.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signed = sign("secret", "abc123");
        assert!(signed.starts_with("abc123."));
        assert_eq!(verify("secret", &signed).as_deref(), Some("abc123"));
        assert_eq!(verify("other", &signed), None);
        assert_eq!(verify("secret", "abc123"), None);
        assert_eq!(verify("secret", "abc123.zz"), None);
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; dribdat_session=xyz.00"),
        );
        assert_eq!(cookie_value(&headers).as_deref(), Some("xyz.00"));
    }
}
