//! Single sign-on: the code-for-token exchange with Slack, Azure or GitHub,
//! and bridging the identity onto a local account.
use async_trait::async_trait;
use reqwest::{header, Client};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::{
    config::{OAuthConfig, OAuthType},
    error::AppError,
    models::{NewUser, User},
    utils::{encode_query_value, sanitize_username},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub sso_id: String,
    pub username: String,
    pub email: String,
    pub webpage_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name shown on the login page.
    fn name(&self) -> String;

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String;

    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<OAuthIdentity, AppError>;
}

struct Endpoints {
    authorize: String,
    token: String,
    userinfo: String,
    scope: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// OpenID Connect userinfo, as Slack and Azure return it.
#[derive(Deserialize)]
struct OpenIdUser {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    html_url: Option<String>,
}

pub struct HttpIdentityProvider {
    config: OAuthConfig,
    client: Client,
}

impl HttpIdentityProvider {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoints(&self) -> Endpoints {
        match self.config.kind {
            OAuthType::Github => Endpoints {
                authorize: "https://github.com/login/oauth/authorize".to_string(),
                token: "https://github.com/login/oauth/access_token".to_string(),
                userinfo: "https://api.github.com/user".to_string(),
                scope: "read:user user:email",
            },
            OAuthType::Slack => Endpoints {
                authorize: "https://slack.com/openid/connect/authorize".to_string(),
                token: "https://slack.com/api/openid.connect.token".to_string(),
                userinfo: "https://slack.com/api/openid.connect.userInfo".to_string(),
                scope: "openid email profile",
            },
            OAuthType::Azure => {
                let tenant = self.config.domain.as_deref().unwrap_or("common");
                let base = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0");
                Endpoints {
                    authorize: format!("{base}/authorize"),
                    token: format!("{base}/token"),
                    userinfo: "https://graph.microsoft.com/oidc/userinfo".to_string(),
                    scope: "openid email profile",
                }
            }
        }
    }

    async fn access_token(&self, code: &str, redirect_uri: &str) -> Result<String, AppError> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        let token: TokenResponse = self
            .client
            .post(self.endpoints().token)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        match (token.access_token, token.error) {
            (Some(access_token), _) => Ok(access_token),
            (None, error) => Err(AppError::Remote(format!(
                "token exchange refused: {}",
                error.unwrap_or_else(|| "no access token".to_string())
            ))),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    fn name(&self) -> String {
        self.config.kind.to_string()
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        let endpoints = self.endpoints();
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            endpoints.authorize,
            encode_query_value(&self.config.client_id),
            encode_query_value(redirect_uri),
            encode_query_value(endpoints.scope),
            encode_query_value(state),
        )
    }

    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<OAuthIdentity, AppError> {
        let access_token = self.access_token(code, redirect_uri).await?;
        let request = self
            .client
            .get(self.endpoints().userinfo)
            .bearer_auth(access_token)
            .header(header::USER_AGENT, "dribdat");

        let identity = match self.config.kind {
            OAuthType::Github => {
                let user: GitHubUser = request.send().await?.json().await?;
                OAuthIdentity {
                    sso_id: user.id.to_string(),
                    email: user
                        .email
                        .unwrap_or_else(|| format!("{}@users.noreply.github.com", user.login)),
                    username: user.login,
                    webpage_url: user.html_url,
                }
            }
            OAuthType::Slack | OAuthType::Azure => {
                let user: OpenIdUser = request.send().await?.json().await?;
                let email = user
                    .email
                    .ok_or_else(|| AppError::Remote("identity has no e-mail address".to_string()))?;
                OAuthIdentity {
                    username: user
                        .name
                        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string()),
                    sso_id: user.sub,
                    email,
                    webpage_url: None,
                }
            }
        };

        Ok(identity)
    }
}

/// A username based on `wanted` that nobody has yet.
fn unique_username(conn: &Connection, wanted: &str) -> Result<String, AppError> {
    let mut base = sanitize_username(wanted);
    if base.len() < 3 {
        base = format!("user_{base}");
    }
    base.truncate(20);

    let mut candidate = base.clone();
    let mut n = 1;
    while User::by_username(conn, &candidate)?.is_some() {
        n += 1;
        candidate = format!("{base}{n}");
    }
    Ok(candidate)
}

/// The local account for an identity: matched by SSO id, then by e-mail,
/// otherwise created as an active user.
pub fn bridge_identity(conn: &Connection, identity: &OAuthIdentity) -> Result<User, AppError> {
    if let Some(user) = User::by_sso_id(conn, &identity.sso_id)? {
        return Ok(user);
    }

    if let Some(mut user) = User::by_email(conn, &identity.email)? {
        user.sso_id = Some(identity.sso_id.clone());
        user.save(conn)?;
        info!(user = %user.username, "linked single sign-on to existing account");
        return Ok(user);
    }

    let username = unique_username(conn, &identity.username)?;
    let user = User::insert(
        conn,
        NewUser {
            username,
            email: identity.email.clone(),
            webpage_url: identity.webpage_url.clone(),
            password_hash: None,
            sso_id: Some(identity.sso_id.clone()),
            active: true,
        },
    )?;
    info!(user = %user.username, "created account from single sign-on");
    Ok(user)
}
