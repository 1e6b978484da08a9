use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_SECRET: &str = "A-big-scary-Secret-goes-HERE.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: String, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Prod,
    Dev,
    Test,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" | "production" => Ok(Self::Prod),
            "dev" | "development" => Ok(Self::Dev),
            "test" | "testing" => Ok(Self::Test),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

impl Environment {
    fn default_database(self) -> &'static str {
        match self {
            Self::Prod => "dribdat.db",
            Self::Dev => "dev.db",
            Self::Test => ":memory:",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthType {
    Slack,
    Azure,
    Github,
}

impl FromStr for OAuthType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "slack" => Ok(Self::Slack),
            "azure" => Ok(Self::Azure),
            "github" => Ok(Self::Github),
            other => Err(format!("unsupported oauth type '{other}'")),
        }
    }
}

impl Display for OAuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Slack => "Slack",
            Self::Azure => "Azure",
            Self::Github => "GitHub",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct OAuthConfig {
    pub kind: OAuthType,
    pub client_id: String,
    pub client_secret: String,
    pub domain: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct Analytics {
    pub href: Option<String>,
    pub simple: Option<String>,
    pub google: Option<String>,
    pub fathom: Option<String>,
    pub fathom_site: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub env: Environment,
    pub port: u16,
    pub database_url: String,
    pub secret_key: String,
    pub api_key: Option<String>,
    pub not_register: bool,
    pub user_approve: bool,
    pub allow_events: bool,
    pub oauth: Option<OAuthConfig>,
    pub server_name: String,
    pub server_ssl: bool,
    pub static_dir: String,
    pub analytics: Analytics,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let env: Environment = try_load("DRIBDAT_ENV", "prod")?;

        Ok(Self {
            env,
            port: try_load("RUST_PORT", "5000")?,
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| env.default_database().to_string()),
            secret_key: read_secret("DRIBDAT_SECRET").unwrap_or_else(|| {
                warn!("DRIBDAT_SECRET not set, sessions are signed with the default key");
                DEFAULT_SECRET.to_string()
            }),
            api_key: read_secret("DRIBDAT_APIKEY"),
            not_register: flag("DRIBDAT_NOT_REGISTER"),
            user_approve: flag("DRIBDAT_USER_APPROVE"),
            allow_events: flag("DRIBDAT_ALLOW_EVENTS"),
            oauth: load_oauth()?,
            server_name: try_load("SERVER_URL", "127.0.0.1:5000")?,
            server_ssl: optional("SERVER_SSL").is_some(),
            static_dir: try_load("DRIBDAT_STATIC", "static")?,
            analytics: Analytics {
                href: optional("ANALYTICS_HREF"),
                simple: optional("ANALYTICS_SIMPLE"),
                google: optional("ANALYTICS_GOOGLE"),
                fathom: optional("ANALYTICS_FATHOM"),
                fathom_site: optional("ANALYTICS_FATHOM_SITE"),
            },
        })
    }

    pub fn for_tests() -> Self {
        Self {
            env: Environment::Test,
            port: 0,
            database_url: Environment::Test.default_database().to_string(),
            secret_key: "test-secret".to_string(),
            api_key: None,
            not_register: false,
            user_approve: false,
            allow_events: false,
            oauth: None,
            server_name: "localhost".to_string(),
            server_ssl: false,
            static_dir: "static".to_string(),
            analytics: Analytics::default(),
        }
    }

    /// Absolute base URL used in mails and OAuth redirects, without trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.server_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.server_name.trim_end_matches('/'))
    }
}

fn load_oauth() -> Result<Option<OAuthConfig>, ConfigError> {
    let Some(kind) = optional("OAUTH_TYPE") else {
        return Ok(None);
    };

    let kind = kind.parse().map_err(|message| ConfigError::Invalid {
        key: "OAUTH_TYPE".to_string(),
        message,
    })?;

    match (read_secret("OAUTH_ID"), read_secret("OAUTH_SECRET")) {
        (Some(client_id), Some(client_secret)) => Ok(Some(OAuthConfig {
            kind,
            client_id,
            client_secret,
            domain: optional("OAUTH_DOMAIN"),
        })),
        _ => {
            warn!("OAUTH_TYPE is set without OAUTH_ID/OAUTH_SECRET, OAuth disabled");
            Ok(None)
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag(key: &str) -> bool {
    optional(key).is_some_and(|value| parse_flag(&value))
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

/// Environment first, then a mounted secret file.
fn read_secret(secret_name: &str) -> Option<String> {
    if let Some(value) = optional(secret_name) {
        return Some(value);
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}
