//! README sources a project can sync from.
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{error::AppError, utils::encode_query_value};

const USER_AGENT: &str = "dribdat";

static GITHUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([\w.-]+)/([\w.-]+?)(?:\.git)?/?(?:[?#].*)?$")
        .unwrap()
});
static GITLAB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?gitlab\.com/([\w.-]+(?:/[\w.-]+)+?)(?:\.git)?/?$")
        .unwrap()
});
static MARKDOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://\S+\.(?:md|markdown)(?:[?#]\S*)?$").unwrap());

/// Project data found at a remote address.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoteProject {
    /// Shown to the user, e.g. "GitHub".
    pub kind: String,
    pub name: String,
    pub summary: Option<String>,
    pub description: String,
    pub homepage_url: Option<String>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub contact_url: Option<String>,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// `Ok(None)` when nothing usable lives at `url`.
    async fn fetch(&self, url: &str) -> Result<Option<RemoteProject>, AppError>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum SourceKind {
    GitHub { owner: String, repo: String },
    GitLab { path: String },
    Markdown { url: String },
}

/// Works out how to read `url`.
pub fn parse_source(url: &str) -> Option<SourceKind> {
    let url = url.trim();

    if let Some(caps) = GITHUB_RE.captures(url) {
        return Some(SourceKind::GitHub {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
        });
    }

    if let Some(caps) = GITLAB_RE.captures(url) {
        return Some(SourceKind::GitLab {
            path: caps[1].to_string(),
        });
    }

    if MARKDOWN_RE.is_match(url) {
        return Some(SourceKind::Markdown {
            url: url.to_string(),
        });
    }

    None
}

/// First `# ` heading of a markdown document.
pub fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

#[derive(Deserialize)]
struct GitHubOwner {
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    description: Option<String>,
    homepage: Option<String>,
    html_url: String,
    default_branch: Option<String>,
    has_issues: Option<bool>,
    owner: Option<GitHubOwner>,
}

#[derive(Deserialize)]
struct GitLabProject {
    name: String,
    description: Option<String>,
    web_url: String,
    avatar_url: Option<String>,
    readme_url: Option<String>,
}

pub struct HttpRemoteSource {
    client: Client,
}

impl Default for HttpRemoteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRemoteSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<Option<String>, AppError> {
        let res = self
            .client
            .get(url)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !res.status().is_success() {
            warn!(url, status = %res.status(), "remote fetch failed");
            return Ok(None);
        }
        Ok(Some(res.text().await?))
    }

    async fn github(&self, owner: &str, repo: &str) -> Result<Option<RemoteProject>, AppError> {
        let api = format!("https://api.github.com/repos/{owner}/{repo}");
        let Some(body) = self.get_text(&api).await? else {
            return Ok(None);
        };
        let data: GitHubRepo = serde_json::from_str(&body)?;

        let branch = data.default_branch.as_deref().unwrap_or("main");
        let readme_url =
            format!("https://raw.githubusercontent.com/{owner}/{repo}/{branch}/README.md");
        let Some(readme) = self.get_text(&readme_url).await? else {
            return Ok(None);
        };

        let contact_url = data
            .has_issues
            .unwrap_or(false)
            .then(|| format!("{}/issues", data.html_url));

        Ok(Some(RemoteProject {
            kind: "GitHub".to_string(),
            name: data.name,
            summary: data.description,
            description: readme,
            homepage_url: data.homepage.filter(|h| !h.trim().is_empty()),
            source_url: Some(data.html_url),
            image_url: data.owner.and_then(|o| o.avatar_url),
            contact_url,
        }))
    }

    async fn gitlab(&self, path: &str) -> Result<Option<RemoteProject>, AppError> {
        let api = format!(
            "https://gitlab.com/api/v4/projects/{}",
            encode_query_value(path).replace('/', "%2F")
        );
        let Some(body) = self.get_text(&api).await? else {
            return Ok(None);
        };
        let data: GitLabProject = serde_json::from_str(&body)?;

        let Some(readme_url) = data.readme_url.map(|u| u.replace("/-/blob/", "/-/raw/")) else {
            return Ok(None);
        };
        let Some(readme) = self.get_text(&readme_url).await? else {
            return Ok(None);
        };

        Ok(Some(RemoteProject {
            kind: "GitLab".to_string(),
            name: data.name,
            summary: data.description.filter(|d| !d.trim().is_empty()),
            description: readme,
            homepage_url: None,
            contact_url: Some(format!("{}/-/issues", data.web_url)),
            source_url: Some(data.web_url),
            image_url: data.avatar_url,
        }))
    }

    async fn markdown(&self, url: &str) -> Result<Option<RemoteProject>, AppError> {
        let Some(text) = self.get_text(url).await? else {
            return Ok(None);
        };
        let Some(name) = markdown_title(&text) else {
            return Ok(None);
        };

        Ok(Some(RemoteProject {
            kind: "Markdown".to_string(),
            name,
            description: text,
            source_url: Some(url.to_string()),
            ..Default::default()
        }))
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch(&self, url: &str) -> Result<Option<RemoteProject>, AppError> {
        let found = match parse_source(url) {
            Some(SourceKind::GitHub { owner, repo }) => self.github(&owner, &repo).await?,
            Some(SourceKind::GitLab { path }) => self.gitlab(&path).await?,
            Some(SourceKind::Markdown { url }) => self.markdown(&url).await?,
            None => None,
        };

        if let Some(project) = &found {
            info!(
                url,
                kind = %project.kind,
                bytes = project.description.len(),
                "remote project fetched"
            );
        }
        Ok(found)
    }
}
