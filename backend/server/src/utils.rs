use std::sync::LazyLock;

use rand::{distributions::Alphanumeric, thread_rng, Rng};
use regex::Regex;

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static USERNAME_CLEAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:https?://)?(?:www\.)?([^/:?#]+)(?:[:/?#]|$)").unwrap());
static GITHUB_USER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com/([A-Za-z0-9-]+)").unwrap());

pub fn random_password(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Percent-encodes everything outside the unreserved set and `/`.
pub fn encode_query_value(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Only same-site paths are followed after login.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Turns a display name into a username: lowercase, `[a-z0-9_.-]`, no repeats.
pub fn sanitize_username(input: &str) -> String {
    let s = SPACES_RE.replace_all(input.trim(), "_").into_owned();
    let s = USERNAME_CLEAN_RE.replace_all(&s, "").into_owned();
    UNDERSCORES_RE
        .replace_all(&s, "_")
        .trim_matches('_')
        .to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Card type and card data derived from a profile link.
pub fn social_card(webpage_url: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(url) = webpage_url.map(str::trim).filter(|u| !u.is_empty()) else {
        return (None, None);
    };

    let Some(host) = HOST_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
    else {
        return (None, None);
    };

    let cardtype = match host.as_str() {
        "github.com" => "github",
        "gitlab.com" => "gitlab",
        "twitter.com" | "x.com" => "twitter",
        "linkedin.com" => "linkedin",
        "bitbucket.org" => "bitbucket",
        "stackoverflow.com" => "stack-overflow",
        _ => "link",
    };

    let carddata = if cardtype == "github" {
        GITHUB_USER_RE
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| format!("https://github.com/{}.png?size=80", m.as_str()))
    } else {
        None
    };

    (Some(cardtype.to_string()), carddata)
}

pub fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
