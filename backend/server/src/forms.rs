//! Url-encoded form payloads and their validation. Every field arrives as a
//! string; blanks count as missing.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::{
    config::parse_flag,
    models::{non_blank, now},
    utils::is_valid_email,
};

/// HTML checkboxes send `y`/`on` when ticked and nothing otherwise.
pub fn checked(value: &Option<String>) -> bool {
    value
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("y") || parse_flag(v))
}

/// `None` for blank, `-1` or unparsable ids.
pub fn parse_id(value: &Option<String>) -> Option<i64> {
    value
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

/// Accepts `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM` or a bare date.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(9, 0, 0))
        })
}

fn length_between(errors: &mut Vec<String>, label: &str, value: &str, min: usize, max: usize) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        errors.push(format!("{label} must be between {min} and {max} characters long."));
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
    pub webpage_url: Option<String>,
}

impl RegisterForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "Username", &self.username, 3, 25);
        if !is_valid_email(&self.email) {
            errors.push("Invalid email address.".to_string());
        }
        length_between(&mut errors, "Password", &self.password, 6, 40);
        if self.password != self.confirm {
            errors.push("Passwords must match".to_string());
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub webpage_url: Option<String>,
    pub my_story: Option<String>,
    pub my_goals: Option<String>,
    pub password: Option<String>,
}

impl UserForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "Username", &self.username, 3, 25);
        if !is_valid_email(&self.email) {
            errors.push("Invalid email address.".to_string());
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            length_between(&mut errors, "Password", password, 6, 40);
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectNewForm {
    #[serde(default)]
    pub name: String,
    pub summary: Option<String>,
    pub longtext: Option<String>,
    pub autotext_url: Option<String>,
    pub category_id: Option<String>,
}

impl ProjectNewForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "Name", &self.name, 1, 80);
        if self.summary.as_deref().is_some_and(|s| s.chars().count() > 120) {
            errors.push("Summary must be at most 120 characters long.".to_string());
        }
        errors
    }
}

/// Full edit form. The details form posts the same fields minus the
/// description ones, so absent fields leave the project unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectForm {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub longtext: Option<String>,
    pub autotext_url: Option<String>,
    pub category_id: Option<String>,
    pub webpage_url: Option<String>,
    pub is_webembed: Option<String>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub contact_url: Option<String>,
    pub hashtag: Option<String>,
    pub logo_color: Option<String>,
    pub logo_icon: Option<String>,
}

impl ProjectForm {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            length_between(&mut errors, "Name", name, 1, 80);
        }
        if self.summary.as_deref().is_some_and(|s| s.chars().count() > 120) {
            errors.push("Summary must be at most 120 characters long.".to_string());
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectPostForm {
    pub note: Option<String>,
    pub has_progress: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectBoostForm {
    #[serde(default)]
    pub boost_type: String,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectCommentForm {
    pub note: Option<String>,
}

impl ProjectCommentForm {
    pub fn note(&self) -> Option<String> {
        non_blank(self.note.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StarUserForm {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventNewForm {
    #[serde(default)]
    pub name: String,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub webpage_url: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
}

impl EventNewForm {
    /// Start and end, defaulting to now and one day later.
    pub fn schedule(&self) -> Result<(NaiveDateTime, NaiveDateTime), String> {
        let starts_at = match non_blank(self.starts_at.clone()) {
            Some(value) => parse_datetime(&value).ok_or("Invalid start date.")?,
            None => now(),
        };
        let ends_at = match non_blank(self.ends_at.clone()) {
            Some(value) => parse_datetime(&value).ok_or("Invalid end date.")?,
            None => starts_at + Duration::days(1),
        };
        if ends_at < starts_at {
            return Err("The event must end after it starts.".to_string());
        }
        Ok((starts_at, ends_at))
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "Name", &self.name, 1, 80);
        if let Err(e) = self.schedule() {
            errors.push(e);
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminEventForm {
    pub is_hidden: Option<String>,
    pub lock_editing: Option<String>,
    pub lock_starting: Option<String>,
    pub lock_resources: Option<String>,
    pub certificate_path: Option<String>,
    pub hashtags: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleForm {
    #[serde(default)]
    pub field: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            username: username.to_string(),
            email: "foo@bar.com".to_string(),
            password: password.to_string(),
            confirm: confirm.to_string(),
            webpage_url: None,
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("foobar", "secret", "secret").validate().is_empty());
        assert_eq!(
            register("foobar", "secret", "secrets").validate(),
            vec!["Passwords must match".to_string()]
        );
        assert_eq!(register("fo", "secret", "secret").validate().len(), 1);
        assert_eq!(register("foobar", "short", "short").validate().len(), 1);
    }

    #[test]
    fn test_checked_and_ids() {
        assert!(checked(&Some("y".to_string())));
        assert!(checked(&Some("on".to_string())));
        assert!(!checked(&None));
        assert_eq!(parse_id(&Some("4".to_string())), Some(4));
        assert_eq!(parse_id(&Some("-1".to_string())), None);
        assert_eq!(parse_id(&Some("".to_string())), None);
    }

    #[test]
    fn test_event_schedule() {
        let form = EventNewForm {
            name: "Hack".to_string(),
            starts_at: Some("2024-05-01 09:00".to_string()),
            ends_at: Some("2024-05-02".to_string()),
            ..Default::default()
        };
        let (starts, ends) = form.schedule().unwrap();
        assert_eq!(starts.to_string(), "2024-05-01 09:00:00");
        assert_eq!(ends.to_string(), "2024-05-02 09:00:00");

        let backwards = EventNewForm {
            name: "Hack".to_string(),
            starts_at: Some("2024-05-03".to_string()),
            ends_at: Some("2024-05-02".to_string()),
            ..Default::default()
        };
        assert!(backwards.schedule().is_err());

        let defaults = EventNewForm {
            name: "Hack".to_string(),
            ..Default::default()
        };
        assert!(defaults.validate().is_empty());
    }
}
