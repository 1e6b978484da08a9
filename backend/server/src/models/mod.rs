//! Rows and the queries that read and write them.
//!
//! Every function takes a plain `&Connection`, so callers decide whether a
//! group of writes runs inside [`Database::transaction`](crate::database::Database::transaction).

pub mod activity;
pub mod category;
pub mod event;
pub mod project;
pub mod session;
pub mod user;

pub use activity::{Activity, ActivityType, NewActivity};
pub use category::Category;
pub use event::{Event, NewEvent};
pub use project::{NewProject, Project};
pub use session::{Flash, FlashCategory, SessionRow};
pub use user::{hash_password, NewUser, User, UserProfile, UserSummary};

use chrono::{NaiveDateTime, Utc};

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// `Some` only for non-blank strings.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
