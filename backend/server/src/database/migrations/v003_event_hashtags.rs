//! v003: events.hashtags.

pub const MIGRATION_SQL: &str = "
ALTER TABLE events ADD COLUMN hashtags VARCHAR(255);
";
