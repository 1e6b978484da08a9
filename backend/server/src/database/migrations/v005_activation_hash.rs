//! v005: activation links get their own column, apart from single sign-on ids.

pub const MIGRATION_SQL: &str = "
ALTER TABLE users ADD COLUMN activation_hash VARCHAR(128);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_activation_hash ON users(activation_hash);
";
