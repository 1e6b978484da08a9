//! v002: project_versions, and an activities rebuild for the wider
//! activity type list plus project_version / ref_url.

pub const MIGRATION_SQL: &str = "
CREATE TABLE IF NOT EXISTS project_versions (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    version    INTEGER NOT NULL,
    data       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (project_id, version)
);

CREATE TABLE activities_v2 (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT CHECK (name IN ('create', 'update', 'star', 'boost', 'review')),
    action           VARCHAR(32),
    timestamp        TEXT NOT NULL,
    content          TEXT,
    user_id          INTEGER NOT NULL REFERENCES users(id),
    project_id       INTEGER NOT NULL REFERENCES projects(id),
    project_progress INTEGER,
    project_score    INTEGER,
    project_version  INTEGER,
    resource_id      INTEGER REFERENCES resources(id),
    ref_url          VARCHAR(2048)
);

INSERT INTO activities_v2 (
    id, name, action, timestamp, content, user_id, project_id,
    project_progress, project_score, resource_id
)
SELECT
    id, name, action, timestamp, content, user_id, project_id,
    project_progress, project_score, resource_id
FROM activities;

DROP TABLE activities;
ALTER TABLE activities_v2 RENAME TO activities;

CREATE INDEX IF NOT EXISTS idx_activities_project ON activities(project_id);
CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id);
CREATE INDEX IF NOT EXISTS idx_activities_action ON activities(action);
";
