//! v001: events, roles, users, categories, resources, users_roles, projects, activities.

pub const MIGRATION_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             VARCHAR(80) NOT NULL UNIQUE,
    hostname         VARCHAR(80),
    location         VARCHAR(255),
    description      TEXT,
    boilerplate      TEXT,
    resources        TEXT,
    logo_url         VARCHAR(255),
    custom_css       TEXT,
    webpage_url      VARCHAR(255),
    community_url    VARCHAR(255),
    community_embed  TEXT,
    certificate_path VARCHAR(1024),
    starts_at        TEXT NOT NULL,
    ends_at          TEXT NOT NULL,
    is_hidden        BOOLEAN NOT NULL DEFAULT 0,
    is_current       BOOLEAN NOT NULL DEFAULT 0,
    lock_editing     BOOLEAN NOT NULL DEFAULT 0,
    lock_starting    BOOLEAN NOT NULL DEFAULT 0,
    lock_resources   BOOLEAN NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS roles (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(80) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    VARCHAR(80) NOT NULL UNIQUE,
    email       VARCHAR(80) NOT NULL UNIQUE,
    webpage_url VARCHAR(128),
    sso_id      VARCHAR(128),
    password    VARCHAR(128),
    created_at  TEXT NOT NULL,
    active      BOOLEAN NOT NULL DEFAULT 0,
    is_admin    BOOLEAN NOT NULL DEFAULT 0,
    cardtype    VARCHAR(80),
    carddata    VARCHAR(255),
    my_story    TEXT,
    my_goals    TEXT
);

CREATE TABLE IF NOT EXISTS categories (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        VARCHAR(80) NOT NULL,
    description TEXT,
    logo_color  VARCHAR(7),
    logo_icon   VARCHAR(20),
    event_id    INTEGER REFERENCES events(id)
);

CREATE TABLE IF NOT EXISTS resources (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          VARCHAR(80) NOT NULL UNIQUE,
    type_id       INTEGER,
    created_at    TEXT NOT NULL,
    is_visible    BOOLEAN NOT NULL DEFAULT 0,
    progress_tip  INTEGER,
    source_url    VARCHAR(2048),
    download_url  VARCHAR(2048),
    summary       VARCHAR(140),
    sync_content  TEXT,
    content       TEXT,
    user_id       INTEGER REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS users_roles (
    user_id INTEGER NOT NULL REFERENCES users(id),
    role_id INTEGER NOT NULL REFERENCES roles(id),
    PRIMARY KEY (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS projects (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          VARCHAR(80) NOT NULL UNIQUE,
    summary       VARCHAR(120),
    image_url     VARCHAR(255),
    source_url    VARCHAR(255),
    webpage_url   VARCHAR(2048),
    is_webembed   BOOLEAN NOT NULL DEFAULT 0,
    contact_url   VARCHAR(255),
    autotext_url  VARCHAR(255),
    is_autoupdate BOOLEAN NOT NULL DEFAULT 0,
    autotext      TEXT,
    longtext      TEXT NOT NULL DEFAULT '',
    hashtag       VARCHAR(40),
    logo_color    VARCHAR(7),
    logo_icon     VARCHAR(40),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    is_hidden     BOOLEAN NOT NULL DEFAULT 0,
    user_id       INTEGER REFERENCES users(id),
    event_id      INTEGER REFERENCES events(id),
    category_id   INTEGER REFERENCES categories(id),
    progress      INTEGER,
    score         INTEGER
);

CREATE TABLE IF NOT EXISTS activities (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT CHECK (name IN ('create', 'update', 'star')),
    action           VARCHAR(32),
    timestamp        TEXT NOT NULL,
    content          TEXT,
    user_id          INTEGER NOT NULL REFERENCES users(id),
    project_id       INTEGER NOT NULL REFERENCES projects(id),
    project_progress INTEGER,
    project_score    INTEGER,
    resource_id      INTEGER REFERENCES resources(id)
);

CREATE INDEX IF NOT EXISTS idx_projects_event ON projects(event_id);
CREATE INDEX IF NOT EXISTS idx_activities_project ON activities(project_id);
CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id);
";
