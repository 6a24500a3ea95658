pub const SCHEMA: &str = r#"
-- Users authenticate with HTTP basic credentials; rows without a password
-- are created lazily when a grant or membership names them
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password_hash TEXT,          -- argon2id hash with embedded salt
    email TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS groups (
    groupname TEXT PRIMARY KEY,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Many-to-many user/group membership
CREATE TABLE IF NOT EXISTS user_groups (
    username TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE,
    groupname TEXT NOT NULL REFERENCES groups(groupname) ON DELETE CASCADE,
    PRIMARY KEY (username, groupname)
);

-- Role grants; distro_id '' is the global scope and exactly one of
-- username/groupname is non-empty
CREATE TABLE IF NOT EXISTS role_grants (
    role TEXT NOT NULL,
    distro_id TEXT NOT NULL DEFAULT '',
    username TEXT NOT NULL DEFAULT '',
    groupname TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (role, distro_id, username, groupname),
    CHECK ((username = '') <> (groupname = ''))
);

-- Distributions keyed by their name slug
CREATE TABLE IF NOT EXISTS distributions (
    distro_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    author TEXT,
    author_email TEXT,
    classifiers TEXT,
    description TEXT,
    download_url TEXT,
    home_page TEXT,
    keywords TEXT,
    license TEXT,
    metadata_version TEXT,
    platform TEXT,
    summary TEXT,
    version TEXT,
    last_updated TEXT
);

-- Curated index pins; insertion order (rowid) is the index order.
-- target_distro_id is not a foreign key so pins survive target deletion.
CREATE TABLE IF NOT EXISTS index_pins (
    indexname TEXT NOT NULL,
    distro_id TEXT NOT NULL REFERENCES distributions(distro_id) ON DELETE CASCADE,
    target_distro_id TEXT NOT NULL,
    target_version TEXT NOT NULL,
    PRIMARY KEY (indexname, distro_id, target_distro_id)
);

CREATE INDEX IF NOT EXISTS idx_user_groups_user ON user_groups(username);
CREATE INDEX IF NOT EXISTS idx_role_grants_scope ON role_grants(distro_id, username, groupname);
CREATE INDEX IF NOT EXISTS idx_distributions_updated ON distributions(last_updated);
CREATE INDEX IF NOT EXISTS idx_index_pins_distro ON index_pins(distro_id, indexname);
"#;
