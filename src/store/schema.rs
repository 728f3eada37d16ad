pub const SCHEMA: &str = r#"
-- Applications: deployable/logical units, hierarchical
CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    properties TEXT NOT NULL DEFAULT '{}',  -- JSON object, open key/value map

    -- Hierarchy (derived fields rebuilt on every structural change)
    parent_id TEXT REFERENCES applications(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL DEFAULT 0,
    path TEXT NOT NULL DEFAULT '',
    lft INTEGER NOT NULL DEFAULT 0,
    rgt INTEGER NOT NULL DEFAULT 0,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Attributes: typed key/value definitions, hierarchical
CREATE TABLE IF NOT EXISTS attributes (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',         -- stored as text regardless of data_type
    data_type TEXT NOT NULL DEFAULT 'string',
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}',    -- JSON object

    parent_id TEXT REFERENCES attributes(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL DEFAULT 0,
    path TEXT NOT NULL DEFAULT '',
    lft INTEGER NOT NULL DEFAULT 0,
    rgt INTEGER NOT NULL DEFAULT 0,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Organisations: contactable entities, hierarchical
CREATE TABLE IF NOT EXISTS organisations (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    code TEXT,
    email TEXT,
    phone TEXT,
    address TEXT,
    website TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    metadata TEXT NOT NULL DEFAULT '{}',    -- JSON object

    parent_id TEXT REFERENCES organisations(id) ON DELETE CASCADE,
    depth INTEGER NOT NULL DEFAULT 0,
    path TEXT NOT NULL DEFAULT '',
    lft INTEGER NOT NULL DEFAULT 0,
    rgt INTEGER NOT NULL DEFAULT 0,

    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Many-to-many: applications <-> attributes (unordered, no duplicate pairs)
CREATE TABLE IF NOT EXISTS application_attributes (
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    attribute_id TEXT NOT NULL REFERENCES attributes(id) ON DELETE CASCADE,
    PRIMARY KEY (application_id, attribute_id)
);

-- Many-to-many: applications <-> organisations (unordered, no duplicate pairs)
CREATE TABLE IF NOT EXISTS application_organisations (
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    organisation_id TEXT NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
    PRIMARY KEY (application_id, organisation_id)
);

-- Admin API tokens
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of ID for fast lookup
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_applications_parent ON applications(parent_id);
CREATE INDEX IF NOT EXISTS idx_applications_path ON applications(path);
CREATE INDEX IF NOT EXISTS idx_attributes_parent ON attributes(parent_id);
CREATE INDEX IF NOT EXISTS idx_attributes_path ON attributes(path);
CREATE INDEX IF NOT EXISTS idx_attributes_active ON attributes(is_active);
CREATE INDEX IF NOT EXISTS idx_organisations_parent ON organisations(parent_id);
CREATE INDEX IF NOT EXISTS idx_organisations_path ON organisations(path);
CREATE INDEX IF NOT EXISTS idx_organisations_active ON organisations(is_active);
CREATE INDEX IF NOT EXISTS idx_organisations_code ON organisations(code);
CREATE INDEX IF NOT EXISTS idx_app_attributes_attribute ON application_attributes(attribute_id);
CREATE INDEX IF NOT EXISTS idx_app_organisations_organisation ON application_organisations(organisation_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
"#;
