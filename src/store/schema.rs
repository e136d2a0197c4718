pub const SCHEMA: &str = r#"
-- Institutions (instansi) own every other piece of master data
CREATE TABLE IF NOT EXISTS instansi (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    address TEXT,
    phone TEXT,
    email TEXT,
    website TEXT,
    head_name TEXT,
    head_nip TEXT,
    status TEXT NOT NULL DEFAULT 'aktif',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sasaran_strategis (
    id TEXT PRIMARY KEY,
    instansi_id TEXT NOT NULL REFERENCES instansi(id) ON DELETE RESTRICT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'aktif',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS programs (
    id TEXT PRIMARY KEY,
    instansi_id TEXT NOT NULL REFERENCES instansi(id) ON DELETE RESTRICT,
    sasaran_strategis_id TEXT REFERENCES sasaran_strategis(id) ON DELETE RESTRICT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    budget REAL,
    fiscal_year INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    responsible_person TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS kegiatan (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES programs(id) ON DELETE RESTRICT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    budget REAL,
    realized_budget REAL,
    start_date TEXT,
    end_date TEXT,
    responsible_person TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS performance_indicators (
    id TEXT PRIMARY KEY,
    instansi_id TEXT NOT NULL REFERENCES instansi(id) ON DELETE RESTRICT,
    sasaran_strategis_id TEXT REFERENCES sasaran_strategis(id) ON DELETE RESTRICT,
    program_id TEXT REFERENCES programs(id) ON DELETE RESTRICT,
    kegiatan_id TEXT REFERENCES kegiatan(id) ON DELETE RESTRICT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL,
    measurement_unit TEXT NOT NULL,
    measurement_type TEXT NOT NULL,
    frequency TEXT NOT NULL,
    data_source TEXT,
    collection_method TEXT NOT NULL,
    formula TEXT,
    weight REAL NOT NULL DEFAULT 0,
    is_mandatory INTEGER NOT NULL DEFAULT 0,
    created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Yearly targets; an indicator always keeps at least one
CREATE TABLE IF NOT EXISTS indicator_targets (
    id TEXT PRIMARY KEY,
    indicator_id TEXT NOT NULL REFERENCES performance_indicators(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    target_value REAL NOT NULL,
    minimum_value REAL,
    justification TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(indicator_id, year)
);

CREATE TABLE IF NOT EXISTS performance_data (
    id TEXT PRIMARY KEY,
    indicator_id TEXT NOT NULL REFERENCES performance_indicators(id) ON DELETE RESTRICT,
    instansi_id TEXT NOT NULL REFERENCES instansi(id) ON DELETE RESTRICT,
    year INTEGER NOT NULL,
    period TEXT NOT NULL,
    actual_value REAL NOT NULL,
    target_value REAL,
    achievement REAL,
    data_source TEXT,
    collection_method TEXT,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    submitted_at TEXT,
    validated_by TEXT,
    validated_at TEXT,
    validation_notes TEXT,
    created_by TEXT NOT NULL,
    updated_by TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    UNIQUE(indicator_id, year, period)
);

CREATE TABLE IF NOT EXISTS evidence_documents (
    id TEXT PRIMARY KEY,
    performance_data_id TEXT NOT NULL REFERENCES performance_data(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    stored_path TEXT NOT NULL,
    content_type TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    description TEXT,
    uploaded_by TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS assessments (
    id TEXT PRIMARY KEY,
    indicator_id TEXT NOT NULL REFERENCES performance_indicators(id) ON DELETE CASCADE,
    performance_data_id TEXT REFERENCES performance_data(id) ON DELETE SET NULL,
    period TEXT NOT NULL,
    criteria TEXT NOT NULL DEFAULT '[]',  -- JSON array of {name, weight, score}
    overall_score REAL NOT NULL,
    achievement_level TEXT NOT NULL,
    comments TEXT,
    recommendations TEXT,
    status TEXT NOT NULL DEFAULT 'draft',
    assessed_by TEXT NOT NULL,
    reviewed_by TEXT,
    reviewed_at TEXT,
    review_notes TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    instansi_id TEXT NOT NULL REFERENCES instansi(id) ON DELETE RESTRICT,
    title TEXT NOT NULL,
    report_type TEXT NOT NULL,
    category TEXT,
    year INTEGER NOT NULL,
    period TEXT NOT NULL,
    format TEXT NOT NULL,
    options TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL DEFAULT 'draft',
    created_by TEXT NOT NULL,
    reviewed_by TEXT,
    reviewed_at TEXT,
    review_notes TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Indicators selected for a report (many-to-many)
CREATE TABLE IF NOT EXISTS report_indicators (
    report_id TEXT NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
    indicator_id TEXT NOT NULL REFERENCES performance_indicators(id) ON DELETE CASCADE,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (report_id, indicator_id)
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,    -- argon2id hash with embedded salt
    instansi_id TEXT REFERENCES instansi(id) ON DELETE RESTRICT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_login_at TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Roles carry a permission bitmask; a user's permissions are the union over roles
CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    permissions INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

-- Bearer tokens are credentials for a user
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    token_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,     -- first 8 chars of a UUID for fast lookup
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                -- NULL = never
    last_used_at TEXT
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    instansi_id TEXT,
    action TEXT NOT NULL,
    module TEXT NOT NULL,
    description TEXT NOT NULL,
    old_values TEXT,                -- JSON
    new_values TEXT,                -- JSON
    ip_address TEXT,
    user_agent TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'string',
    description TEXT,
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Parsed CSV uploads awaiting confirmation
CREATE TABLE IF NOT EXISTS import_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    rows TEXT NOT NULL,             -- JSON
    errors TEXT NOT NULL,           -- JSON
    created_at TEXT DEFAULT (datetime('now'))
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_sasaran_instansi ON sasaran_strategis(instansi_id);
CREATE INDEX IF NOT EXISTS idx_programs_instansi ON programs(instansi_id);
CREATE INDEX IF NOT EXISTS idx_programs_sasaran ON programs(sasaran_strategis_id);
CREATE INDEX IF NOT EXISTS idx_kegiatan_program ON kegiatan(program_id);
CREATE INDEX IF NOT EXISTS idx_indicators_instansi ON performance_indicators(instansi_id);
CREATE INDEX IF NOT EXISTS idx_performance_data_instansi ON performance_data(instansi_id);
CREATE INDEX IF NOT EXISTS idx_performance_data_status ON performance_data(status);
CREATE INDEX IF NOT EXISTS idx_evidence_data ON evidence_documents(performance_data_id);
CREATE INDEX IF NOT EXISTS idx_assessments_indicator ON assessments(indicator_id);
CREATE INDEX IF NOT EXISTS idx_reports_instansi ON reports(instansi_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id);
CREATE INDEX IF NOT EXISTS idx_audit_logs_module ON audit_logs(module);
"#;
