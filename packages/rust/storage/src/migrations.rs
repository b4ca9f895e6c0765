//! SQL migration definitions for the regsync database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sync_state, manuals, chapters, documents, versions, links",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Per-corpus sync state, one row per (cfr_title, cfr_part)
CREATE TABLE IF NOT EXISTS sync_state (
    id                TEXT PRIMARY KEY,
    cfr_title         INTEGER NOT NULL,
    cfr_part          INTEGER NOT NULL,
    sync_status       TEXT NOT NULL DEFAULT 'NEVER',
    last_synced_at    TEXT,
    last_amended_date TEXT,
    last_content_hash TEXT,
    manual_id         TEXT,
    section_count     INTEGER NOT NULL DEFAULT 0,
    last_error        TEXT,
    UNIQUE(cfr_title, cfr_part)
);

-- Aggregate manuals, one per corpus
CREATE TABLE IF NOT EXISTS manuals (
    id              TEXT PRIMARY KEY,
    code            TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL,
    description     TEXT,
    category        TEXT,
    current_version INTEGER NOT NULL DEFAULT 1,
    created_by      TEXT,
    created_at      TEXT NOT NULL
);

-- Append-only manual change log
CREATE TABLE IF NOT EXISTS manual_versions (
    id             TEXT PRIMARY KEY,
    manual_id      TEXT NOT NULL REFERENCES manuals(id) ON DELETE CASCADE,
    version        INTEGER NOT NULL,
    change_type    TEXT NOT NULL,
    change_notes   TEXT,
    structure_json TEXT,
    created_by     TEXT,
    created_at     TEXT NOT NULL,
    UNIQUE(manual_id, version)
);

CREATE INDEX IF NOT EXISTS idx_manual_versions_manual ON manual_versions(manual_id);

-- Chapters within a manual, keyed by subpart letter
CREATE TABLE IF NOT EXISTS chapters (
    id             TEXT PRIMARY KEY,
    manual_id      TEXT NOT NULL REFERENCES manuals(id) ON DELETE CASCADE,
    subpart_letter TEXT NOT NULL,
    title          TEXT NOT NULL,
    sort_order     INTEGER NOT NULL DEFAULT 0,
    UNIQUE(manual_id, subpart_letter)
);

CREATE INDEX IF NOT EXISTS idx_chapters_manual ON chapters(manual_id);

-- Versioned documents with a stable business code
CREATE TABLE IF NOT EXISTS documents (
    id                 TEXT PRIMARY KEY,
    code               TEXT NOT NULL UNIQUE,
    title              TEXT NOT NULL,
    category           TEXT,
    subcategory        TEXT,
    current_version_id TEXT,
    created_by         TEXT,
    created_at         TEXT NOT NULL
);

-- Immutable document content versions
CREATE TABLE IF NOT EXISTS document_versions (
    id           TEXT PRIMARY KEY,
    document_id  TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    version_no   INTEGER NOT NULL,
    content      TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    notes        TEXT,
    created_by   TEXT,
    created_at   TEXT NOT NULL,
    UNIQUE(document_id, version_no)
);

CREATE INDEX IF NOT EXISTS idx_document_versions_document ON document_versions(document_id);

-- Document membership within a manual chapter
CREATE TABLE IF NOT EXISTS document_links (
    id               TEXT PRIMARY KEY,
    manual_id        TEXT NOT NULL REFERENCES manuals(id) ON DELETE CASCADE,
    chapter_id       TEXT NOT NULL REFERENCES chapters(id) ON DELETE CASCADE,
    document_id      TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    sort_order       INTEGER NOT NULL DEFAULT 0,
    title_override   TEXT,
    added_in_version INTEGER NOT NULL,
    UNIQUE(manual_id, document_id)
);

CREATE INDEX IF NOT EXISTS idx_document_links_manual ON document_links(manual_id);
CREATE INDEX IF NOT EXISTS idx_document_links_chapter ON document_links(chapter_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
