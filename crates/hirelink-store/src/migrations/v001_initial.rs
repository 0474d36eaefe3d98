//! v001 -- Initial schema creation.
//!
//! Creates the three core tables: `users`, `jobs`, and `messages`.
//! Conversations are never materialized; they are computed from `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (reference data; identity issuance lives elsewhere)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name       TEXT NOT NULL,
    email      TEXT NOT NULL UNIQUE,
    role       TEXT NOT NULL,               -- freelancer | employer | admin
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Jobs (reference data; job CRUD lives elsewhere)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS jobs (
    id          TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    title       TEXT NOT NULL,
    employer_id TEXT NOT NULL,              -- FK -> users(id)
    created_at  TEXT NOT NULL,

    FOREIGN KEY (employer_id) REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    sender     TEXT NOT NULL,               -- FK -> users(id)
    receiver   TEXT NOT NULL,               -- FK -> users(id)
    job        TEXT,                        -- job scope; deliberately no FK,
                                            -- a deleted job must not take the
                                            -- conversation down with it
    content    TEXT NOT NULL,
    read       INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    is_system  INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    created_at TEXT NOT NULL,               -- ISO-8601

    FOREIGN KEY (sender) REFERENCES users(id),
    FOREIGN KEY (receiver) REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender, receiver, created_at);

CREATE INDEX IF NOT EXISTS idx_messages_job
    ON messages(job, created_at);

CREATE INDEX IF NOT EXISTS idx_messages_unread
    ON messages(receiver, read);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
