//! SQL schema for the object metadata table.

/// Idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS files (
    key   TEXT PRIMARY KEY,
    type  TEXT NOT NULL DEFAULT '',
    size  INTEGER NOT NULL CHECK (size >= 0)
);

PRAGMA user_version = 1;
";
