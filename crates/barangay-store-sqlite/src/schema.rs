//! SQL schema for the SQLite key-value store.
//!
//! Each value kind has its own table. A key lives in at most one of them; the
//! store enforces that on every write.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS kv_strings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per hash field. A hash with no rows does not exist.
CREATE TABLE IF NOT EXISTS kv_hashes (
    key   TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (key, field)
);

-- One row per set member. A set with no rows does not exist.
CREATE TABLE IF NOT EXISTS kv_sets (
    key    TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (key, member)
);

PRAGMA user_version = 1;
";
