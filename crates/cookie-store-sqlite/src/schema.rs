//! SQL schema for the retrieval log.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per checkpoint advance. Strictly append-only.
CREATE TABLE IF NOT EXISTS retrievals (
    retrieval_id TEXT PRIMARY KEY,
    checkpoint   TEXT NOT NULL,   -- newest change applied; fixed-width RFC 3339 UTC
    recorded_at  TEXT NOT NULL    -- when the advance was written
);

CREATE INDEX IF NOT EXISTS retrievals_checkpoint_idx ON retrievals(checkpoint);

PRAGMA user_version = 1;
";
