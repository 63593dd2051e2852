//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that text ordering matches time ordering.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result, store::Retrieval};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `retrievals` row.
pub struct RawRetrieval {
  pub retrieval_id: String,
  pub checkpoint:   String,
  pub recorded_at:  String,
}

impl RawRetrieval {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      retrieval_id: row.get(0)?,
      checkpoint:   row.get(1)?,
      recorded_at:  row.get(2)?,
    })
  }

  pub fn into_retrieval(self) -> Result<Retrieval> {
    Ok(Retrieval {
      retrieval_id: decode_uuid(&self.retrieval_id)?,
      checkpoint:   decode_dt(&self.checkpoint)?,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
