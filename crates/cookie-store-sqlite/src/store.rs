//! [`SqliteRetrievalLog`] — the SQLite implementation of [`CheckpointStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use cookie_core::store::CheckpointStore;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawRetrieval, decode_dt, encode_dt, encode_uuid},
  schema::SCHEMA,
};

/// One recorded checkpoint advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval {
  pub retrieval_id: Uuid,
  /// Newest upstream change applied by the retrieval.
  pub checkpoint:   DateTime<Utc>,
  pub recorded_at:  DateTime<Utc>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Durable ingestion checkpoint, kept as a log of every advance.
///
/// The current checkpoint is the newest one ever logged, so a write that
/// arrives late can never move it backwards. Cloning is cheap; the inner
/// connection is reference-counted.
#[derive(Clone)]
pub struct SqliteRetrievalLog {
  conn: tokio_rusqlite::Connection,
}

impl SqliteRetrievalLog {
  /// Open (or create) a log at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let log = Self { conn };
    log.init_schema().await?;
    Ok(log)
  }

  /// Open an in-memory log, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let log = Self { conn };
    log.init_schema().await?;
    Ok(log)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every logged retrieval, oldest checkpoint first.
  pub async fn retrievals(&self) -> Result<Vec<Retrieval>> {
    let raws: Vec<RawRetrieval> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT retrieval_id, checkpoint, recorded_at FROM retrievals
           ORDER BY checkpoint, recorded_at",
        )?;
        let rows = stmt
          .query_map([], RawRetrieval::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRetrieval::into_retrieval).collect()
  }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

impl CheckpointStore for SqliteRetrievalLog {
  type Error = crate::Error;

  async fn read_checkpoint(&self) -> Result<Option<DateTime<Utc>>> {
    let latest: Option<String> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT checkpoint FROM retrievals ORDER BY checkpoint DESC LIMIT 1",
              [],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    latest.as_deref().map(decode_dt).transpose()
  }

  async fn write_checkpoint(&self, checkpoint: DateTime<Utc>) -> Result<()> {
    let id_str         = encode_uuid(Uuid::new_v4());
    let checkpoint_str = encode_dt(checkpoint);
    let recorded_str   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO retrievals (retrieval_id, checkpoint, recorded_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, checkpoint_str, recorded_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(%checkpoint, "retrieval logged");
    Ok(())
  }
}
