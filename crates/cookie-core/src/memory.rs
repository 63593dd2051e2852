//! In-process implementations of the storage traits.
//!
//! Nothing here survives a restart. They back embedded deployments and the
//! test suites of the crates built on top of `cookie-core`.

use std::{
  collections::HashMap,
  sync::{Mutex, RwLock},
};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  cookie::Cookie,
  enrichment::Enrichment,
  store::{CheckpointStore, CookieJar, Listener},
};

// ─── Cookie jar ──────────────────────────────────────────────────────────────

/// A [`CookieJar`] held entirely in memory.
#[derive(Default)]
pub struct MemoryCookieJar {
  cookies:   Mutex<HashMap<String, Vec<Enrichment>>>,
  listeners: RwLock<Vec<Listener>>,
}

impl MemoryCookieJar {
  pub fn new() -> Self { Self::default() }

  /// Identifiers of every cookie seen so far, sorted.
  pub fn identifiers(&self) -> Result<Vec<String>> {
    let cookies = self.cookies.lock().map_err(|_| Error::Poisoned("cookie jar"))?;
    let mut ids: Vec<String> = cookies.keys().cloned().collect();
    ids.sort();
    Ok(ids)
  }

  /// Snapshot of a single cookie, if it exists.
  pub fn cookie(&self, identifier: &str) -> Result<Option<Cookie>> {
    let cookies = self.cookies.lock().map_err(|_| Error::Poisoned("cookie jar"))?;
    Ok(
      cookies
        .get(identifier)
        .map(|history| Cookie::with_history(identifier, history.clone())),
    )
  }

  fn push(&self, identifier: &str, enrichment: Enrichment) -> Result<()> {
    let mut cookies = self.cookies.lock().map_err(|_| Error::Poisoned("cookie jar"))?;
    cookies.entry(identifier.to_owned()).or_default().push(enrichment);
    Ok(())
  }

  fn notify(&self, identifier: &str) -> Result<()> {
    let listeners = self.listeners.read().map_err(|_| Error::Poisoned("listener"))?;
    for listener in listeners.iter() {
      listener(identifier);
    }
    Ok(())
  }
}

impl CookieJar for MemoryCookieJar {
  type Error = Error;

  async fn append_enrichment(&self, identifier: &str, enrichment: Enrichment) -> Result<()> {
    self.push(identifier, enrichment)?;
    self.notify(identifier)
  }

  async fn append_enrichment_quietly(
    &self,
    identifier: &str,
    enrichment: Enrichment,
  ) -> Result<()> {
    self.push(identifier, enrichment)
  }

  async fn get_history(&self, identifier: &str) -> Result<Vec<Enrichment>> {
    let cookies = self.cookies.lock().map_err(|_| Error::Poisoned("cookie jar"))?;
    Ok(cookies.get(identifier).cloned().unwrap_or_default())
  }

  fn add_listener(&self, listener: Listener) {
    match self.listeners.write() {
      Ok(mut listeners) => listeners.push(listener),
      Err(_) => tracing::error!("listener lock poisoned; listener dropped"),
    }
  }
}

// ─── Checkpoint ──────────────────────────────────────────────────────────────

/// A [`CheckpointStore`] that keeps the checkpoint in memory.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
  checkpoint: Mutex<Option<DateTime<Utc>>>,
  writes:     Mutex<Vec<DateTime<Utc>>>,
}

impl MemoryCheckpointStore {
  pub fn new() -> Self { Self::default() }

  pub fn starting_at(checkpoint: DateTime<Utc>) -> Self {
    Self { checkpoint: Mutex::new(Some(checkpoint)), writes: Mutex::default() }
  }

  /// Every checkpoint ever written, oldest first.
  pub fn history(&self) -> Result<Vec<DateTime<Utc>>> {
    Ok(self.writes.lock().map_err(|_| Error::Poisoned("checkpoint"))?.clone())
  }
}

impl CheckpointStore for MemoryCheckpointStore {
  type Error = Error;

  async fn read_checkpoint(&self) -> Result<Option<DateTime<Utc>>> {
    Ok(*self.checkpoint.lock().map_err(|_| Error::Poisoned("checkpoint"))?)
  }

  async fn write_checkpoint(&self, checkpoint: DateTime<Utc>) -> Result<()> {
    *self.checkpoint.lock().map_err(|_| Error::Poisoned("checkpoint"))? = Some(checkpoint);
    self.writes.lock().map_err(|_| Error::Poisoned("checkpoint"))?.push(checkpoint);
    Ok(())
  }
}
