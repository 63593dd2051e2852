//! [`Processor`] — runs rule passes against cookies held in a jar.
//!
//! Passes over different cookies may run concurrently, up to a fixed number
//! of scheduled passes at a time. Passes over the same cookie are serialised
//! by a per-identifier async lock, so a rule whose action must happen once
//! per cookie cannot fire twice on a race.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use chrono::Utc;
use cookie_core::{Cookie, Enrichment, store::CookieJar};
use tokio::{sync::Semaphore, task::JoinHandle};

use crate::{
  Error, Result,
  engine::{PassState, RuleEngine},
  loader::EnrichmentLoader,
};

/// What a completed pass decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// A rule's action stopped evaluation.
  Halted { rule_id: String },
  /// No rule stopped evaluation; a loader added an enrichment.
  Enriched { loader: String },
  /// No rule stopped evaluation and no loader could help.
  Unmatched,
}

/// Scheduled passes allowed to run at once unless configured otherwise.
pub const DEFAULT_MAX_PASSES: usize = 5;

type CookieLock = Arc<tokio::sync::Mutex<()>>;
type LockTable = Mutex<HashMap<String, CookieLock>>;

pub struct Processor<J> {
  jar:     Arc<J>,
  engine:  Arc<RuleEngine>,
  loaders: Vec<Box<dyn EnrichmentLoader>>,
  locks:   LockTable,
  passes:  Arc<Semaphore>,
}

impl<J> Processor<J>
where
  J: CookieJar + 'static,
{
  pub fn new(jar: Arc<J>, engine: Arc<RuleEngine>) -> Self {
    Self {
      jar,
      engine,
      loaders: Vec::new(),
      locks: Mutex::default(),
      passes: Arc::new(Semaphore::new(DEFAULT_MAX_PASSES)),
    }
  }

  /// Bound the number of scheduled passes running at once (at least one).
  pub fn with_max_passes(mut self, max_passes: usize) -> Self {
    self.passes = Arc::new(Semaphore::new(max_passes.max(1)));
    self
  }

  /// Attach enrichment loaders, ordered by ascending priority.
  pub fn with_loaders(mut self, mut loaders: Vec<Box<dyn EnrichmentLoader>>) -> Self {
    loaders.sort_by_key(|l| l.priority());
    self.loaders = loaders;
    self
  }

  /// Run one pass over the cookie with `identifier`.
  ///
  /// Waits for any pass already running over the same cookie to finish.
  pub async fn process(&self, identifier: &str) -> Result<Outcome> {
    let lease = self.lease(identifier)?;
    let _guard = lease.lock.lock().await;
    self.process_exclusively(identifier).await
  }

  /// Spawn a pass on the current runtime, logging its outcome.
  ///
  /// The pass waits for one of the processor's pass slots before it starts.
  /// Failures (including a panicking rule) are reported here and never
  /// propagate to passes over other cookies.
  pub fn schedule(self: &Arc<Self>, identifier: String) -> JoinHandle<()> {
    let processor = Arc::clone(self);
    let passes = Arc::clone(&self.passes);
    tokio::spawn(async move {
      // The semaphore is never closed.
      let Ok(_slot) = passes.acquire_owned().await else {
        return;
      };
      let id = identifier.clone();
      let pass = tokio::spawn(async move { processor.process(&identifier).await });
      match pass.await {
        Ok(Ok(outcome)) => {
          tracing::debug!(identifier = %id, ?outcome, "processing pass complete");
        }
        Ok(Err(e)) => {
          tracing::error!(identifier = %id, error = %e, "processing pass failed");
        }
        Err(e) => {
          tracing::error!(identifier = %id, error = %e, "processing pass aborted");
        }
      }
    })
  }

  async fn process_exclusively(&self, identifier: &str) -> Result<Outcome> {
    let history = self
      .jar
      .get_history(identifier)
      .await
      .map_err(|e| Error::Jar(Box::new(e)))?;
    let cookie = Cookie::with_history(identifier, history);

    let evaluation = self.engine.evaluate(&cookie);

    for application in evaluation.applied {
      let rule_id = application.rule_id.clone();
      self
        .jar
        .append_enrichment_quietly(identifier, Enrichment::rule_application(Utc::now(), application))
        .await
        .map_err(|e| Error::Jar(Box::new(e)))?;
      tracing::info!(identifier, rule_id = %rule_id, "rule applied");
    }

    match evaluation.state {
      PassState::Halted { rule_id } => Ok(Outcome::Halted { rule_id }),
      PassState::Failed { rule_id, error } => Err(Error::Rule {
        identifier: identifier.to_owned(),
        rule_id,
        source: error,
      }),
      PassState::Exhausted => self.enrich(&cookie).await,
    }
  }

  async fn enrich(&self, cookie: &Cookie) -> Result<Outcome> {
    let Some(loader) = self.loaders.iter().find(|l| l.can_enrich(cookie)) else {
      tracing::info!(identifier = %cookie.identifier, "no rules matched and no loader applies");
      return Ok(Outcome::Unmatched);
    };

    let enrichment = loader.load(cookie).await.map_err(|source| Error::Loader {
      identifier: cookie.identifier.clone(),
      loader: loader.name().to_owned(),
      source,
    })?;
    tracing::info!(
      identifier = %cookie.identifier,
      loader = loader.name(),
      kind = %enrichment.source,
      "enriched by loader"
    );
    self
      .jar
      .append_enrichment(&cookie.identifier, enrichment)
      .await
      .map_err(|e| Error::Jar(Box::new(e)))?;

    Ok(Outcome::Enriched { loader: loader.name().to_owned() })
  }

  fn lease(&self, identifier: &str) -> Result<Lease<'_>> {
    let mut locks = self.locks.lock().map_err(|_| Error::Poisoned)?;
    let lock = locks.entry(identifier.to_owned()).or_default().clone();
    Ok(Lease { table: &self.locks, identifier: identifier.to_owned(), lock })
  }
}

/// A pass's hold on a cookie's lock-table entry. The entry is dropped with
/// the last lease, even when the pass unwinds.
struct Lease<'a> {
  table:      &'a LockTable,
  identifier: String,
  lock:       CookieLock,
}

impl Drop for Lease<'_> {
  fn drop(&mut self) {
    let Ok(mut locks) = self.table.lock() else {
      return;
    };
    // The table's copy plus ours.
    if Arc::strong_count(&self.lock) == 2 {
      locks.remove(&self.identifier);
    }
  }
}
