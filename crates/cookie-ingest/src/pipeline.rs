//! [`Pipeline`] — the poll → apply → checkpoint cycle and its driving loop.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use cookie_core::{
  Change,
  store::{CheckpointStore, CookieJar, MetricsSink, UpstreamSource},
};
use tokio::{
  sync::{Mutex, Semaphore, watch},
  time::{Instant, MissedTickBehavior},
};

use crate::{
  Error, Result,
  backlog::{Backlog, Submission},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Time between the starts of consecutive cycles.
  pub period:         Duration,
  /// Where to start when no checkpoint has been persisted yet.
  pub since:          DateTime<Utc>,
  /// Upper bound on concurrently applied work units.
  pub max_workers:    usize,
  /// Limit on a single enrichment append.
  pub apply_timeout:  Duration,
  /// Limit on waiting for a free worker before a unit is given up.
  pub submit_timeout: Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      period:         Duration::from_secs(30),
      since:          DateTime::<Utc>::UNIX_EPOCH,
      max_workers:    5,
      apply_timeout:  Duration::from_secs(60),
      submit_timeout: Duration::from_secs(300),
    }
  }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
  /// No worker became free within the submit timeout.
  Saturated,
  /// The append did not finish within the apply timeout.
  TimedOut,
  /// The jar rejected the append.
  Jar(String),
  /// The worker applying the unit panicked.
  Panicked,
}

impl fmt::Display for FailureReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Saturated => f.write_str("worker pool saturated"),
      Self::TimedOut => f.write_str("apply timed out"),
      Self::Jar(e) => write!(f, "cookie jar error: {e}"),
      Self::Panicked => f.write_str("worker panicked"),
    }
  }
}

/// A change that was not applied during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
  pub target:    String,
  pub timestamp: DateTime<Utc>,
  pub reason:    FailureReason,
}

impl ApplyFailure {
  fn new(change: &Change, reason: FailureReason) -> Self {
    Self { target: change.target.clone(), timestamp: change.timestamp, reason }
  }
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
  /// Position the upstream was polled from.
  pub since:      DateTime<Utc>,
  pub polled:     usize,
  pub applied:    usize,
  pub failures:   Vec<ApplyFailure>,
  /// The checkpoint written by this cycle, if it advanced.
  pub checkpoint: Option<DateTime<Utc>>,
}

impl CycleReport {
  fn new(since: DateTime<Utc>, polled: usize) -> Self {
    Self { since, polled, applied: 0, failures: Vec::new(), checkpoint: None }
  }

  /// Whether every polled change was applied.
  pub fn is_complete(&self) -> bool { self.failures.is_empty() }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Moves upstream changes into the cookie jar.
///
/// Delivery is at-least-once: the checkpoint only advances past a batch
/// once every change in it has been applied, so a crash or partial failure
/// replays the batch on the next cycle. Replays are harmless because
/// resolution over a history tolerates repeated enrichments.
pub struct Pipeline<U, J, C> {
  config:      PipelineConfig,
  upstream:    Arc<U>,
  jar:         Arc<J>,
  checkpoints: Arc<C>,
  metrics:     Arc<dyn MetricsSink>,
  workers:     Arc<Semaphore>,
  backlog:     Backlog,
  /// Last checkpoint this pipeline wrote or read. Held for the whole cycle,
  /// which also keeps cycles from overlapping.
  position:    Mutex<Option<DateTime<Utc>>>,
}

impl<U, J, C> Pipeline<U, J, C>
where
  U: UpstreamSource,
  J: CookieJar + 'static,
  C: CheckpointStore,
{
  pub fn new(
    config: PipelineConfig,
    upstream: Arc<U>,
    jar: Arc<J>,
    checkpoints: Arc<C>,
    metrics: Arc<dyn MetricsSink>,
  ) -> Self {
    let workers = Arc::new(Semaphore::new(config.max_workers.max(1)));
    Self {
      config,
      upstream,
      jar,
      checkpoints,
      metrics,
      workers,
      backlog: Backlog::new(),
      position: Mutex::new(None),
    }
  }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  pub fn backlog(&self) -> &Backlog { &self.backlog }

  /// Run cycles every `period` until `shutdown` flips to `true` or its
  /// sender is dropped. A cycle in progress is always allowed to finish.
  pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(self.config.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(period = ?self.config.period, workers = self.config.max_workers, "ingestion started");
    loop {
      tokio::select! {
        _ = ticker.tick() => {}
        changed = shutdown.changed() => {
          if changed.is_err() || *shutdown.borrow() {
            break;
          }
          continue;
        }
      }

      match self.run_cycle().await {
        Ok(report) if !report.is_complete() => {
          tracing::warn!(
            failures = report.failures.len(),
            applied = report.applied,
            "cycle incomplete; batch will be replayed"
          );
        }
        Ok(_) => {}
        Err(e @ Error::Upstream(_)) => tracing::warn!(error = %e, "cycle skipped"),
        Err(e) => tracing::error!(error = %e, "cycle failed"),
      }

      if *shutdown.borrow() {
        break;
      }
    }
    tracing::info!("ingestion stopped");
  }

  /// Poll once, apply the batch and advance the checkpoint if possible.
  pub async fn run_cycle(&self) -> Result<CycleReport> {
    let started = Instant::now();
    let mut position = self.position.lock().await;

    let since = match *position {
      Some(at) => at,
      None => self
        .checkpoints
        .read_checkpoint()
        .await
        .map_err(|e| Error::Checkpoint(Box::new(e)))?
        .unwrap_or(self.config.since),
    };

    let changes = self
      .upstream
      .changes_since(since)
      .await
      .map_err(|e| Error::Upstream(Box::new(e)))?;
    self.metrics.record("ingest.batch_size", changes.len() as f64);

    let mut report = CycleReport::new(since, changes.len());
    let Some(newest) = changes.iter().map(|c| c.timestamp).max() else {
      tracing::debug!(%since, "no upstream changes");
      self.record_cycle(started);
      return Ok(report);
    };

    tracing::info!(%since, changes = changes.len(), "applying upstream changes");
    self.apply_batch(changes, &mut report).await;
    self.metrics.record("ingest.apply_failures", report.failures.len() as f64);

    if !report.is_complete() {
      tracing::warn!(%since, failures = report.failures.len(), "checkpoint held back");
    } else if newest > since {
      self
        .checkpoints
        .write_checkpoint(newest)
        .await
        .map_err(|e| Error::Checkpoint(Box::new(e)))?;
      *position = Some(newest);
      report.checkpoint = Some(newest);
      tracing::info!(checkpoint = %newest, applied = report.applied, "checkpoint advanced");
    }

    self.record_cycle(started);
    Ok(report)
  }

  async fn apply_batch(&self, changes: Vec<Change>, report: &mut CycleReport) {
    let mut running = Vec::new();
    // The whole batch is pending until each change is applied or given up.
    let mut batch = self.backlog.submit(changes.len());

    for group in group_by_target(changes) {
      let submission = batch.split(group.len());
      let permit = tokio::time::timeout(
        self.config.submit_timeout,
        self.workers.clone().acquire_owned(),
      )
      .await;
      let Ok(Ok(permit)) = permit else {
        tracing::warn!(identifier = %group[0].target, changes = group.len(), "no worker available");
        drop(submission);
        self.metrics.record("ingest.in_flight", self.backlog.in_flight() as f64);
        report
          .failures
          .extend(group.iter().map(|c| ApplyFailure::new(c, FailureReason::Saturated)));
        continue;
      };

      let worker = Worker {
        jar:           self.jar.clone(),
        metrics:       self.metrics.clone(),
        apply_timeout: self.config.apply_timeout,
      };
      let stamps: Vec<_> = group.iter().map(|c| (c.target.clone(), c.timestamp)).collect();
      let handle = tokio::spawn(async move {
        let _permit = permit;
        worker.apply_group(group, submission).await
      });
      running.push((stamps, handle));
    }

    for (stamps, handle) in running {
      match handle.await {
        Ok(outcome) => {
          report.applied += outcome.applied;
          report.failures.extend(outcome.failures);
        }
        Err(e) => {
          tracing::error!(identifier = %stamps[0].0, error = %e, "worker aborted");
          report.failures.extend(stamps.into_iter().map(|(target, timestamp)| {
            ApplyFailure { target, timestamp, reason: FailureReason::Panicked }
          }));
        }
      }
    }
  }

  fn record_cycle(&self, started: Instant) {
    self
      .metrics
      .record("ingest.cycle_duration_ms", started.elapsed().as_secs_f64() * 1000.0);
  }
}

/// Split a batch into per-target groups, keeping upstream order both
/// between groups (by first appearance) and within each group.
fn group_by_target(changes: Vec<Change>) -> Vec<Vec<Change>> {
  let mut index: HashMap<String, usize> = HashMap::new();
  let mut groups: Vec<Vec<Change>> = Vec::new();
  for change in changes {
    match index.get(&change.target) {
      Some(&i) => groups[i].push(change),
      None => {
        index.insert(change.target.clone(), groups.len());
        groups.push(vec![change]);
      }
    }
  }
  groups
}

// ─── Worker ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct GroupOutcome {
  applied:  usize,
  failures: Vec<ApplyFailure>,
}

struct Worker<J> {
  jar:           Arc<J>,
  metrics:       Arc<dyn MetricsSink>,
  apply_timeout: Duration,
}

impl<J: CookieJar> Worker<J> {
  /// Apply one target's changes in order. A failed change does not stop
  /// the ones after it.
  async fn apply_group(self, group: Vec<Change>, mut submission: Submission) -> GroupOutcome {
    let mut outcome = GroupOutcome::default();

    for change in group {
      let started = Instant::now();
      let result = tokio::time::timeout(
        self.apply_timeout,
        self.jar.append_enrichment(&change.target, change.to_enrichment()),
      )
      .await;
      self
        .metrics
        .record("ingest.apply_duration_ms", started.elapsed().as_secs_f64() * 1000.0);
      let in_flight = submission.complete_one();
      self.metrics.record("ingest.in_flight", in_flight as f64);

      let reason = match result {
        Ok(Ok(())) => {
          outcome.applied += 1;
          continue;
        }
        Ok(Err(e)) => FailureReason::Jar(e.to_string()),
        Err(_) => FailureReason::TimedOut,
      };
      tracing::error!(
        identifier = %change.target,
        kind = "upstream_update",
        timestamp = %change.timestamp,
        %reason,
        "failed to apply change"
      );
      outcome.failures.push(ApplyFailure::new(&change, reason));
    }

    outcome
  }
}
