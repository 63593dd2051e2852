//! In-flight work gauge.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

/// Count of changes submitted to the worker pool and not yet finished.
#[derive(Debug, Clone, Default)]
pub struct Backlog(Arc<AtomicUsize>);

impl Backlog {
  pub fn new() -> Self { Self::default() }

  pub fn in_flight(&self) -> usize { self.0.load(Ordering::SeqCst) }

  /// Account for `changes` newly submitted changes.
  pub fn submit(&self, changes: usize) -> Submission {
    self.0.fetch_add(changes, Ordering::SeqCst);
    Submission { backlog: self.clone(), remaining: changes }
  }
}

/// One submitted unit of work. Whatever has not been completed when this is
/// dropped (including by a panicking worker) is released from the backlog.
#[derive(Debug)]
pub struct Submission {
  backlog:   Backlog,
  remaining: usize,
}

impl Submission {
  /// Mark one change finished, successfully or not. Returns the backlog
  /// size afterwards.
  pub fn complete_one(&mut self) -> usize {
    if self.remaining == 0 {
      return self.backlog.in_flight();
    }
    self.remaining -= 1;
    self.backlog.0.fetch_sub(1, Ordering::SeqCst) - 1
  }

  /// Move `changes` of this submission's remaining changes into a new
  /// submission, capped at what remains.
  pub fn split(&mut self, changes: usize) -> Submission {
    let moved = changes.min(self.remaining);
    self.remaining -= moved;
    Submission { backlog: self.backlog.clone(), remaining: moved }
  }
}

impl Drop for Submission {
  fn drop(&mut self) {
    if self.remaining > 0 {
      self.backlog.0.fetch_sub(self.remaining, Ordering::SeqCst);
    }
  }
}
