//! Shared request pacing for the cookie jar.

use std::{
  num::NonZeroU32,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use cookie_core::{
  Enrichment,
  store::{CookieJar, Listener},
};
use tokio::time::Instant;

// ─── Limiter ─────────────────────────────────────────────────────────────────

/// Spaces calls evenly at a fixed rate, across every task sharing it.
///
/// Each caller reserves the next free slot and sleeps until it arrives, so a
/// burst of `k` calls completes no earlier than `k / rate` seconds after it
/// started. Slots are never banked while idle.
#[derive(Debug)]
pub struct RateLimiter {
  period:    Duration,
  next_slot: Mutex<Instant>,
}

impl RateLimiter {
  pub fn per_second(requests: NonZeroU32) -> Self {
    Self {
      period:    Duration::from_secs(1) / requests.get(),
      next_slot: Mutex::new(Instant::now()),
    }
  }

  pub fn period(&self) -> Duration { self.period }

  /// Wait for this caller's slot.
  pub async fn acquire(&self) {
    let slot = {
      let mut next = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
      let slot = (*next).max(Instant::now()) + self.period;
      *next = slot;
      slot
    };
    tokio::time::sleep_until(slot).await;
  }
}

// ─── Rate-limited jar ────────────────────────────────────────────────────────

/// A [`CookieJar`] whose every request first waits on a shared
/// [`RateLimiter`].
pub struct RateLimitedJar<J> {
  inner:   J,
  limiter: Arc<RateLimiter>,
}

impl<J> RateLimitedJar<J> {
  pub fn new(inner: J, limiter: Arc<RateLimiter>) -> Self { Self { inner, limiter } }

  pub fn inner(&self) -> &J { &self.inner }

  pub fn limiter(&self) -> &Arc<RateLimiter> { &self.limiter }
}

impl<J: CookieJar> CookieJar for RateLimitedJar<J> {
  type Error = J::Error;

  async fn append_enrichment(
    &self,
    identifier: &str,
    enrichment: Enrichment,
  ) -> Result<(), J::Error> {
    self.limiter.acquire().await;
    self.inner.append_enrichment(identifier, enrichment).await
  }

  async fn append_enrichment_quietly(
    &self,
    identifier: &str,
    enrichment: Enrichment,
  ) -> Result<(), J::Error> {
    self.limiter.acquire().await;
    self.inner.append_enrichment_quietly(identifier, enrichment).await
  }

  async fn get_history(&self, identifier: &str) -> Result<Vec<Enrichment>, J::Error> {
    self.limiter.acquire().await;
    self.inner.get_history(identifier).await
  }

  // Registration is local; it is not a request.
  fn add_listener(&self, listener: Listener) { self.inner.add_listener(listener); }
}
