//! Enrichment loaders available to the host.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cookie_core::{Cookie, Enrichment, EnrichmentKind, store::SnapshotSource};
use cookie_engine::{BoxError, EnrichmentLoader};

/// Fetches a full snapshot of the data object the first time a cookie is
/// left undecided by the rule set.
pub struct SnapshotLoader<S> {
  source: Arc<S>,
}

impl<S> SnapshotLoader<S> {
  pub fn new(source: Arc<S>) -> Self { Self { source } }
}

#[async_trait]
impl<S> EnrichmentLoader for SnapshotLoader<S>
where
  S: SnapshotSource + 'static,
{
  fn name(&self) -> &str { "upstream_snapshot" }

  fn can_enrich(&self, cookie: &Cookie) -> bool {
    !cookie.enrichments.iter().any(|e| e.source == EnrichmentKind::UPSTREAM_SNAPSHOT)
  }

  async fn load(&self, cookie: &Cookie) -> Result<Enrichment, BoxError> {
    let data_object = self.source.snapshot(&cookie.identifier).await?;
    Ok(Enrichment::snapshot(Utc::now(), data_object))
  }
}
