//! Enrichment loaders — fetch more information about a cookie when no rule
//! could decide what to do with it.

use async_trait::async_trait;
use cookie_core::{Cookie, Enrichment};

use crate::error::BoxError;

/// A producer of additional enrichments.
///
/// After a pass that no rule halted, the processor offers the cookie to
/// each loader in ascending `priority` order; the first whose
/// [`can_enrich`](Self::can_enrich) returns `true` is asked to
/// [`load`](Self::load). The resulting enrichment is appended with
/// notification, so a fresh pass follows. `can_enrich` must eventually
/// return `false` for a given cookie (typically once its own enrichment is
/// present) or the cookie is enriched forever.
#[async_trait]
pub trait EnrichmentLoader: Send + Sync {
  /// Name used in logs and errors.
  fn name(&self) -> &str;

  fn priority(&self) -> u32 { 0 }

  fn can_enrich(&self, cookie: &Cookie) -> bool;

  async fn load(&self, cookie: &Cookie) -> Result<Enrichment, BoxError>;
}
