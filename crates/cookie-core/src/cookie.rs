//! Cookie — the tracked entity and its enrichment history.
//!
//! A cookie holds only an identifier and the enrichments recorded against it.
//! The enrichments are kept in insertion order, which is not necessarily
//! timestamp order; everything meaningful is derived on read.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{enrichment::Enrichment, resolve};

/// A read-only snapshot of a tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
  pub identifier:  String,
  pub enrichments: Vec<Enrichment>,
}

impl Cookie {
  pub fn new(identifier: impl Into<String>) -> Self {
    Self { identifier: identifier.into(), enrichments: Vec::new() }
  }

  pub fn with_history(identifier: impl Into<String>, enrichments: Vec<Enrichment>) -> Self {
    Self { identifier: identifier.into(), enrichments }
  }

  /// Append an enrichment to this snapshot.
  pub fn enrich(&mut self, enrichment: Enrichment) { self.enrichments.push(enrichment); }

  /// See [`resolve::latest_known_value`].
  pub fn latest_known_value(&self, key: &str) -> Option<BTreeSet<String>> {
    resolve::latest_known_value(&self.enrichments, key)
  }

  /// See [`resolve::was_creation_observed`].
  pub fn was_creation_observed(&self) -> bool {
    resolve::was_creation_observed(&self.enrichments)
  }

  /// See [`resolve::was_rule_applied`].
  pub fn was_rule_applied(&self, rule_id: &str) -> bool {
    resolve::was_rule_applied(&self.enrichments, rule_id)
  }
}
