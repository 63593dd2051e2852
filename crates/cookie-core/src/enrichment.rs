//! Enrichment types — the unit of observation about a cookie.
//!
//! An enrichment is an immutable observation, stamped with the time it was
//! made and tagged with the producer that made it. Some producers report full
//! snapshots of the tracked data object; others report only what changed.
//! Resolution over both shapes lives in [`crate::resolve`].

use std::{
  borrow::Cow,
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// Open tag naming the producer of an enrichment.
///
/// The well-known producers are exposed as associated constants; enrichment
/// loaders are free to use their own tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrichmentKind(Cow<'static, str>);

impl EnrichmentKind {
  /// Incremental change reported by the upstream source.
  pub const UPSTREAM_UPDATE: Self = Self(Cow::Borrowed("upstream_update"));
  /// Full refresh of the data object, fetched on demand.
  pub const UPSTREAM_SNAPSHOT: Self = Self(Cow::Borrowed("upstream_snapshot"));
  /// Record that a rule's action ran against the cookie.
  pub const RULE_APPLICATION: Self = Self(Cow::Borrowed("rule_application"));

  pub fn new(tag: impl Into<String>) -> Self { Self(Cow::Owned(tag.into())) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EnrichmentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Key → set-of-values mapping. A key may legitimately carry more than one
/// value.
pub type Metadata = BTreeMap<String, BTreeSet<String>>;

/// Build a [`Metadata`] map from `(key, values)` pairs.
pub fn metadata<K, V, I>(pairs: I) -> Metadata
where
  K: Into<String>,
  V: Into<String>,
  I: IntoIterator<Item = (K, Vec<V>)>,
{
  pairs
    .into_iter()
    .map(|(k, vs)| (k.into(), vs.into_iter().map(Into::into).collect()))
    .collect()
}

// ─── Payload shapes ──────────────────────────────────────────────────────────

/// Replica number assigned to the first copy of a newly created data object.
pub const FIRST_REPLICA_NUMBER: u32 = 0;

/// A physical copy of a data object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Replica {
  pub number:   u32,
  pub checksum: String,
}

/// Delta payload: what changed in a single upstream update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
  /// Only the metadata keys touched by the update, with their new values.
  #[serde(default)]
  pub modified_metadata: Metadata,
  /// Replicas created or rewritten by the update.
  #[serde(default)]
  pub modified_replicas: BTreeSet<Replica>,
}

impl Modification {
  pub fn of_metadata(modified_metadata: Metadata) -> Self {
    Self { modified_metadata, modified_replicas: BTreeSet::new() }
  }

  pub fn of_replica(replica: Replica) -> Self {
    Self {
      modified_metadata: Metadata::new(),
      modified_replicas: BTreeSet::from([replica]),
    }
  }
}

/// Snapshot payload: the complete state of the data object when observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
  pub path:     String,
  #[serde(default)]
  pub metadata: Metadata,
}

/// Payload of a [`EnrichmentKind::RULE_APPLICATION`] enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplication {
  pub rule_id:    String,
  /// Whether the rule's action stopped further evaluation.
  pub terminated: bool,
}

/// The typed body of an enrichment, serialised as `{"type": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
  Modification(Modification),
  DataObject(DataObject),
  RuleApplication(RuleApplication),
  /// Escape hatch for loaders whose output has no dedicated shape.
  Metadata(Metadata),
}

// ─── Enrichment ──────────────────────────────────────────────────────────────

/// A timestamped observation about a cookie. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
  pub source:    EnrichmentKind,
  pub timestamp: DateTime<Utc>,
  pub payload:   Payload,
}

impl Enrichment {
  pub fn new(source: EnrichmentKind, timestamp: DateTime<Utc>, payload: Payload) -> Self {
    Self { source, timestamp, payload }
  }

  /// An upstream delta.
  pub fn update(timestamp: DateTime<Utc>, modification: Modification) -> Self {
    Self::new(
      EnrichmentKind::UPSTREAM_UPDATE,
      timestamp,
      Payload::Modification(modification),
    )
  }

  /// A full snapshot of the data object.
  pub fn snapshot(timestamp: DateTime<Utc>, data_object: DataObject) -> Self {
    Self::new(
      EnrichmentKind::UPSTREAM_SNAPSHOT,
      timestamp,
      Payload::DataObject(data_object),
    )
  }

  pub fn rule_application(timestamp: DateTime<Utc>, application: RuleApplication) -> Self {
    Self::new(
      EnrichmentKind::RULE_APPLICATION,
      timestamp,
      Payload::RuleApplication(application),
    )
  }

  /// The metadata this enrichment asserts: the full mapping for a snapshot,
  /// the changed keys for a delta, nothing for any other shape.
  pub fn metadata_view(&self) -> Option<&Metadata> {
    match &self.payload {
      Payload::Modification(m) => Some(&m.modified_metadata),
      Payload::DataObject(d) => Some(&d.metadata),
      Payload::RuleApplication(_) | Payload::Metadata(_) => None,
    }
  }

  pub fn modification(&self) -> Option<&Modification> {
    match &self.payload {
      Payload::Modification(m) => Some(m),
      _ => None,
    }
  }

  pub fn rule_application_record(&self) -> Option<&RuleApplication> {
    match &self.payload {
      Payload::RuleApplication(r) => Some(r),
      _ => None,
    }
  }
}

// ─── Upstream change ─────────────────────────────────────────────────────────

/// One entry of an upstream poll: a modification of the data object
/// identified by `target`, observed at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
  pub target:       String,
  pub timestamp:    DateTime<Utc>,
  pub modification: Modification,
}

impl Change {
  /// The enrichment recording this change against its target cookie.
  pub fn to_enrichment(&self) -> Enrichment {
    Enrichment::update(self.timestamp, self.modification.clone())
  }
}
