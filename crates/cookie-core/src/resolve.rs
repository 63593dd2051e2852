//! Fact resolution over an enrichment history.
//!
//! Histories arrive in insertion order, which may differ from observation
//! order. Every function here orders by `timestamp` (stably, so insertion
//! order only breaks ties) and treats snapshots and deltas alike: whichever
//! asserted a key last in time wins.

use std::collections::BTreeSet;

use crate::enrichment::{
  Enrichment, EnrichmentKind, FIRST_REPLICA_NUMBER, Metadata, Modification,
};

/// The history sorted by timestamp; equal timestamps keep insertion order.
pub fn chronological(history: &[Enrichment]) -> Vec<&Enrichment> {
  let mut ordered: Vec<&Enrichment> = history.iter().collect();
  ordered.sort_by_key(|e| e.timestamp);
  ordered
}

/// The most recently observed value-set for `key`, or `None` if no snapshot
/// or delta ever mentioned it.
pub fn latest_known_value(history: &[Enrichment], key: &str) -> Option<BTreeSet<String>> {
  chronological(history)
    .into_iter()
    .filter_map(Enrichment::metadata_view)
    .filter_map(|view| view.get(key))
    .last()
    .cloned()
}

/// Like [`latest_known_value`], but only when exactly one value is known.
///
/// A value-set of any other size is indeterminate and yields `None`.
pub fn single_known_value(history: &[Enrichment], key: &str) -> Option<String> {
  let values = latest_known_value(history, key)?;
  if values.len() != 1 {
    return None;
  }
  values.into_iter().next()
}

/// Every key ever asserted, each with its latest known value-set.
pub fn known_metadata(history: &[Enrichment]) -> Metadata {
  let mut merged = Metadata::new();
  for view in chronological(history).into_iter().filter_map(Enrichment::metadata_view) {
    for (key, values) in view {
      merged.insert(key.clone(), values.clone());
    }
  }
  merged
}

/// Whether any delta in the history satisfies `predicate`.
pub fn was_event_observed<P>(history: &[Enrichment], predicate: P) -> bool
where
  P: FnMut(&Modification) -> bool,
{
  history.iter().filter_map(Enrichment::modification).any(predicate)
}

/// Whether the creation of the data object was observed, i.e. a delta wrote
/// its first replica.
pub fn was_creation_observed(history: &[Enrichment]) -> bool {
  was_event_observed(history, |m| {
    m.modified_replicas.iter().any(|r| r.number == FIRST_REPLICA_NUMBER)
  })
}

/// The latest enrichment (by timestamp) produced by `source`.
pub fn latest_from_source<'a>(
  history: &'a [Enrichment],
  source: &EnrichmentKind,
) -> Option<&'a Enrichment> {
  chronological(history).into_iter().filter(|e| &e.source == source).last()
}

/// Whether the action of the rule with `rule_id` has been recorded against
/// this history. Position and timestamp are irrelevant.
pub fn was_rule_applied(history: &[Enrichment], rule_id: &str) -> bool {
  history
    .iter()
    .filter(|e| e.source == EnrichmentKind::RULE_APPLICATION)
    .filter_map(Enrichment::rule_application_record)
    .any(|r| r.rule_id == rule_id)
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;
  use crate::enrichment::{DataObject, Payload, Replica, RuleApplication, metadata};

  fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

  fn delta(secs: i64, key: &str, values: Vec<&str>) -> Enrichment {
    Enrichment::update(at(secs), Modification::of_metadata(metadata([(key, values)])))
  }

  fn snapshot(secs: i64, key: &str, values: Vec<&str>) -> Enrichment {
    Enrichment::snapshot(at(secs), DataObject {
      path:     "/seq/1.cram".into(),
      metadata: metadata([(key, values)]),
    })
  }

  fn creation(secs: i64) -> Enrichment {
    Enrichment::update(
      at(secs),
      Modification::of_replica(Replica {
        number:   FIRST_REPLICA_NUMBER,
        checksum: "abc".into(),
      }),
    )
  }

  fn set(values: &[&str]) -> Option<BTreeSet<String>> {
    Some(values.iter().map(|v| v.to_string()).collect())
  }

  #[test]
  fn unknown_key_on_empty_history() {
    assert_eq!(latest_known_value(&[], "x"), None);
  }

  #[test]
  fn later_timestamp_wins_regardless_of_append_order() {
    let a = delta(1, "x", vec!["a"]);
    let b = delta(2, "x", vec!["b"]);

    assert_eq!(latest_known_value(&[a.clone(), b.clone()], "x"), set(&["b"]));
    assert_eq!(latest_known_value(&[b, a], "x"), set(&["b"]));
  }

  #[test]
  fn delta_after_snapshot_overrides_it() {
    let history = vec![snapshot(1, "x", vec!["a"]), delta(2, "x", vec!["b"])];
    assert_eq!(latest_known_value(&history, "x"), set(&["b"]));
  }

  #[test]
  fn snapshot_after_delta_overrides_it() {
    let history = vec![snapshot(2, "x", vec!["a"]), delta(1, "x", vec!["b"])];
    assert_eq!(latest_known_value(&history, "x"), set(&["a"]));
  }

  #[test]
  fn equal_timestamps_fall_back_to_insertion_order() {
    let history = vec![delta(5, "x", vec!["first"]), snapshot(5, "x", vec!["second"])];
    assert_eq!(latest_known_value(&history, "x"), set(&["second"]));
  }

  #[test]
  fn enrichments_without_the_key_do_not_erase_it() {
    let history = vec![delta(1, "x", vec!["a"]), delta(2, "y", vec!["b"])];
    assert_eq!(latest_known_value(&history, "x"), set(&["a"]));
  }

  #[test]
  fn other_payloads_are_ignored() {
    let history = vec![
      delta(1, "x", vec!["a"]),
      Enrichment::new(
        EnrichmentKind::new("loader"),
        at(2),
        Payload::Metadata(metadata([("x", vec!["ignored"])])),
      ),
    ];
    assert_eq!(latest_known_value(&history, "x"), set(&["a"]));
  }

  #[test]
  fn duplicate_delivery_does_not_change_resolution() {
    let once = vec![delta(1, "x", vec!["a"]), delta(3, "x", vec!["c"]), delta(2, "y", vec!["b"])];
    let mut twice = once.clone();
    twice.extend(once.iter().rev().cloned());

    for key in ["x", "y", "z"] {
      assert_eq!(latest_known_value(&once, key), latest_known_value(&twice, key));
    }
    assert_eq!(known_metadata(&once), known_metadata(&twice));
  }

  #[test]
  fn multi_valued_facts_are_indeterminate_as_single_values() {
    let history = vec![delta(1, "manual_qc", vec!["1", "0"])];
    assert_eq!(latest_known_value(&history, "manual_qc"), set(&["0", "1"]));
    assert_eq!(single_known_value(&history, "manual_qc"), None);

    let history = vec![delta(1, "manual_qc", vec!["1"])];
    assert_eq!(single_known_value(&history, "manual_qc").as_deref(), Some("1"));
  }

  #[test]
  fn known_metadata_merges_all_keys() {
    let history = vec![
      snapshot(3, "target", vec!["library"]),
      delta(1, "study_id", vec!["42"]),
      delta(2, "target", vec!["sample"]),
    ];
    let merged = known_metadata(&history);
    assert_eq!(merged.get("target"), set(&["library"]).as_ref());
    assert_eq!(merged.get("study_id"), set(&["42"]).as_ref());
  }

  #[test]
  fn creation_not_observed_on_empty_or_irrelevant_history() {
    assert!(!was_creation_observed(&[]));
    assert!(!was_creation_observed(&[delta(1, "x", vec!["a"])]));

    let other_replica = Enrichment::update(
      at(1),
      Modification::of_replica(Replica { number: 3, checksum: "c".into() }),
    );
    assert!(!was_creation_observed(&[other_replica]));
  }

  #[test]
  fn creation_detection_ignores_interleaved_enrichments() {
    let alone = vec![creation(5)];
    let mut crowded = vec![delta(1, "x", vec!["a"]), snapshot(9, "y", vec!["b"])];
    crowded.push(creation(5));
    crowded.push(delta(7, "z", vec!["c"]));
    crowded.insert(0, delta(20, "x", vec!["d"]));

    assert!(was_creation_observed(&alone));
    assert!(was_creation_observed(&crowded));
  }

  #[test]
  fn event_predicate_short_circuits() {
    let history = vec![creation(1), creation(2), creation(3)];
    let mut calls = 0;
    assert!(was_event_observed(&history, |_| {
      calls += 1;
      true
    }));
    assert_eq!(calls, 1);
  }

  #[test]
  fn latest_from_source_orders_by_time() {
    let newer = delta(9, "x", vec!["new"]);
    let history = vec![newer.clone(), delta(3, "x", vec!["old"]), snapshot(20, "x", vec!["s"])];

    let found = latest_from_source(&history, &EnrichmentKind::UPSTREAM_UPDATE).unwrap();
    assert_eq!(found, &newer);
    assert!(latest_from_source(&history, &EnrichmentKind::new("absent")).is_none());
  }

  #[test]
  fn rule_application_is_detected_by_type_not_position() {
    let applied = Enrichment::rule_application(at(2), RuleApplication {
      rule_id:    "not_ignored".into(),
      terminated: false,
    });
    let history = vec![creation(3), applied, creation(1)];

    assert!(was_rule_applied(&history, "not_ignored"));
    assert!(!was_rule_applied(&history, "study_interval"));
  }
}
