//! Notify when a new library appears for a study of interest.

use std::sync::Arc;

use cookie_core::{Cookie, EnrichmentKind, resolve};
use cookie_engine::{BoxError, Rule};

use super::{STUDY_ID_KEY, STUDY_PRIORITY, TARGET_KEY, TARGET_LIBRARY};
use crate::notify::Notifier;

/// A study whose new libraries are announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Study {
  pub rule_id: &'static str,
  pub id:      &'static str,
  pub name:    &'static str,
}

pub const STUDIES: [Study; 4] = [
  Study { rule_id: "study_interval", id: "3765", name: "INTERVAL" },
  Study { rule_id: "study_manolis", id: "3596", name: "MANOLIS" },
  Study { rule_id: "study_pomak", id: "3597", name: "POMAK" },
  Study { rule_id: "study_ibd_x10_wgs_1", id: "4113", name: "IBD X10 WGS 1" },
];

/// Whether the merged metadata places the data object in `study_id` and
/// marks it as a library.
pub fn relates_to_library_in_study(cookie: &Cookie, study_id: &str) -> bool {
  let in_study = cookie
    .latest_known_value(STUDY_ID_KEY)
    .is_some_and(|ids| ids.contains(study_id));
  let is_library = cookie
    .latest_known_value(TARGET_KEY)
    .is_some_and(|targets| targets.contains(TARGET_LIBRARY));
  in_study && is_library
}

fn announcement(study: &Study, cookie: &Cookie) -> String {
  let seen = resolve::latest_from_source(&cookie.enrichments, &EnrichmentKind::UPSTREAM_UPDATE)
    .map(|e| e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_else(|| "unknown time".to_owned());
  format!(
    "Additional library for study {} ({}) at {seen}: {}",
    study.id, study.name, cookie.identifier
  )
}

/// Posts one announcement per cookie, then lets evaluation continue.
pub fn rule(study: &Study, notifier: Arc<dyn Notifier>) -> Rule {
  let study = *study;
  Rule::new(
    study.rule_id,
    STUDY_PRIORITY,
    move |cookie: &Cookie| {
      Ok::<_, BoxError>(
        !cookie.was_rule_applied(study.rule_id) && relates_to_library_in_study(cookie, study.id),
      )
    },
    move |cookie: &Cookie| {
      notifier.post(&announcement(&study, cookie))?;
      Ok(false)
    },
  )
}
