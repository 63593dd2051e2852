//! The HGI rule set.
//!
//! Priorities (lower runs first):
//!
//! | rule                                           | priority     | halts |
//! |------------------------------------------------|--------------|-------|
//! | [`not_cram`]                                   | 0            | yes   |
//! | [`creation::incorrect_manual_qc`]              | 1            | yes   |
//! | [`creation::non_human_reference`]              | 1            | yes   |
//! | [`study`] rules                                | 2            | no    |
//! | [`not_ignored`]                                | `u32::MAX`   | no    |

use std::{path::PathBuf, sync::Arc};

use cookie_engine::Rule;

use crate::notify::Notifier;

pub mod creation;
pub mod not_cram;
pub mod not_ignored;
pub mod study;

pub const NOT_CRAM_PRIORITY: u32 = 0;
pub const CREATION_PRIORITY: u32 = NOT_CRAM_PRIORITY + 1;
pub const STUDY_PRIORITY: u32 = CREATION_PRIORITY + 1;
pub const NOT_IGNORED_PRIORITY: u32 = u32::MAX;

/// Metadata key holding the study a data object belongs to.
pub const STUDY_ID_KEY: &str = "study_id";
/// Metadata key holding what the data object was sequenced as.
pub const TARGET_KEY: &str = "target";
pub const TARGET_LIBRARY: &str = "library";

/// Build the full rule set.
///
/// `notifier` receives study notifications; `not_ignored_log` receives the
/// identifier of every cookie that reached the end of the rule set. The
/// non-human reference rule is only included when `non_human_references`
/// names a species list.
pub fn hgi_rules(
  notifier: Arc<dyn Notifier>,
  not_ignored_log: Arc<dyn Notifier>,
  non_human_references: Option<PathBuf>,
) -> Vec<Rule> {
  let mut rules = vec![not_cram::rule(), creation::incorrect_manual_qc()];
  if let Some(species_list) = non_human_references {
    rules.push(creation::non_human_reference(species_list));
  }
  rules.extend(study::STUDIES.iter().map(|s| study::rule(s, notifier.clone())));
  rules.push(not_ignored::rule(not_ignored_log));
  rules
}
