//! Rules that stop processing of newly created data objects which have
//! already been marked as not worth following up.

use std::path::PathBuf;

use cookie_core::{Cookie, resolve};
use cookie_engine::{BoxError, Rule};

use super::CREATION_PRIORITY;

pub const MANUAL_QC_RULE_ID: &str = "creation_observed_but_incorrect_manual_qc";
pub const REFERENCE_RULE_ID: &str = "creation_observed_but_non_human_reference";

pub const MANUAL_QC_KEY: &str = "manual_qc";
pub const REFERENCE_KEY: &str = "reference";

const FAILED_MANUAL_QC: &str = "1";

// ─── Manual QC ───────────────────────────────────────────────────────────────

/// Halts when the creation was observed and `manual_qc` is exactly `1`.
///
/// An unknown or multi-valued `manual_qc` does not match.
pub fn incorrect_manual_qc() -> Rule {
  Rule::new(
    MANUAL_QC_RULE_ID,
    CREATION_PRIORITY,
    |cookie: &Cookie| {
      Ok::<_, BoxError>(
        cookie.was_creation_observed()
          && resolve::single_known_value(&cookie.enrichments, MANUAL_QC_KEY).as_deref()
            == Some(FAILED_MANUAL_QC),
      )
    },
    |_: &Cookie| Ok(true),
  )
}

// ─── Reference ───────────────────────────────────────────────────────────────

/// The species directory of a reference path such as
/// `/lustre/.../references/Mus_musculus/GRCm38/all/bwa/Mus_musculus.GRCm38.fa`.
fn reference_species(reference: &str) -> Option<&str> {
  let lower = reference.to_ascii_lowercase();
  let start = lower.find("/references/")? + "/references/".len();
  let rest = &reference[start..];
  let (species, _) = rest.split_once('/')?;
  Some(species)
}

/// Halts when the creation was observed and the reference belongs to a
/// species listed in the file at `species_list`, one per line.
///
/// The list is re-read on every match so it can be edited while running.
pub fn non_human_reference(species_list: PathBuf) -> Rule {
  Rule::new(
    REFERENCE_RULE_ID,
    CREATION_PRIORITY,
    move |cookie: &Cookie| {
      if !cookie.was_creation_observed() {
        return Ok(false);
      }
      let Some(reference) = resolve::single_known_value(&cookie.enrichments, REFERENCE_KEY) else {
        return Ok(false);
      };
      let Some(species) = reference_species(&reference) else {
        return Ok(false);
      };

      let listed = std::fs::read_to_string(&species_list)
        .map_err(|e| format!("cannot read {}: {e}", species_list.display()))?;
      Ok(listed.lines().map(str::trim).any(|line| line == species))
    },
    |_: &Cookie| Ok(true),
  )
}
