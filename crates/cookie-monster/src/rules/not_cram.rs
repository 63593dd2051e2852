//! Stops processing of anything that is not a CRAM file.

use cookie_core::Cookie;
use cookie_engine::{BoxError, Rule};

use super::NOT_CRAM_PRIORITY;

pub const RULE_ID: &str = "not_cram";

fn is_cram(identifier: &str) -> bool {
  identifier
    .rsplit_once('.')
    .is_some_and(|(_, extension)| extension.eq_ignore_ascii_case("cram"))
}

pub fn rule() -> Rule {
  Rule::new(
    RULE_ID,
    NOT_CRAM_PRIORITY,
    |cookie: &Cookie| Ok::<_, BoxError>(!is_cram(&cookie.identifier)),
    |_: &Cookie| Ok(true),
  )
}
