//! Records every cookie that no earlier rule stopped, once.

use std::sync::Arc;

use cookie_core::Cookie;
use cookie_engine::{BoxError, Rule};

use super::NOT_IGNORED_PRIORITY;
use crate::notify::Notifier;

pub const RULE_ID: &str = "not_ignored";

pub fn rule(log: Arc<dyn Notifier>) -> Rule {
  Rule::new(
    RULE_ID,
    NOT_IGNORED_PRIORITY,
    |cookie: &Cookie| Ok::<_, BoxError>(!cookie.was_rule_applied(RULE_ID)),
    move |cookie: &Cookie| {
      log.post(&cookie.identifier)?;
      Ok(false)
    },
  )
}
