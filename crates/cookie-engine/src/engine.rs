//! [`RuleEngine`] — short-circuiting evaluation of a fixed rule list.

use cookie_core::{Cookie, enrichment::RuleApplication};

use crate::{error::BoxError, rule::Rule};

/// Terminal state of one evaluation pass.
#[derive(Debug)]
pub enum PassState {
  /// A rule's action asked to stop.
  Halted { rule_id: String },
  /// Every rule was considered and none stopped the pass.
  Exhausted,
  /// A matcher or action returned an error; the pass was abandoned there.
  Failed { rule_id: String, error: BoxError },
}

/// Result of one pass over one cookie.
#[derive(Debug)]
pub struct Evaluation {
  pub state:   PassState,
  /// Every rule whose action ran, in evaluation order.
  pub applied: Vec<RuleApplication>,
}

/// Holds the rule set, ordered once at construction.
///
/// The set is read-only afterwards, so a single engine can be shared across
/// tasks evaluating different cookies.
#[derive(Debug, Default)]
pub struct RuleEngine {
  rules: Vec<Rule>,
}

impl RuleEngine {
  /// Order `rules` by ascending priority; ties keep declaration order.
  pub fn new(mut rules: Vec<Rule>) -> Self {
    rules.sort_by_key(Rule::priority);
    Self { rules }
  }

  pub fn rules(&self) -> &[Rule] { &self.rules }

  /// Run one pass over `cookie`.
  pub fn evaluate(&self, cookie: &Cookie) -> Evaluation {
    let mut applied = Vec::new();

    for rule in &self.rules {
      let matched = match rule.matches(cookie) {
        Ok(matched) => matched,
        Err(error) => return failed(rule, error, applied),
      };
      if !matched {
        continue;
      }

      tracing::debug!(identifier = %cookie.identifier, rule_id = rule.id(), "rule matched");
      let terminate = match rule.execute_action(cookie) {
        Ok(terminate) => terminate,
        Err(error) => return failed(rule, error, applied),
      };

      applied.push(RuleApplication { rule_id: rule.id().to_owned(), terminated: terminate });
      if terminate {
        return Evaluation {
          state: PassState::Halted { rule_id: rule.id().to_owned() },
          applied,
        };
      }
    }

    Evaluation { state: PassState::Exhausted, applied }
  }
}

fn failed(rule: &Rule, error: BoxError, applied: Vec<RuleApplication>) -> Evaluation {
  Evaluation {
    state: PassState::Failed { rule_id: rule.id().to_owned(), error },
    applied,
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  fn always(result: bool) -> impl Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync + 'static {
    move |_| Ok(result)
  }

  fn counting(
    counter: &Arc<AtomicUsize>,
    result: bool,
  ) -> impl Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(result)
    }
  }

  #[test]
  fn halting_action_skips_later_matchers() {
    let r1_actions = Arc::new(AtomicUsize::new(0));
    let r2_matches = Arc::new(AtomicUsize::new(0));

    let engine = RuleEngine::new(vec![
      Rule::new("r2", 1, counting(&r2_matches, true), always(false)),
      Rule::new("r1", 0, always(true), counting(&r1_actions, true)),
    ]);

    let evaluation = engine.evaluate(&Cookie::new("e"));
    assert!(matches!(evaluation.state, PassState::Halted { ref rule_id } if rule_id == "r1"));
    assert_eq!(r1_actions.load(Ordering::SeqCst), 1);
    assert_eq!(r2_matches.load(Ordering::SeqCst), 0);
    assert_eq!(evaluation.applied, vec![RuleApplication {
      rule_id:    "r1".into(),
      terminated: true,
    }]);
  }

  #[test]
  fn non_halting_actions_exhaust_the_rule_set() {
    let engine = RuleEngine::new(vec![
      Rule::new("a", 0, always(true), always(false)),
      Rule::new("b", 1, always(false), always(true)),
      Rule::new("c", 2, always(true), always(false)),
    ]);

    let evaluation = engine.evaluate(&Cookie::new("e"));
    assert!(matches!(evaluation.state, PassState::Exhausted));
    let ids: Vec<_> = evaluation.applied.iter().map(|a| a.rule_id.as_str()).collect();
    assert_eq!(ids, ["a", "c"]);
  }

  #[test]
  fn ties_keep_declaration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let rule = |id: &'static str| {
      let order = order.clone();
      Rule::new(id, 7, move |_: &Cookie| {
        order.lock().unwrap().push(id);
        Ok(false)
      }, always(false))
    };

    let engine = RuleEngine::new(vec![rule("first"), rule("second"), rule("third")]);
    engine.evaluate(&Cookie::new("e"));
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
  }

  #[test]
  fn matcher_error_fails_the_pass() {
    let later = Arc::new(AtomicUsize::new(0));
    let engine = RuleEngine::new(vec![
      Rule::new("ok", 0, always(true), always(false)),
      Rule::new("broken", 1, |_: &Cookie| Err("boom".into()), always(true)),
      Rule::new("later", 2, counting(&later, true), always(true)),
    ]);

    let evaluation = engine.evaluate(&Cookie::new("e"));
    match evaluation.state {
      PassState::Failed { rule_id, error } => {
        assert_eq!(rule_id, "broken");
        assert_eq!(error.to_string(), "boom");
      }
      other => panic!("unexpected state: {other:?}"),
    }
    assert_eq!(evaluation.applied.len(), 1);
    assert_eq!(later.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn empty_rule_set_is_exhausted() {
    let evaluation = RuleEngine::default().evaluate(&Cookie::new("e"));
    assert!(matches!(evaluation.state, PassState::Exhausted));
    assert!(evaluation.applied.is_empty());
  }
}
