//! Rules — immutable (matcher, action) pairs with an evaluation priority.

use std::fmt;

use cookie_core::Cookie;

use crate::error::BoxError;

type Predicate = Box<dyn Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync>;

/// A business rule.
///
/// Lower `priority` values are evaluated first. The action's return value
/// means "stop evaluating further rules for this pass". Both functions must
/// be idempotent; their only side effects are calls to external
/// collaborators such as notifiers.
pub struct Rule {
  id:       String,
  priority: u32,
  matcher:  Predicate,
  action:   Predicate,
}

impl Rule {
  pub fn new<M, A>(id: impl Into<String>, priority: u32, matcher: M, action: A) -> Self
  where
    M: Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync + 'static,
    A: Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync + 'static,
  {
    Self {
      id: id.into(),
      priority,
      matcher: Box::new(matcher),
      action: Box::new(action),
    }
  }

  pub fn id(&self) -> &str { &self.id }

  pub fn priority(&self) -> u32 { self.priority }

  pub fn matches(&self, cookie: &Cookie) -> Result<bool, BoxError> { (self.matcher)(cookie) }

  /// Run the action; `Ok(true)` halts the pass.
  pub fn execute_action(&self, cookie: &Cookie) -> Result<bool, BoxError> { (self.action)(cookie) }
}

impl fmt::Debug for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Rule")
      .field("id", &self.id)
      .field("priority", &self.priority)
      .finish_non_exhaustive()
  }
}
