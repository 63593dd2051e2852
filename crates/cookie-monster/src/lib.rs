//! Cookie Monster host: settings, logging, notifiers, the HGI rule set and
//! the wiring that joins ingestion to rule processing.
//!
//! The upstream source and the cookie jar are supplied by the embedding
//! application; everything else is built here from [`Settings`].

pub mod error;
pub mod loaders;
pub mod monster;
pub mod notify;
pub mod rules;
pub mod settings;
pub mod telemetry;

pub use error::{Error, Result};
pub use monster::CookieMonster;
pub use notify::{LineLog, LogNotifier, Notifier, RuleLog};
pub use settings::Settings;
