//! [`Settings`] — host configuration.
//!
//! Read from an optional TOML file, then overridden by environment variables
//! of the form `COOKIE_MONSTER__<SECTION>__<KEY>` (for example
//! `COOKIE_MONSTER__PROCESSING__MAX_WORKERS=8`).

use std::{
  num::NonZeroU32,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use cookie_engine::DEFAULT_MAX_PASSES;
use cookie_ingest::{PipelineConfig, RateLimiter};
use serde::Deserialize;

const ENV_PREFIX: &str = "COOKIE_MONSTER";

// ─── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
  /// Seconds between the starts of consecutive polls.
  pub period_secs:  f64,
  /// Unix time to start from when no checkpoint has been logged.
  pub since:        i64,
  /// SQLite file holding the retrieval log.
  pub log_database: PathBuf,
}

impl Default for RetrievalSettings {
  fn default() -> Self {
    Self { period_secs: 30.0, since: 0, log_database: "retrieval.db".into() }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CookieJarSettings {
  pub max_requests_per_second: u32,
}

impl Default for CookieJarSettings {
  fn default() -> Self { Self { max_requests_per_second: 10 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
  /// Changes applied to the jar concurrently.
  pub max_workers:         usize,
  /// Rule passes run concurrently.
  pub max_processors:      usize,
  pub apply_timeout_secs:  u64,
  pub submit_timeout_secs: u64,
}

impl Default for ProcessingSettings {
  fn default() -> Self {
    Self {
      max_workers:         5,
      max_processors:      DEFAULT_MAX_PASSES,
      apply_timeout_secs:  60,
      submit_timeout_secs: 300,
    }
  }
}

/// Location of an append-only output file.
#[derive(Debug, Clone, Deserialize)]
pub struct FileSettings {
  pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReferenceSettings {
  /// Species list for the non-human reference rule; the rule is left out
  /// when unset.
  pub non_human: Option<PathBuf>,
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub retrieval:   RetrievalSettings,
  pub cookie_jar:  CookieJarSettings,
  pub processing:  ProcessingSettings,
  pub rule_log:    FileSettings,
  pub not_ignored: FileSettings,
  pub references:  ReferenceSettings,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      retrieval:   RetrievalSettings::default(),
      cookie_jar:  CookieJarSettings::default(),
      processing:  ProcessingSettings::default(),
      rule_log:    FileSettings { path: "rules.log".into() },
      not_ignored: FileSettings { path: "not_ignored.log".into() },
      references:  ReferenceSettings::default(),
    }
  }
}

impl Settings {
  /// Load from the TOML file at `path` (skipped if absent) and the
  /// environment.
  pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
    Self::build(Config::builder().add_source(File::from(path.as_ref()).required(false)))
  }

  /// Load from TOML text and the environment.
  pub fn from_toml(toml: &str) -> anyhow::Result<Self> {
    Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
  }

  fn build(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
    let settings: Self = builder
      .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
      .build()
      .context("failed to read settings")?
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.validate()?;
    Ok(settings)
  }

  fn validate(&self) -> anyhow::Result<()> {
    self.period()?;
    anyhow::ensure!(self.processing.max_workers > 0, "processing.max_workers must be positive");
    anyhow::ensure!(
      self.processing.max_processors > 0,
      "processing.max_processors must be positive"
    );
    self.since()?;
    self.requests_per_second()?;
    Ok(())
  }

  fn period(&self) -> anyhow::Result<Duration> {
    let secs = self.retrieval.period_secs;
    let period = Duration::try_from_secs_f64(secs)
      .with_context(|| format!("retrieval.period_secs out of range: {secs}"))?;
    anyhow::ensure!(!period.is_zero(), "retrieval.period_secs must be positive, got {secs}");
    Ok(period)
  }

  fn since(&self) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp(self.retrieval.since, 0)
      .with_context(|| format!("retrieval.since out of range: {}", self.retrieval.since))
  }

  fn requests_per_second(&self) -> anyhow::Result<NonZeroU32> {
    NonZeroU32::new(self.cookie_jar.max_requests_per_second)
      .context("cookie_jar.max_requests_per_second must be positive")
  }

  pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
    Ok(PipelineConfig {
      period:         self.period()?,
      since:          self.since()?,
      max_workers:    self.processing.max_workers,
      apply_timeout:  Duration::from_secs(self.processing.apply_timeout_secs),
      submit_timeout: Duration::from_secs(self.processing.submit_timeout_secs),
    })
  }

  pub fn max_processors(&self) -> usize { self.processing.max_processors }

  pub fn rate_limiter(&self) -> anyhow::Result<RateLimiter> {
    Ok(RateLimiter::per_second(self.requests_per_second()?))
  }

  pub fn log_database_path(&self) -> PathBuf { expand_tilde(&self.retrieval.log_database) }

  pub fn rule_log_path(&self) -> PathBuf { expand_tilde(&self.rule_log.path) }

  pub fn not_ignored_path(&self) -> PathBuf { expand_tilde(&self.not_ignored.path) }

  pub fn non_human_references_path(&self) -> Option<PathBuf> {
    self.references.non_human.as_deref().map(expand_tilde)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
