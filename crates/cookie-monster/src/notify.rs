//! Notifiers — where rule actions send their messages.

use std::{
  fs::{File, OpenOptions},
  io::Write as _,
  path::{Path, PathBuf},
  sync::Mutex,
};

use chrono::Utc;

use crate::{Error, Result};

/// A sink for human-readable messages produced by rule actions.
///
/// Delivery is best-effort. Rule actions run synchronously inside a
/// processing pass, so implementations should return promptly.
pub trait Notifier: Send + Sync {
  fn post(&self, message: &str) -> Result<()>;
}

// ─── Files ───────────────────────────────────────────────────────────────────

/// A file opened for appending whole lines.
///
/// Writes are blocking and happen on the calling task's thread. Each post is
/// one short line, so this is kept off `spawn_blocking`.
struct AppendFile {
  path: PathBuf,
  file: Mutex<File>,
}

impl AppendFile {
  fn open(path: &Path) -> Result<Self> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing::debug!(path = %path.display(), "writing rule output");
    Ok(Self { path: path.to_path_buf(), file: Mutex::new(file) })
  }

  fn append(&self, line: &str) -> Result<()> {
    let mut file = self.file.lock().map_err(|_| Error::Poisoned("rule output"))?;
    file.write_all(line.as_bytes())?;
    file.flush()?;
    Ok(())
  }
}

// ─── Rule log ────────────────────────────────────────────────────────────────

/// Appends `<timestamp>\t<message>` lines to a file, one per post.
///
/// Timestamps are UTC, formatted `%Y-%m-%d %H:%M:%S`.
pub struct RuleLog(AppendFile);

impl RuleLog {
  /// Open `path` for appending, creating it if needed.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> { Ok(Self(AppendFile::open(path.as_ref())?)) }

  pub fn path(&self) -> &Path { &self.0.path }
}

impl Notifier for RuleLog {
  fn post(&self, message: &str) -> Result<()> {
    self.0.append(&format!("{}\t{message}\n", Utc::now().format("%Y-%m-%d %H:%M:%S")))
  }
}

// ─── Line log ────────────────────────────────────────────────────────────────

/// Appends each message as a bare line, so the file can be read back one
/// entry per line (see [`LineLog::read`]).
pub struct LineLog(AppendFile);

impl LineLog {
  /// Open `path` for appending, creating it if needed.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> { Ok(Self(AppendFile::open(path.as_ref())?)) }

  pub fn path(&self) -> &Path { &self.0.path }

  /// Every non-empty line of the file at `path`, in order.
  pub fn read(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().filter(|l| !l.is_empty()).map(str::to_owned).collect())
  }
}

impl Notifier for LineLog {
  fn post(&self, message: &str) -> Result<()> { self.0.append(&format!("{message}\n")) }
}

// ─── Tracing ─────────────────────────────────────────────────────────────────

/// Emits each message as an `info` event on the `notifications` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn post(&self, message: &str) -> Result<()> {
    tracing::info!(target: "notifications", "{message}");
    Ok(())
  }
}
