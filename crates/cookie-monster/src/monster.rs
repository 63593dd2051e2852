//! [`CookieMonster`] — joins the ingestion pipeline to rule processing.
//!
//! The pipeline appends upstream changes to the jar. Every notifying append
//! fires a jar listener, which schedules a processing pass for the changed
//! cookie on the runtime that assembled the system.

use std::sync::Arc;

use anyhow::Context as _;
use cookie_core::store::{CheckpointStore, CookieJar, MetricsSink, UpstreamSource};
use cookie_engine::{EnrichmentLoader, Processor, Rule, RuleEngine};
use cookie_ingest::{Pipeline, PipelineConfig, RateLimitedJar};
use cookie_store_sqlite::SqliteRetrievalLog;
use tokio::{runtime::Handle, sync::watch};

use crate::{Result, Settings, notify::{LineLog, RuleLog}, rules::hgi_rules};

pub struct CookieMonster<U, J, C> {
  processor: Arc<Processor<J>>,
  pipeline:  Pipeline<U, J, C>,
}

impl<U, J, C> CookieMonster<U, J, C>
where
  U: UpstreamSource,
  J: CookieJar + 'static,
  C: CheckpointStore,
{
  /// Wire the components together. At most `max_passes` rule passes run
  /// at once.
  ///
  /// Must be called from within a tokio runtime; processing passes are
  /// spawned onto it.
  #[allow(clippy::too_many_arguments)]
  pub fn assemble(
    config: PipelineConfig,
    max_passes: usize,
    upstream: Arc<U>,
    jar: Arc<J>,
    checkpoints: Arc<C>,
    metrics: Arc<dyn MetricsSink>,
    rules: Vec<Rule>,
    loaders: Vec<Box<dyn EnrichmentLoader>>,
  ) -> Result<Self> {
    let runtime = Handle::try_current()?;
    let processor = Arc::new(
      Processor::new(jar.clone(), Arc::new(RuleEngine::new(rules)))
        .with_loaders(loaders)
        .with_max_passes(max_passes),
    );

    // Weak, so the jar's listener list does not keep the processor alive.
    let listener = Arc::downgrade(&processor);
    jar.add_listener(Box::new(move |identifier: &str| {
      let Some(processor) = listener.upgrade() else {
        return;
      };
      let _runtime = runtime.enter();
      processor.schedule(identifier.to_owned());
    }));

    let pipeline = Pipeline::new(config, upstream, jar, checkpoints, metrics);
    Ok(Self { processor, pipeline })
  }

  pub fn processor(&self) -> &Arc<Processor<J>> { &self.processor }

  pub fn pipeline(&self) -> &Pipeline<U, J, C> { &self.pipeline }

  /// Drive ingestion until `shutdown` is signalled.
  pub async fn run(&self, shutdown: watch::Receiver<bool>) { self.pipeline.run(shutdown).await }
}

impl<U, J> CookieMonster<U, RateLimitedJar<J>, SqliteRetrievalLog>
where
  U: UpstreamSource,
  J: CookieJar + 'static,
{
  /// Build the HGI deployment described by `settings` around the given
  /// upstream source and cookie jar.
  ///
  /// Opens the retrieval log and both rule output files, and puts `jar`
  /// behind the configured request rate limit.
  pub async fn from_settings(
    settings: &Settings,
    upstream: Arc<U>,
    jar: J,
    metrics: Arc<dyn MetricsSink>,
    loaders: Vec<Box<dyn EnrichmentLoader>>,
  ) -> anyhow::Result<Self> {
    let config = settings.pipeline_config()?;
    let jar = Arc::new(RateLimitedJar::new(jar, Arc::new(settings.rate_limiter()?)));

    let log_path = settings.log_database_path();
    let checkpoints = SqliteRetrievalLog::open(&log_path)
      .await
      .with_context(|| format!("failed to open retrieval log at {log_path:?}"))?;

    let rule_log_path = settings.rule_log_path();
    let rule_log = RuleLog::open(&rule_log_path)
      .with_context(|| format!("failed to open rule log at {rule_log_path:?}"))?;
    let not_ignored_path = settings.not_ignored_path();
    let not_ignored = LineLog::open(&not_ignored_path)
      .with_context(|| format!("failed to open not-ignored log at {not_ignored_path:?}"))?;

    let rules = hgi_rules(
      Arc::new(rule_log),
      Arc::new(not_ignored),
      settings.non_human_references_path(),
    );
    tracing::info!(
      rules = rules.len(),
      max_passes = settings.max_processors(),
      loaders = loaders.len(),
      retrieval_log = %log_path.display(),
      "cookie monster assembled"
    );

    let max_passes = settings.max_processors();
    Self::assemble(config, max_passes, upstream, jar, Arc::new(checkpoints), metrics, rules, loaders)
      .context("failed to wire cookie monster")
  }
}
