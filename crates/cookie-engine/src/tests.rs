//! Processor tests against the in-memory cookie jar.

use std::{
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cookie_core::{
  Cookie, Enrichment, EnrichmentKind, Payload,
  enrichment::{Modification, metadata},
  memory::MemoryCookieJar,
  store::CookieJar,
};

use crate::{BoxError, EnrichmentLoader, Error, Outcome, Processor, Rule, RuleEngine};

fn update(secs: i64, pairs: &[(&str, &str)]) -> Enrichment {
  Enrichment::update(
    Utc.timestamp_opt(secs, 0).unwrap(),
    Modification::of_metadata(metadata(pairs.iter().map(|(k, v)| (*k, vec![*v])))),
  )
}

fn processor(jar: &Arc<MemoryCookieJar>, rules: Vec<Rule>) -> Processor<MemoryCookieJar> {
  Processor::new(jar.clone(), Arc::new(RuleEngine::new(rules)))
}

fn never(_: &Cookie) -> Result<bool, BoxError> { Ok(false) }

fn always(_: &Cookie) -> Result<bool, BoxError> { Ok(true) }

fn applied_rules(cookie: &Cookie) -> Vec<String> {
  cookie
    .enrichments
    .iter()
    .filter_map(Enrichment::rule_application_record)
    .map(|r| r.rule_id.clone())
    .collect()
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

/// Loads a `catalogue` enrichment once, slowly, tracking overlap.
#[derive(Default)]
struct SlowLoader {
  loads:      AtomicUsize,
  active:     AtomicUsize,
  max_active: AtomicUsize,
}

impl SlowLoader {
  fn kind() -> EnrichmentKind { EnrichmentKind::new("catalogue") }
}

#[async_trait]
impl EnrichmentLoader for Arc<SlowLoader> {
  fn name(&self) -> &str { "catalogue" }

  fn can_enrich(&self, cookie: &Cookie) -> bool {
    !cookie.enrichments.iter().any(|e| e.source == SlowLoader::kind())
  }

  async fn load(&self, _cookie: &Cookie) -> Result<Enrichment, BoxError> {
    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_active.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    self.active.fetch_sub(1, Ordering::SeqCst);
    self.loads.fetch_add(1, Ordering::SeqCst);

    Ok(Enrichment::new(
      SlowLoader::kind(),
      Utc::now(),
      Payload::Metadata(metadata([("location", vec!["archive"])])),
    ))
  }
}

struct FailingLoader;

#[async_trait]
impl EnrichmentLoader for FailingLoader {
  fn name(&self) -> &str { "failing" }

  fn priority(&self) -> u32 { 10 }

  fn can_enrich(&self, _cookie: &Cookie) -> bool { true }

  async fn load(&self, _cookie: &Cookie) -> Result<Enrichment, BoxError> {
    Err("catalogue unreachable".into())
  }
}

// ─── Rule applications ───────────────────────────────────────────────────────

#[tokio::test]
async fn halting_rule_is_recorded_without_notification() {
  let jar = Arc::new(MemoryCookieJar::new());
  let notified = Arc::new(AtomicUsize::new(0));
  let counter = notified.clone();
  jar.add_listener(Box::new(move |_: &str| {
    counter.fetch_add(1, Ordering::SeqCst);
  }));
  jar.append_enrichment_quietly("/a", update(1, &[("k", "v")])).await.unwrap();

  let p = processor(&jar, vec![
    Rule::new("observe", 0, always, never),
    Rule::new("stop", 1, always, always),
    Rule::new("unreached", 2, always, always),
  ]);

  let outcome = p.process("/a").await.unwrap();
  assert_eq!(outcome, Outcome::Halted { rule_id: "stop".into() });

  let cookie = jar.cookie("/a").unwrap().unwrap();
  assert_eq!(applied_rules(&cookie), ["observe", "stop"]);
  assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_cookie_is_processed_with_empty_history() {
  let jar = Arc::new(MemoryCookieJar::new());
  let p = processor(&jar, vec![Rule::new("never", 0, never, always)]);

  assert_eq!(p.process("/nowhere").await.unwrap(), Outcome::Unmatched);
  assert!(jar.cookie("/nowhere").unwrap().is_none());
}

#[tokio::test]
async fn study_rule_notifies_only_for_its_study() {
  let jar = Arc::new(MemoryCookieJar::new());
  let sent = Arc::new(Mutex::new(Vec::new()));
  let outbox = sent.clone();

  let study_library = Rule::new(
    "study-42",
    2,
    |c: &Cookie| {
      let study = c.latest_known_value("study_id").unwrap_or_default();
      let target = c.latest_known_value("target").unwrap_or_default();
      Ok(study.contains("42") && target.contains("library"))
    },
    move |c: &Cookie| {
      outbox.lock().unwrap().push(c.identifier.clone());
      Ok(false)
    },
  );
  let p = processor(&jar, vec![study_library]);

  jar
    .append_enrichment_quietly("/seq/1.cram", update(1, &[("study_id", "42"), ("target", "library")]))
    .await
    .unwrap();
  jar
    .append_enrichment_quietly("/seq/2.cram", update(1, &[("study_id", "43"), ("target", "library")]))
    .await
    .unwrap();

  assert_eq!(p.process("/seq/1.cram").await.unwrap(), Outcome::Unmatched);
  assert_eq!(p.process("/seq/2.cram").await.unwrap(), Outcome::Unmatched);

  assert_eq!(*sent.lock().unwrap(), ["/seq/1.cram"]);
  assert_eq!(applied_rules(&jar.cookie("/seq/1.cram").unwrap().unwrap()), ["study-42"]);
  assert!(applied_rules(&jar.cookie("/seq/2.cram").unwrap().unwrap()).is_empty());
}

#[tokio::test]
async fn facts_from_separate_deltas_combine() {
  let jar = Arc::new(MemoryCookieJar::new());
  fn library_in(
    study: &'static str,
  ) -> impl Fn(&Cookie) -> Result<bool, BoxError> + Send + Sync + 'static {
    move |c: &Cookie| {
      let studies = c.latest_known_value("study_id").unwrap_or_default();
      let targets = c.latest_known_value("target").unwrap_or_default();
      Ok(studies.contains(study) && targets.contains("library"))
    }
  }

  let p = processor(&jar, vec![
    Rule::new("study-42", 2, library_in("42"), never),
    Rule::new("study-43", 2, library_in("43"), never),
  ]);

  jar.append_enrichment_quietly("/seq/1.cram", update(10, &[("study_id", "42")])).await.unwrap();
  jar.append_enrichment_quietly("/seq/1.cram", update(11, &[("target", "library")])).await.unwrap();

  assert_eq!(p.process("/seq/1.cram").await.unwrap(), Outcome::Unmatched);
  assert_eq!(applied_rules(&jar.cookie("/seq/1.cram").unwrap().unwrap()), ["study-42"]);
}

// ─── Serialisation ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn passes_over_one_cookie_never_overlap() {
  let jar = Arc::new(MemoryCookieJar::new());
  let loader = Arc::new(SlowLoader::default());
  let p = processor(&jar, Vec::new()).with_loaders(vec![Box::new(loader.clone())]);

  let (first, second) = tokio::join!(p.process("/a"), p.process("/a"));

  // The second pass sees the first pass's enrichment and has nothing to load.
  let mut outcomes = vec![first.unwrap(), second.unwrap()];
  outcomes.sort_by_key(|o| matches!(o, Outcome::Unmatched));
  assert_eq!(outcomes, [Outcome::Enriched { loader: "catalogue".into() }, Outcome::Unmatched]);
  assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
  assert_eq!(loader.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn passes_over_different_cookies_overlap() {
  let jar = Arc::new(MemoryCookieJar::new());
  let loader = Arc::new(SlowLoader::default());
  let p = processor(&jar, Vec::new()).with_loaders(vec![Box::new(loader.clone())]);

  let (a, b) = tokio::join!(p.process("/a"), p.process("/b"));
  assert!(matches!(a.unwrap(), Outcome::Enriched { .. }));
  assert!(matches!(b.unwrap(), Outcome::Enriched { .. }));
  assert_eq!(loader.max_active.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn scheduled_passes_are_bounded() {
  let jar = Arc::new(MemoryCookieJar::new());
  let loader = Arc::new(SlowLoader::default());
  let p = Arc::new(
    processor(&jar, Vec::new())
      .with_loaders(vec![Box::new(loader.clone())])
      .with_max_passes(3),
  );

  let handles: Vec<_> = (0..20).map(|i| p.schedule(format!("/{i}.cram"))).collect();
  for handle in handles {
    handle.await.unwrap();
  }

  assert_eq!(loader.loads.load(Ordering::SeqCst), 20);
  assert_eq!(loader.max_active.load(Ordering::SeqCst), 3);
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn loader_enrichment_notifies_listeners() {
  let jar = Arc::new(MemoryCookieJar::new());
  let notified = Arc::new(Mutex::new(Vec::new()));
  let seen = notified.clone();
  jar.add_listener(Box::new(move |id: &str| seen.lock().unwrap().push(id.to_owned())));

  let loader = Arc::new(SlowLoader::default());
  let loaders: Vec<Box<dyn EnrichmentLoader>> =
    vec![Box::new(FailingLoader), Box::new(loader.clone())];
  let p = processor(&jar, vec![Rule::new("never", 0, never, always)]).with_loaders(loaders);

  // Lower priority value first: the slow loader (0) is tried before the failing one (10).
  assert_eq!(p.process("/a").await.unwrap(), Outcome::Enriched { loader: "catalogue".into() });
  assert_eq!(*notified.lock().unwrap(), ["/a"]);
}

#[tokio::test]
async fn loader_failure_is_reported() {
  let jar = Arc::new(MemoryCookieJar::new());
  let p = processor(&jar, Vec::new()).with_loaders(vec![Box::new(FailingLoader)]);

  match p.process("/a").await {
    Err(Error::Loader { identifier, loader, .. }) => {
      assert_eq!(identifier, "/a");
      assert_eq!(loader, "failing");
    }
    other => panic!("unexpected result: {other:?}"),
  }
}

// ─── Failure isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn rule_error_fails_only_its_cookie() {
  let jar = Arc::new(MemoryCookieJar::new());
  let p = processor(&jar, vec![
    Rule::new(
      "picky",
      0,
      |c: &Cookie| {
        if c.identifier == "/bad" {
          Err("cannot read metadata".into())
        } else {
          Ok(true)
        }
      },
      always,
    ),
  ]);

  match p.process("/bad").await {
    Err(Error::Rule { identifier, rule_id, source }) => {
      assert_eq!(identifier, "/bad");
      assert_eq!(rule_id, "picky");
      assert_eq!(source.to_string(), "cannot read metadata");
    }
    other => panic!("unexpected result: {other:?}"),
  }
  assert_eq!(p.process("/good").await.unwrap(), Outcome::Halted { rule_id: "picky".into() });
}

#[tokio::test]
async fn scheduled_pass_survives_a_panicking_rule() {
  let jar = Arc::new(MemoryCookieJar::new());
  let p = Arc::new(processor(&jar, vec![
    Rule::new(
      "explosive",
      0,
      |c: &Cookie| {
        if c.identifier == "/boom" {
          panic!("rule bug");
        }
        Ok(true)
      },
      always,
    ),
  ]));

  p.schedule("/boom".into()).await.unwrap();
  p.schedule("/fine".into()).await.unwrap();

  assert_eq!(applied_rules(&jar.cookie("/fine").unwrap().unwrap()), ["explosive"]);
  assert!(jar.cookie("/boom").unwrap().is_none());
}
