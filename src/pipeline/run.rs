//! One end-to-end run: fetch, resolve, build, dedupe, reconcile, filter.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::apis::create_extractor;
use crate::app::ports::HttpClientPort;
use crate::common::types::{CanonicalEvent, RawCandidate};
use crate::config::Config;
use crate::infra::http_client::ReqwestHttp;
use crate::observability::metrics;
use crate::pipeline::ingestion::{Orchestrator, PageFetcher, RetryPolicy, SourceTask};
use crate::pipeline::processing::{
    reconcile, sort_for_output, Cutoff, DateTimeResolver, DedupeEngine, EventBuilder, Resolution,
    VenueAddressMap,
};
use crate::storage::SnapshotStore;

/// Forward-only progression of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Fetching,
    Resolving,
    Building,
    Deduping,
    Reconciling,
    Filtering,
    Done,
}

impl RunStage {
    pub fn next(self) -> Self {
        match self {
            RunStage::Fetching => RunStage::Resolving,
            RunStage::Resolving => RunStage::Building,
            RunStage::Building => RunStage::Deduping,
            RunStage::Deduping => RunStage::Reconciling,
            RunStage::Reconciling => RunStage::Filtering,
            RunStage::Filtering | RunStage::Done => RunStage::Done,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub candidates: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub cutoff: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
    pub candidates: usize,
    pub merged: usize,
    pub retained_from_snapshot: usize,
    pub dropped_by_cutoff: usize,
    pub output: usize,
}

impl RunSummary {
    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub events: Vec<CanonicalEvent>,
    pub summary: RunSummary,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct EventRun {
    config: Config,
    fetcher: PageFetcher,
    store: Arc<dyn SnapshotStore>,
    now: DateTime<Utc>,
    env: EnvLookup,
    stage: RunStage,
    run_id: Uuid,
}

impl EventRun {
    /// A run against the real network using the `[fetch]` settings
    pub fn new(config: Config, store: Arc<dyn SnapshotStore>) -> anyhow::Result<Self> {
        let http = ReqwestHttp::new(&config.fetch.user_agent, config.fetch.timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self::with_http(config, Arc::new(http), store))
    }

    pub fn with_http(config: Config, http: Arc<dyn HttpClientPort>, store: Arc<dyn SnapshotStore>) -> Self {
        let policy = RetryPolicy::new(config.fetch.max_retries, config.fetch.backoff());
        Self {
            fetcher: PageFetcher::new(http, policy),
            config,
            store,
            now: Utc::now(),
            env: Box::new(|key| std::env::var(key).ok()),
            stage: RunStage::Fetching,
            run_id: Uuid::new_v4(),
        }
    }

    /// Pin the clock; the cutoff is derived from it
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Replace the process environment used for `SKIP_<SOURCE>` switches
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    pub fn stage(&self) -> RunStage {
        self.stage
    }

    fn advance(&mut self) {
        let next = self.stage.next();
        info!(from = ?self.stage, to = ?next, "Run stage");
        self.stage = next;
    }

    pub async fn execute(&mut self) -> anyhow::Result<RunReport> {
        let span = info_span!("run", run_id = %self.run_id);
        self.execute_stages().instrument(span).await
    }

    async fn execute_stages(&mut self) -> anyhow::Result<RunReport> {
        let tz = self.config.timezone().context("Invalid run timezone")?;
        let cutoff = Cutoff::start_of_day(self.now, tz);
        info!(cutoff = %cutoff.instant(), "Starting run");

        // Fetching
        let mut sources = Vec::new();
        let mut tasks = Vec::new();
        for source in self.config.enabled_sources_with(|key| (self.env)(key)) {
            match create_extractor(source, &self.config.fetch, cutoff.local_date()) {
                Ok(extractor) => tasks.push(SourceTask::new(extractor)),
                Err(e) => {
                    warn!(source = %source.name, error = %e, "Source misconfigured, skipping");
                    metrics::sources::task_failed();
                    sources.push(SourceSummary {
                        source: source.name.clone(),
                        candidates: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        let outcomes = Orchestrator::new(self.fetcher.clone(), self.config.fetch.concurrency)
            .run(tasks)
            .await;
        sources.extend(outcomes.successes.iter().map(|s| SourceSummary {
            source: s.source.clone(),
            candidates: s.candidates.len(),
            error: None,
        }));
        sources.extend(outcomes.failures.iter().map(|f| SourceSummary {
            source: f.source.clone(),
            candidates: 0,
            error: Some(f.error.to_string()),
        }));
        let candidates = outcomes.into_candidates();
        self.advance();

        // Resolving
        let venues = VenueAddressMap::new(&self.config.venues, self.config.run.city.as_deref());
        let builder = EventBuilder::new(
            DateTimeResolver::new(cutoff),
            venues.clone(),
            self.config.run.default_hour,
        );
        let resolved: Vec<(RawCandidate, Resolution)> = candidates
            .into_iter()
            .map(|candidate| {
                let resolution = builder.resolve(&candidate);
                (candidate, resolution)
            })
            .collect();
        self.advance();

        // Building
        let scraped_at = self.now;
        let built: Vec<CanonicalEvent> = resolved
            .iter()
            .map(|(candidate, resolution)| builder.assemble(candidate, *resolution, scraped_at))
            .collect();
        let candidate_count = built.len();
        self.advance();

        // Deduping
        let engine = DedupeEngine::new(tz, self.config.recurring_sources(), venues);
        let (deduped, merged_fresh) = engine.run(built);
        self.advance();

        // Reconciling
        let snapshot = match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Snapshot unavailable, reconciling against nothing");
                Vec::new()
            }
        };
        let reconciled = reconcile(deduped, snapshot, &engine);
        metrics::dedupe::snapshot_retained(reconciled.retained);
        metrics::dedupe::records_merged(merged_fresh + reconciled.merged);
        self.advance();

        // Filtering
        let (mut events, dropped) = cutoff.apply(reconciled.events);
        sort_for_output(&mut events);
        metrics::dedupe::cutoff_dropped(dropped);
        self.advance();

        let summary = RunSummary {
            run_id: self.run_id,
            cutoff: cutoff.instant(),
            sources,
            candidates: candidate_count,
            merged: merged_fresh + reconciled.merged,
            retained_from_snapshot: reconciled.retained,
            dropped_by_cutoff: dropped,
            output: events.len(),
        };
        info!(
            sources = summary.sources.len(),
            failed = summary.failed_sources(),
            candidates = summary.candidates,
            merged = summary.merged,
            retained = summary.retained_from_snapshot,
            dropped = summary.dropped_by_cutoff,
            output = summary.output,
            "Run complete"
        );

        Ok(RunReport { events, summary })
    }
}
