use crate::apis::base::Extractor;
use crate::common::error::ScraperError;
use crate::common::types::RawCandidate;
use crate::observability::metrics;
use crate::pipeline::ingestion::fetcher::PageFetcher;
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, Instrument};

/// One source's unit of work
pub struct SourceTask {
    pub name: String,
    pub extractor: Box<dyn Extractor>,
}

impl SourceTask {
    pub fn new(extractor: Box<dyn Extractor>) -> Self {
        Self {
            name: extractor.source_name().to_string(),
            extractor,
        }
    }
}

#[derive(Debug)]
pub struct SourceSuccess {
    pub source: String,
    pub candidates: Vec<RawCandidate>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct SourceFailure {
    pub source: String,
    pub error: ScraperError,
    pub elapsed: Duration,
}

/// Settled results of a fan-out, in task order
#[derive(Debug, Default)]
pub struct RunOutcomes {
    pub successes: Vec<SourceSuccess>,
    pub failures: Vec<SourceFailure>,
}

impl RunOutcomes {
    /// Candidates from every successful source, in source-visitation order
    pub fn into_candidates(self) -> Vec<RawCandidate> {
        self.successes
            .into_iter()
            .flat_map(|s| s.candidates)
            .collect()
    }

    pub fn candidate_count(&self) -> usize {
        self.successes.iter().map(|s| s.candidates.len()).sum()
    }
}

/// Runs source tasks concurrently without letting one failure touch the others
pub struct Orchestrator {
    fetcher: PageFetcher,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(fetcher: PageFetcher, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn run(&self, tasks: Vec<SourceTask>) -> RunOutcomes {
        let total = tasks.len();
        info!(sources = total, concurrency = self.concurrency, "Starting fetch");

        let mut settled: Vec<(usize, String, Result<Vec<RawCandidate>, ScraperError>, Duration)> =
            stream::iter(tasks.into_iter().enumerate().map(|(idx, task)| {
                let fetcher = self.fetcher.clone();
                let span = info_span!("source", source = %task.name);
                async move {
                    let t0 = Instant::now();
                    let result = task.extractor.extract(&fetcher).await;
                    (idx, task.name, result, t0.elapsed())
                }
                .instrument(span)
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        // Completion order is arbitrary; restore the order sources were listed in
        settled.sort_by_key(|(idx, ..)| *idx);

        let mut outcomes = RunOutcomes::default();
        for (_, source, result, elapsed) in settled {
            match result {
                Ok(candidates) => {
                    info!(
                        source = %source,
                        candidates = candidates.len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Source finished"
                    );
                    metrics::sources::candidates_extracted(candidates.len());
                    outcomes.successes.push(SourceSuccess { source, candidates, elapsed });
                }
                Err(e) => {
                    error!(source = %source, "Source failed, contributing nothing: {}", e);
                    metrics::sources::task_failed();
                    outcomes.failures.push(SourceFailure { source, error: e, elapsed });
                }
            }
        }

        info!(
            succeeded = outcomes.successes.len(),
            failed = outcomes.failures.len(),
            candidates = outcomes.candidate_count(),
            "Fetch complete"
        );
        outcomes
    }
}
