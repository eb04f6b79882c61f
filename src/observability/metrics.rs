//! Metrics for the scraper run.
//!
//! Thin helpers over the `metrics` facade so call sites never spell out raw
//! metric names. Without an installed recorder every call is a no-op.

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources metrics
    SourcesRequestsSuccess,
    SourcesRequestsError,
    SourcesRequestRetries,
    SourcesRequestDuration,
    SourcesPayloadBytes,
    SourcesTasksFailed,
    SourcesCandidatesExtracted,
    SourcesCandidatesSkipped,

    // Resolve metrics
    ResolveInstantResolved,
    ResolveDateOnly,
    ResolveUnresolved,
    ResolveAddressFilled,

    // Dedupe metrics
    DedupeRecordsMerged,
    DedupeSnapshotRetained,
    DedupeCutoffDropped,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    /// Get the metric name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRequestsSuccess => "events_sources_requests_success_total",
            MetricName::SourcesRequestsError => "events_sources_requests_error_total",
            MetricName::SourcesRequestRetries => "events_sources_request_retries_total",
            MetricName::SourcesRequestDuration => "events_sources_request_duration_seconds",
            MetricName::SourcesPayloadBytes => "events_sources_payload_bytes",
            MetricName::SourcesTasksFailed => "events_sources_tasks_failed_total",
            MetricName::SourcesCandidatesExtracted => "events_sources_candidates_extracted_total",
            MetricName::SourcesCandidatesSkipped => "events_sources_candidates_skipped_total",

            MetricName::ResolveInstantResolved => "events_resolve_instant_total",
            MetricName::ResolveDateOnly => "events_resolve_date_only_total",
            MetricName::ResolveUnresolved => "events_resolve_unresolved_total",
            MetricName::ResolveAddressFilled => "events_resolve_address_filled_total",

            MetricName::DedupeRecordsMerged => "events_dedupe_records_merged_total",
            MetricName::DedupeSnapshotRetained => "events_dedupe_snapshot_retained_total",
            MetricName::DedupeCutoffDropped => "events_dedupe_cutoff_dropped_total",
        }
    }
}

// ============================================================================
// Sources Metrics
// ============================================================================

pub mod sources {
    use super::MetricName;

    /// Record a successful request
    pub fn request_success() {
        ::metrics::counter!(MetricName::SourcesRequestsSuccess.as_str()).increment(1);
    }

    /// Record a failed request attempt
    pub fn request_error() {
        ::metrics::counter!(MetricName::SourcesRequestsError.as_str()).increment(1);
    }

    pub fn request_retry() {
        ::metrics::counter!(MetricName::SourcesRequestRetries.as_str()).increment(1);
    }

    /// Record request duration
    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::SourcesRequestDuration.as_str()).record(secs);
    }

    /// Record payload size
    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::SourcesPayloadBytes.as_str()).record(bytes as f64);
    }

    pub fn task_failed() {
        ::metrics::counter!(MetricName::SourcesTasksFailed.as_str()).increment(1);
    }

    pub fn candidates_extracted(count: usize) {
        ::metrics::counter!(MetricName::SourcesCandidatesExtracted.as_str()).increment(count as u64);
    }

    pub fn candidate_skipped() {
        ::metrics::counter!(MetricName::SourcesCandidatesSkipped.as_str()).increment(1);
    }
}

// ============================================================================
// Resolve Metrics
// ============================================================================

pub mod resolve {
    use super::MetricName;

    pub fn instant_resolved() {
        ::metrics::counter!(MetricName::ResolveInstantResolved.as_str()).increment(1);
    }

    pub fn date_only() {
        ::metrics::counter!(MetricName::ResolveDateOnly.as_str()).increment(1);
    }

    pub fn unresolved() {
        ::metrics::counter!(MetricName::ResolveUnresolved.as_str()).increment(1);
    }

    pub fn address_filled() {
        ::metrics::counter!(MetricName::ResolveAddressFilled.as_str()).increment(1);
    }
}

// ============================================================================
// Dedupe Metrics
// ============================================================================

pub mod dedupe {
    use super::MetricName;

    pub fn records_merged(count: usize) {
        ::metrics::counter!(MetricName::DedupeRecordsMerged.as_str()).increment(count as u64);
    }

    pub fn snapshot_retained(count: usize) {
        ::metrics::counter!(MetricName::DedupeSnapshotRetained.as_str()).increment(count as u64);
    }

    pub fn cutoff_dropped(count: usize) {
        ::metrics::counter!(MetricName::DedupeCutoffDropped.as_str()).increment(count as u64);
    }
}
