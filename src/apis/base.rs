use crate::common::error::Result;
use crate::common::types::RawCandidate;
use crate::pipeline::ingestion::fetcher::PageFetcher;

/// Core trait that every event source implements
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Configured source name; unique within a run
    fn source_name(&self) -> &str;

    /// Fetch the source and yield one candidate per event found.
    ///
    /// Per-candidate problems are logged and skipped inside the extractor;
    /// an `Err` means the whole source produced nothing this run.
    async fn extract(&self, fetcher: &PageFetcher) -> Result<Vec<RawCandidate>>;
}
