pub mod fetcher;
pub mod orchestrator;
pub mod retry;

pub use fetcher::PageFetcher;
pub use orchestrator::{Orchestrator, RunOutcomes, SourceTask};
pub use retry::{with_retry, RetryPolicy};
