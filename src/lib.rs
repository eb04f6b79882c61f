pub mod apis;
pub mod app;
pub mod common;
pub mod config;
pub mod infra;
pub mod observability;
pub mod pipeline;
pub mod storage;

pub use common::error::{Result, ScraperError};
pub use common::types::{CanonicalEvent, Offer, RawCandidate, TicketLink};
pub use config::Config;
pub use pipeline::{EventRun, RunReport};
