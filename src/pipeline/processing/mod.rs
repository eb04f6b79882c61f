//! Source-agnostic processing: resolution, building, dedupe, reconciliation, cutoff

pub mod address;
pub mod builder;
pub mod cutoff;
pub mod datetime;
pub mod dedupe;
pub mod reconcile;

pub use address::VenueAddressMap;
pub use builder::EventBuilder;
pub use cutoff::{sort_for_output, Cutoff};
pub use datetime::{DateTimeResolver, Resolution, ResolvedWhen};
pub use dedupe::{dedupe_key, merge, DedupeEngine};
pub use reconcile::{reconcile, Reconciled};
