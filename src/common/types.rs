use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ticket or booking link attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLink {
    pub label: String,
    pub url: String,
}

impl TicketLink {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Offer metadata as published by a source (schema.org style)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<String>,
}

/// Loosely-typed event fields as yielded by an extractor.
///
/// Everything here is free text straight from the source; nothing is trusted
/// except `trusted_timestamp`/`end_timestamp`, which come from structured
/// metadata on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCandidate {
    pub source_name: String,
    pub venue_name: String,
    pub url: String,
    pub title: String,
    pub date_text: String,
    pub time_text: String,
    pub trusted_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub address_text: Option<String>,
    pub ticket_refs: Vec<TicketLink>,
    pub offers: Vec<Offer>,
    pub sold_out_hint: Option<bool>,
    pub free_hint: Option<bool>,
}

impl RawCandidate {
    pub fn new(source_name: impl Into<String>, venue_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            venue_name: venue_name.into(),
            ..Default::default()
        }
    }
}

/// The fully normalized output record.
///
/// Every field is always serialized; absent values become `null` or `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub source: String,
    pub venue: String,
    pub url: String,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub date_text: String,
    pub time_text: String,
    pub address: String,
    pub tickets: Vec<TicketLink>,
    pub scraped_at: DateTime<Utc>,
    pub sold_out: bool,
    pub free_entry: bool,
    pub display_time: Option<String>,
    pub display_local_date_time: Option<String>,
    #[serde(default)]
    pub time_uncertain: bool,
}

impl CanonicalEvent {
    /// True when the record points at an actual web page rather than a synthetic id
    pub fn has_real_url(&self) -> bool {
        let url = self.url.trim();
        url.starts_with("http://") || url.starts_with("https://")
    }
}
