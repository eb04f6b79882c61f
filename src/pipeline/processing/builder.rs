//! Raw candidate to canonical event.

use chrono::{DateTime, NaiveTime, Utc};
use scraper::Html;
use std::collections::HashSet;

use crate::common::constants::DEFAULT_TICKET_LABEL;
use crate::common::types::{CanonicalEvent, Offer, RawCandidate, TicketLink};
use crate::observability::metrics;
use crate::pipeline::processing::address::VenueAddressMap;
use crate::pipeline::processing::datetime::{
    anchor_local, display_local_date_time, display_time, normalize_time_hhmm, DateTimeResolver,
    Resolution, ResolvedWhen,
};

/// Decode HTML entities, drop any stray markup and collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let decoded = if text.contains('&') || text.contains('<') {
        Html::parse_fragment(text)
            .root_element()
            .text()
            .collect::<String>()
    } else {
        text.to_string()
    };
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique by URL, first label wins, blank labels become "Tickets"
pub fn dedupe_tickets(refs: &[TicketLink]) -> Vec<TicketLink> {
    let mut seen = HashSet::new();
    refs.iter()
        .filter_map(|link| {
            let url = link.url.trim();
            if url.is_empty() || !seen.insert(url.to_string()) {
                return None;
            }
            let label = normalize_text(&link.label);
            let label = if label.is_empty() {
                DEFAULT_TICKET_LABEL.to_string()
            } else {
                label
            };
            Some(TicketLink::new(label, url))
        })
        .collect()
}

fn offers_sold_out(offers: &[Offer]) -> bool {
    offers.iter().any(|offer| {
        offer
            .availability
            .as_deref()
            .map(|a| a.to_lowercase().replace([' ', '_', '-'], "").contains("soldout"))
            .unwrap_or(false)
    })
}

fn offers_free(offers: &[Offer]) -> bool {
    offers.iter().any(|offer| match offer.price.as_deref().map(str::trim) {
        Some(price) if price.eq_ignore_ascii_case("free") => true,
        Some(price) => price.parse::<f64>().map(|p| p == 0.0).unwrap_or(false),
        None => false,
    })
}

#[derive(Debug, Clone)]
pub struct EventBuilder {
    resolver: DateTimeResolver,
    addresses: VenueAddressMap,
    default_time: NaiveTime,
}

impl EventBuilder {
    pub fn new(resolver: DateTimeResolver, addresses: VenueAddressMap, default_hour: u32) -> Self {
        Self {
            resolver,
            addresses,
            default_time: NaiveTime::from_hms_opt(default_hour.min(23), 0, 0).unwrap_or_default(),
        }
    }

    pub fn build(&self, candidate: &RawCandidate, scraped_at: DateTime<Utc>) -> CanonicalEvent {
        let resolution = self.resolve(candidate);
        self.assemble(candidate, resolution, scraped_at)
    }

    /// Run the date/time resolver over the candidate's normalized text
    pub fn resolve(&self, candidate: &RawCandidate) -> Resolution {
        self.resolver.resolve(
            &normalize_text(&candidate.date_text),
            &normalize_text(&candidate.time_text),
            candidate.trusted_timestamp.as_deref(),
        )
    }

    /// Build the record from a candidate and its resolution
    pub fn assemble(
        &self,
        candidate: &RawCandidate,
        resolution: Resolution,
        scraped_at: DateTime<Utc>,
    ) -> CanonicalEvent {
        let tz = self.resolver.timezone();
        let title = normalize_text(&candidate.title);
        let venue = normalize_text(&candidate.venue_name);
        let source = normalize_text(&candidate.source_name);
        let date_text = normalize_text(&candidate.date_text);
        let time_text = normalize_text(&candidate.time_text);

        // A bare date only gets a start when no time was offered at all
        let (start, time_uncertain) = match resolution.when {
            ResolvedWhen::Instant(at) => (Some(at), false),
            ResolvedWhen::Date(day) if time_text.is_empty() => {
                let at = anchor_local(day.and_time(self.default_time), tz);
                (at, at.is_some())
            }
            ResolvedWhen::Date(_) | ResolvedWhen::Unresolved => (None, false),
        };

        let end = candidate
            .end_timestamp
            .as_deref()
            .and_then(|raw| self.resolver.parse_trusted(raw))
            .filter(|end| start.map_or(true, |s| *end >= s));

        let display_time = match start {
            Some(at) if !time_uncertain => Some(display_time(at, tz)),
            Some(_) => None,
            None => normalize_time_hhmm(&time_text),
        };

        let raw_address = normalize_text(candidate.address_text.as_deref().unwrap_or(""));
        let address = self.addresses.resolve(&raw_address, &venue, &source);
        if address != raw_address {
            metrics::resolve::address_filled();
        }

        CanonicalEvent {
            source,
            venue,
            url: candidate.url.trim().to_string(),
            title,
            start,
            end,
            date_text,
            time_text,
            address,
            tickets: dedupe_tickets(&candidate.ticket_refs),
            scraped_at,
            sold_out: candidate.sold_out_hint.unwrap_or(false) || offers_sold_out(&candidate.offers),
            free_entry: candidate.free_hint.unwrap_or(false) || offers_free(&candidate.offers),
            display_time,
            display_local_date_time: start.map(|at| display_local_date_time(at, tz)),
            time_uncertain,
        }
    }
}
