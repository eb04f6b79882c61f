use std::collections::HashSet;
use tracing::debug;

use crate::common::types::CanonicalEvent;
use crate::pipeline::processing::dedupe::DedupeEngine;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub events: Vec<CanonicalEvent>,
    /// Snapshot records carried forward because this run did not refetch them
    pub retained: usize,
    /// Records folded away by the dedupe pass over fresh + retained
    pub merged: usize,
}

/// Fold this run's records into the previous snapshot.
///
/// Snapshot records whose URL was refetched are replaced by the fresh ones;
/// everything else in the snapshot is kept regardless of age. An empty URL
/// never counts as refetched. Fresh records
/// come first so they win ties in the dedupe pass.
pub fn reconcile(
    fresh: Vec<CanonicalEvent>,
    snapshot: Vec<CanonicalEvent>,
    engine: &DedupeEngine,
) -> Reconciled {
    let fresh_urls: HashSet<&str> = fresh
        .iter()
        .map(|e| e.url.as_str())
        .filter(|url| !url.is_empty())
        .collect();
    let retained: Vec<CanonicalEvent> = snapshot
        .into_iter()
        .filter(|e| !fresh_urls.contains(e.url.as_str()))
        .collect();
    let retained_count = retained.len();
    debug!(fresh = fresh.len(), retained = retained_count, "Reconciling with snapshot");

    let mut combined = fresh;
    combined.extend(retained);
    let (events, merged) = engine.run(combined);

    Reconciled {
        events,
        retained: retained_count,
        merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::TicketLink;
    use crate::pipeline::processing::address::VenueAddressMap;
    use chrono::{DateTime, Utc};
    use chrono_tz::Europe::London;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn event(url: &str, title: &str, start: &str) -> CanonicalEvent {
        CanonicalEvent {
            source: "site".into(),
            venue: "Hall".into(),
            url: url.into(),
            title: title.into(),
            start: Some(utc(start)),
            ..CanonicalEvent::default()
        }
    }

    fn engine() -> DedupeEngine {
        DedupeEngine::new(London, HashSet::new(), VenueAddressMap::default())
    }

    #[test]
    fn test_fresh_replaces_stale_and_others_survive() {
        let stale_u1 = event("https://x.test/u1", "Gig", "2025-11-05T20:00:00Z");
        let u2 = event("https://x.test/u2", "Jam", "2025-11-06T20:00:00Z");
        let u3 = event("https://x.test/u3", "Folk", "2025-11-07T20:00:00Z");
        let mut fresh_u1 = event("https://x.test/u1", "Gig (moved)", "2025-11-08T20:00:00Z");
        fresh_u1.display_time = Some("20:00".into());

        let out = reconcile(vec![fresh_u1.clone()], vec![stale_u1, u2.clone(), u3.clone()], &engine());
        assert_eq!(out.events, vec![fresh_u1, u2, u3]);
        assert_eq!(out.retained, 2);
        assert_eq!(out.merged, 0);
    }

    #[test]
    fn test_blank_urls_do_not_evict_snapshot_records() {
        let fresh = event("", "New", "2025-11-05T20:00:00Z");
        let stale = event("", "Old", "2025-11-06T20:00:00Z");
        let out = reconcile(vec![fresh.clone()], vec![stale.clone()], &engine());
        assert_eq!(out.events, vec![fresh, stale]);
        assert_eq!(out.retained, 1);
    }

    #[test]
    fn test_empty_snapshot_and_empty_fresh() {
        let a = event("https://x.test/a", "A", "2025-11-05T20:00:00Z");
        let out = reconcile(vec![a.clone()], Vec::new(), &engine());
        assert_eq!(out.events, vec![a.clone()]);

        let out = reconcile(Vec::new(), vec![a.clone()], &engine());
        assert_eq!(out.events, vec![a]);
        assert_eq!(out.retained, 1);
    }

    #[test]
    fn test_retained_duplicate_of_fresh_collapses() {
        let fresh = event("https://x.test/new-url", "Gig", "2025-11-05T20:00:00Z");
        let stale = event("https://x.test/old-url", "Gig", "2025-11-05T20:00:00Z");
        let out = reconcile(vec![fresh.clone()], vec![stale], &engine());
        assert_eq!(out.events, vec![fresh]);
        assert_eq!(out.merged, 1);
    }

    #[test]
    fn test_stale_duplicate_with_tickets_does_not_replace_fresh() {
        let mut fresh = event("", "Gig", "2025-11-05T20:00:00Z");
        fresh.sold_out = true;
        fresh.scraped_at = utc("2025-11-02T09:00:00Z");
        let mut stale = event("https://x.test/gig", "Gig", "2025-11-05T20:00:00Z");
        stale.tickets = vec![TicketLink::new("Tickets", "https://tix.test/gig")];
        stale.scraped_at = utc("2025-10-01T09:00:00Z");

        let out = reconcile(vec![fresh], vec![stale], &engine());
        assert_eq!(out.events.len(), 1);
        let kept = &out.events[0];
        assert!(kept.sold_out);
        assert_eq!(kept.scraped_at, utc("2025-11-02T09:00:00Z"));
        assert_eq!(kept.tickets, vec![TicketLink::new("Tickets", "https://tix.test/gig")]);
    }
}
