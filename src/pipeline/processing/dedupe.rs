//! Collapsing records that describe the same real-world event.
//!
//! Two passes, both order-preserving: first the recurring-slot merge across
//! sources that publish the same weekly event, then the title/date/venue key.
//! A recurring group is reduced with [`merge`]; a key group keeps its first
//! record and only gains tickets and a time from the rest ([`fold_into_first`]).

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::common::constants::UNDATED_KEY;
use crate::common::types::CanonicalEvent;
use crate::pipeline::processing::address::VenueAddressMap;
use crate::pipeline::processing::datetime::local_date;

/// `lower(title)|local date or "undated"|lower(venue)`
pub fn dedupe_key(event: &CanonicalEvent, tz: Tz) -> String {
    let day = event
        .start
        .map(|start| local_date(start, tz).to_string())
        .unwrap_or_else(|| UNDATED_KEY.to_string());
    format!(
        "{}|{}|{}",
        event.title.trim().to_lowercase(),
        day,
        event.venue.trim().to_lowercase()
    )
}

/// Reduce a recurring-slot group to one record.
///
/// The first member with a real URL or any tickets wins (else the first member);
/// every distinct ticket URL in the group is carried over and a missing time
/// is borrowed from the others. Returns `None` for an empty group.
pub fn merge(group: &[CanonicalEvent]) -> Option<CanonicalEvent> {
    let winner = group
        .iter()
        .find(|e| e.has_real_url() || !e.tickets.is_empty())
        .or_else(|| group.first())?;
    Some(absorb(winner.clone(), group))
}

/// Reduce a key group to its first record, adding the group's tickets and a
/// missing time. The first record's own fields are never replaced.
pub fn fold_into_first(group: &[CanonicalEvent]) -> Option<CanonicalEvent> {
    let first = group.first()?;
    Some(absorb(first.clone(), group))
}

fn absorb(mut merged: CanonicalEvent, group: &[CanonicalEvent]) -> CanonicalEvent {
    let mut seen: HashSet<String> = merged.tickets.iter().map(|t| t.url.clone()).collect();
    for other in group {
        for ticket in &other.tickets {
            if seen.insert(ticket.url.clone()) {
                merged.tickets.push(ticket.clone());
            }
        }
    }

    if merged.display_time.is_none() {
        borrow_time(&mut merged, group);
    }
    merged
}

/// Take the start and its display fields from a member whose time is real,
/// so `displayTime` always agrees with `start`.
fn borrow_time(merged: &mut CanonicalEvent, group: &[CanonicalEvent]) {
    let donor = group
        .iter()
        .find(|e| e.start.is_some() && e.display_time.is_some() && !e.time_uncertain);
    let Some(donor) = donor else { return };

    merged.start = donor.start;
    merged.display_time = donor.display_time.clone();
    merged.display_local_date_time = donor.display_local_date_time.clone();
    merged.time_uncertain = false;
    if merged.end.zip(merged.start).is_some_and(|(end, start)| end < start) {
        merged.end = None;
    }
}

/// Group by `key_of` and hand every group larger than one to `reduce`.
/// A reduced group takes its first member's position; when `reduce` declines
/// (returns `None`) the members stay where they were. Returns the records and
/// how many were folded away.
fn collapse<K, F, R>(events: Vec<CanonicalEvent>, key_of: F, reduce: R) -> (Vec<CanonicalEvent>, usize)
where
    K: Eq + Hash,
    F: Fn(&CanonicalEvent) -> Option<K>,
    R: Fn(&[CanonicalEvent]) -> Option<CanonicalEvent>,
{
    let total = events.len();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of: Vec<Option<usize>> = Vec::with_capacity(total);
    let mut index: HashMap<K, usize> = HashMap::new();

    for (i, event) in events.iter().enumerate() {
        let slot = key_of(event).map(|key| {
            *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            })
        });
        if let Some(slot) = slot {
            groups[slot].push(i);
        }
        group_of.push(slot);
    }

    let mut reduced: Vec<Option<CanonicalEvent>> = groups
        .iter()
        .map(|members| {
            if members.len() < 2 {
                return None;
            }
            let group: Vec<CanonicalEvent> = members.iter().map(|&i| events[i].clone()).collect();
            reduce(&group)
        })
        .collect();

    let is_reduced: Vec<bool> = reduced.iter().map(Option::is_some).collect();
    let mut out = Vec::with_capacity(total);
    for (i, event) in events.into_iter().enumerate() {
        match group_of[i] {
            Some(slot) if is_reduced[slot] => {
                if groups[slot][0] == i {
                    out.extend(reduced[slot].take());
                }
            }
            _ => out.push(event),
        }
    }
    let folded = total - out.len();
    (out, folded)
}

#[derive(Debug, Clone)]
pub struct DedupeEngine {
    tz: Tz,
    recurring_sources: HashSet<String>,
    venues: VenueAddressMap,
}

impl DedupeEngine {
    pub fn new(tz: Tz, recurring_sources: HashSet<String>, venues: VenueAddressMap) -> Self {
        Self {
            tz,
            recurring_sources,
            venues,
        }
    }

    fn canonical_venue(&self, venue: &str) -> String {
        self.venues
            .canonical_venue(venue)
            .unwrap_or(venue)
            .trim()
            .to_lowercase()
    }

    fn recurring_key(&self, event: &CanonicalEvent) -> Option<(NaiveDate, String)> {
        if !self.recurring_sources.contains(&event.source) {
            return None;
        }
        let start = event.start?;
        Some((local_date(start, self.tz), self.canonical_venue(&event.venue)))
    }

    /// Same weekly slot published by more than one recurring source.
    ///
    /// A group merges only when every member comes from a different source and
    /// all members start at the same instant. Anything else (one source listing
    /// two events that day, or different start times) is not one slot, so the
    /// records pass through untouched.
    pub fn merge_recurring(&self, events: Vec<CanonicalEvent>) -> (Vec<CanonicalEvent>, usize) {
        collapse(events, |e| self.recurring_key(e), |group| {
            let sources: HashSet<&str> = group.iter().map(|e| e.source.as_str()).collect();
            let same_start = group.iter().all(|e| e.start == group[0].start);
            if sources.len() == group.len() && same_start {
                merge(group)
            } else {
                None
            }
        })
    }

    /// First record per key wins
    pub fn dedupe_by_key(&self, events: Vec<CanonicalEvent>) -> (Vec<CanonicalEvent>, usize) {
        collapse(events, |e| Some(dedupe_key(e, self.tz)), fold_into_first)
    }

    /// Both passes. Returns the surviving records and the number merged away.
    pub fn run(&self, events: Vec<CanonicalEvent>) -> (Vec<CanonicalEvent>, usize) {
        let (events, recurring) = self.merge_recurring(events);
        let (events, keyed) = self.dedupe_by_key(events);
        (events, recurring + keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::TicketLink;
    use crate::config::VenueConfig;
    use chrono::{DateTime, Utc};
    use chrono_tz::Europe::London;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn event(source: &str, title: &str, venue: &str, url: &str, start: Option<&str>) -> CanonicalEvent {
        CanonicalEvent {
            source: source.into(),
            title: title.into(),
            venue: venue.into(),
            url: url.into(),
            start: start.map(utc),
            ..CanonicalEvent::default()
        }
    }

    fn engine() -> DedupeEngine {
        let venues = vec![VenueConfig {
            name: "The Tavern".into(),
            address: "12 High Street".into(),
            aliases: vec!["tavern".into()],
        }];
        let recurring: HashSet<String> = ["Tavern Sheet", "Tavern Weekly"].iter().map(|s| s.to_string()).collect();
        DedupeEngine::new(London, recurring, VenueAddressMap::new(&venues, None))
    }

    #[test]
    fn test_key_uses_local_date() {
        let e = event("s", "Late Show", "The Tavern", "", Some("2025-07-01T23:30:00Z"));
        assert_eq!(dedupe_key(&e, London), "late show|2025-07-02|the tavern");
        let undated = event("s", "Quiz", "Tavern", "", None);
        assert_eq!(dedupe_key(&undated, London), "quiz|undated|tavern");
    }

    #[test]
    fn test_merge_prefers_real_url_and_unions_tickets() {
        let mut a = event("a", "Quiz", "The Tavern", "recurring://a/quiz", Some("2025-11-02T19:00:00Z"));
        a.display_time = Some("19:00".into());
        a.tickets = vec![TicketLink::new("Tickets", "https://tix.test/a")];
        let mut b = event("b", "Quiz", "The Tavern", "https://tavern.test/quiz", Some("2025-11-02T19:00:00Z"));
        b.tickets = vec![
            TicketLink::new("Book", "https://tix.test/b"),
            TicketLink::new("Tickets", "https://tix.test/a"),
        ];

        // a has tickets, so it is the first qualifying member
        let merged = merge(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(merged.source, "a");
        assert_eq!(merged.tickets.len(), 2);

        a.tickets.clear();
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged.url, "https://tavern.test/quiz");
        assert_eq!(merged.display_time.as_deref(), Some("19:00"));
        let urls: Vec<&str> = merged.tickets.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["https://tix.test/b", "https://tix.test/a"]);
    }

    #[test]
    fn test_merge_empty_group() {
        assert!(merge(&[]).is_none());
    }

    #[test]
    fn test_first_occurrence_position_is_kept() {
        let events = vec![
            event("a", "Quiz", "The Tavern", "", Some("2025-11-02T19:00:00Z")),
            event("a", "Bingo", "The Tavern", "", Some("2025-11-02T19:00:00Z")),
            event("b", "QUIZ ", "the tavern", "https://x.test/q", Some("2025-11-02T20:00:00Z")),
            event("b", "Open Mic", "Elsewhere", "", None),
        ];
        let (out, merged) = engine().run(events);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Quiz", "Bingo", "Open Mic"]);
        assert_eq!(merged, 1);
        assert_eq!(out[0].source, "a");
        assert_eq!(out[0].url, "");
    }

    #[test]
    fn test_key_group_keeps_first_record_and_gains_tickets() {
        let mut fresh = event("a", "Gig", "Hall", "", Some("2025-11-05T20:00:00Z"));
        fresh.sold_out = true;
        let mut stale = event("a", "Gig", "Hall", "https://hall.test/gig", Some("2025-11-05T20:00:00Z"));
        stale.tickets = vec![TicketLink::new("Tickets", "https://tix.test/gig")];

        let merged = fold_into_first(&[fresh, stale]).unwrap();
        assert!(merged.sold_out);
        assert_eq!(merged.url, "");
        assert_eq!(merged.tickets, vec![TicketLink::new("Tickets", "https://tix.test/gig")]);
    }

    #[test]
    fn test_same_source_same_day_rows_are_not_merged() {
        let mut lunch = event("Tavern Sheet", "Sunday Lunch", "The Tavern", "", Some("2025-11-02T12:00:00Z"));
        lunch.tickets = vec![TicketLink::new("Tickets", "https://tix.test/lunch")];
        let mut quiz = event("Tavern Sheet", "Pub Quiz", "The Tavern", "", Some("2025-11-02T20:00:00Z"));
        quiz.tickets = vec![TicketLink::new("Tickets", "https://tix.test/quiz")];
        let weekly = event("Tavern Weekly", "Sunday Lunch", "The Tavern", "recurring://tavern/lunch/2025-11-02", Some("2025-11-02T12:00:00Z"));

        let (out, merged) = engine().merge_recurring(vec![weekly.clone(), lunch.clone(), quiz.clone()]);
        assert_eq!(merged, 0);
        let titles: Vec<&str> = out.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sunday Lunch", "Sunday Lunch", "Pub Quiz"]);
        assert_eq!(out[2].tickets, vec![TicketLink::new("Tickets", "https://tix.test/quiz")]);

        // The key pass folds the lunches; a second run must not then fold the quiz in
        let e = engine();
        let (once, merged) = e.run(vec![weekly, lunch, quiz]);
        assert_eq!(merged, 1);
        let (twice, merged_again) = e.run(once.clone());
        assert_eq!(merged_again, 0);
        assert_eq!(once, twice);
        let titles: Vec<&str> = twice.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Sunday Lunch", "Pub Quiz"]);
        assert_eq!(twice[0].tickets, vec![TicketLink::new("Tickets", "https://tix.test/lunch")]);
    }

    #[test]
    fn test_recurring_members_at_different_times_are_not_merged() {
        let lunch = event("Tavern Weekly", "Sunday Lunch", "Tavern", "recurring://t/l", Some("2025-11-02T12:00:00Z"));
        let quiz = event("Tavern Sheet", "Pub Quiz", "The Tavern", "https://sheet.test/q", Some("2025-11-02T20:00:00Z"));
        let (out, merged) = engine().run(vec![lunch.clone(), quiz.clone()]);
        assert_eq!(merged, 0);
        assert_eq!(out, vec![lunch, quiz]);
    }

    #[test]
    fn test_borrowed_time_carries_its_start() {
        let mut guessed = event("Tavern Sheet", "Roast", "The Tavern", "https://sheet.test/4", Some("2025-11-02T19:00:00Z"));
        guessed.time_uncertain = true;
        guessed.display_local_date_time = Some("2025-11-02T19:00:00+00:00".into());
        let mut timed = event("Tavern Weekly", "Sunday Lunch", "Tavern", "recurring://t/l", Some("2025-11-02T12:00:00Z"));
        timed.display_time = Some("12:00".into());
        timed.display_local_date_time = Some("2025-11-02T12:00:00+00:00".into());

        let merged = merge(&[guessed, timed]).unwrap();
        assert_eq!(merged.url, "https://sheet.test/4");
        assert_eq!(merged.start, Some(utc("2025-11-02T12:00:00Z")));
        assert_eq!(merged.display_time.as_deref(), Some("12:00"));
        assert_eq!(merged.display_local_date_time.as_deref(), Some("2025-11-02T12:00:00+00:00"));
        assert!(!merged.time_uncertain);
    }

    #[test]
    fn test_recurring_sources_merge_across_titles() {
        let mut sheet = event("Tavern Sheet", "Sunday Roast & Quiz", "The Tavern", "https://sheet.test/row/4", Some("2025-11-02T12:00:00Z"));
        sheet.tickets = vec![TicketLink::new("Tickets", "https://tix.test/roast")];
        let mut weekly = event("Tavern Weekly", "Sunday Lunch", "Tavern", "recurring://tavern/lunch/2025-11-02", Some("2025-11-02T12:00:00Z"));
        weekly.display_time = Some("12:00".into());
        let other_day = event("Tavern Weekly", "Sunday Lunch", "Tavern", "recurring://tavern/lunch/2025-11-09", Some("2025-11-09T12:00:00Z"));
        let not_recurring = event("Site", "Sunday Lunch", "Tavern", "https://site.test/lunch", Some("2025-11-02T12:00:00Z"));

        let (out, merged) = engine().run(vec![weekly, sheet, other_day, not_recurring]);
        assert_eq!(merged, 1);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].source, "Tavern Sheet");
        assert_eq!(out[0].display_time.as_deref(), Some("12:00"));
        assert_eq!(out[1].url, "recurring://tavern/lunch/2025-11-09");
        assert_eq!(out[2].source, "Site");
    }

    #[test]
    fn test_engine_is_idempotent() {
        let events = vec![
            event("Tavern Sheet", "Quiz", "The Tavern", "https://a.test/1", Some("2025-11-02T19:00:00Z")),
            event("Tavern Weekly", "Quiz Night", "Tavern", "recurring://t/q", Some("2025-11-02T19:00:00Z")),
            event("x", "Quiz", "The Tavern", "https://b.test/1", Some("2025-11-02T21:00:00Z")),
            event("y", "Gig", "Hall", "", None),
            event("z", "gig", "hall", "https://c.test/gig", None),
        ];
        let e = engine();
        let (once, _) = e.run(events);
        let (twice, merged_again) = e.run(once.clone());
        assert_eq!(once, twice);
        assert_eq!(merged_again, 0);
    }
}
