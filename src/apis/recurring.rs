//! Synthetic weekly schedule; no network involved.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::debug;

use super::base::Extractor;
use crate::common::constants::{DEFAULT_TICKET_LABEL, RECURRING_URL_SCHEME};
use crate::common::error::{Result, ScraperError};
use crate::common::types::{RawCandidate, TicketLink};
use crate::config::{RecurringSlot, RecurringSourceConfig};
use crate::pipeline::ingestion::fetcher::PageFetcher;

fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// First date on or after `from` that falls on `weekday`
pub fn next_weekday(from: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - from.weekday().num_days_from_monday()) % 7;
    from + Duration::days(i64::from(ahead))
}

#[derive(Debug, Clone)]
struct Slot {
    weekday: Weekday,
    entry: RecurringSlot,
}

pub struct RecurringScheduleExtractor {
    name: String,
    venue: String,
    weeks_ahead: u32,
    slots: Vec<Slot>,
    today: NaiveDate,
}

impl RecurringScheduleExtractor {
    /// `today` is the local date the schedule starts from
    pub fn new(
        name: impl Into<String>,
        venue: impl Into<String>,
        config: &RecurringSourceConfig,
        today: NaiveDate,
    ) -> Result<Self> {
        let slots = config
            .slots
            .iter()
            .map(|entry| {
                let weekday = entry.weekday.trim().parse::<Weekday>().map_err(|_| {
                    ScraperError::Config(format!("unknown weekday {:?} for {:?}", entry.weekday, entry.title))
                })?;
                Ok(Slot {
                    weekday,
                    entry: entry.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.into(),
            venue: venue.into(),
            weeks_ahead: config.weeks_ahead,
            slots,
            today,
        })
    }

    pub fn occurrences(&self) -> Vec<RawCandidate> {
        let mut out = Vec::with_capacity(self.slots.len() * self.weeks_ahead as usize);
        for slot in &self.slots {
            let first = next_weekday(self.today, slot.weekday);
            for week in 0..self.weeks_ahead {
                let day = first + Duration::weeks(i64::from(week));
                out.push(self.candidate(slot, day));
            }
        }
        out.sort_by_key(|c| c.date_text.clone());
        out
    }

    fn candidate(&self, slot: &Slot, day: NaiveDate) -> RawCandidate {
        let mut candidate = RawCandidate::new(self.name.as_str(), self.venue.as_str());
        candidate.title = slot.entry.title.clone();
        candidate.date_text = day.format("%Y-%m-%d").to_string();
        candidate.time_text = slot.entry.time.clone();
        candidate.url = match &slot.entry.url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!(
                "{}{}/{}/{}",
                RECURRING_URL_SCHEME,
                slug(&self.name),
                slug(&slot.entry.title),
                candidate.date_text
            ),
        };
        if let Some(ticket_url) = slot.entry.ticket_url.as_deref().filter(|u| !u.trim().is_empty()) {
            candidate
                .ticket_refs
                .push(TicketLink::new(DEFAULT_TICKET_LABEL, ticket_url.trim()));
        }
        candidate
    }
}

#[async_trait]
impl Extractor for RecurringScheduleExtractor {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, _fetcher: &PageFetcher) -> Result<Vec<RawCandidate>> {
        let candidates = self.occurrences();
        debug!(source = %self.name, "Generated {} weekly occurrences", candidates.len());
        Ok(candidates)
    }
}
