//! Date/time resolution: free-form listing text to a zone-anchored instant.
//!
//! Stages run in a fixed order and the first one that produces a result wins:
//! trusted timestamp, strict date + time, strict date alone, fuzzy layouts,
//! then an embedded date fragment anywhere in the combined text.

pub mod date;
pub mod time;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::observability::metrics;
use crate::pipeline::processing::cutoff::Cutoff;

use date::DateParts;
pub use time::{normalize_time, normalize_time_hhmm};

/// Which stage produced a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStage {
    Trusted,
    Strict,
    StrictDateOnly,
    Fuzzy,
    Embedded,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolvedWhen {
    /// A full instant; either trusted or a date paired with an explicit time
    Instant(DateTime<Utc>),
    /// A calendar date with no usable time
    Date(NaiveDate),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub when: ResolvedWhen,
    pub stage: ResolveStage,
}

impl Resolution {
    fn new(when: ResolvedWhen, stage: ResolveStage) -> Self {
        Self { when, stage }
    }

    pub fn unresolved() -> Self {
        Self::new(ResolvedWhen::Unresolved, ResolveStage::Unresolved)
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self.when {
            ResolvedWhen::Instant(at) => Some(at),
            _ => None,
        }
    }
}

/// Anchor a local wall-clock time in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant; times inside a
/// spring-forward gap are shifted forward an hour.
pub fn anchor_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// "HH:MM" in the reference zone
pub fn display_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// RFC 3339 with the local offset, e.g. "2025-07-01T20:00:00+01:00"
pub fn display_local_date_time(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

const TRUSTED_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy)]
pub struct DateTimeResolver {
    cutoff: Cutoff,
}

impl DateTimeResolver {
    pub fn new(cutoff: Cutoff) -> Self {
        Self { cutoff }
    }

    pub fn timezone(&self) -> Tz {
        self.cutoff.timezone()
    }

    pub fn resolve(&self, date_text: &str, time_text: &str, trusted: Option<&str>) -> Resolution {
        let resolution = self.resolve_stages(date_text, time_text, trusted);
        match resolution.when {
            ResolvedWhen::Instant(_) => metrics::resolve::instant_resolved(),
            ResolvedWhen::Date(_) => metrics::resolve::date_only(),
            ResolvedWhen::Unresolved => metrics::resolve::unresolved(),
        }
        resolution
    }

    fn resolve_stages(&self, date_text: &str, time_text: &str, trusted: Option<&str>) -> Resolution {
        if let Some(at) = trusted.and_then(|raw| self.parse_trusted(raw)) {
            return Resolution::new(ResolvedWhen::Instant(at), ResolveStage::Trusted);
        }

        let date_text = date_text.trim();
        let time_text = time_text.trim();
        if date_text.is_empty() && time_text.is_empty() {
            return Resolution::unresolved();
        }

        let cleaned_date = date::clean_date_text(date_text);
        let time = normalize_time(time_text);

        if let Some(day) = date::parse_strict(&cleaned_date) {
            if let Some(at) = time.and_then(|t| self.anchor(day, t)) {
                return Resolution::new(ResolvedWhen::Instant(at), ResolveStage::Strict);
            }
            return Resolution::new(ResolvedWhen::Date(day), ResolveStage::StrictDateOnly);
        }

        if let Some(parts) = date::parse_loose(&cleaned_date) {
            if let Some(day) = self.place(parts) {
                return self.pair(day, time, ResolveStage::Fuzzy);
            }
        }

        // Prices go before the fragment search so "£5/7" is never read as a date
        let combined = time::strip_prices(&format!("{} {}", date_text, time_text));
        let combined = date::clean_date_text(&combined);
        if let Some((parts, residual)) = date::find_embedded(&combined) {
            if let Some(day) = self.place(parts) {
                let time = time.or_else(|| normalize_time(&residual));
                return self.pair(day, time, ResolveStage::Embedded);
            }
        }

        Resolution::unresolved()
    }

    fn pair(&self, day: NaiveDate, time: Option<NaiveTime>, stage: ResolveStage) -> Resolution {
        match time.and_then(|t| self.anchor(day, t)) {
            Some(at) => Resolution::new(ResolvedWhen::Instant(at), stage),
            None => Resolution::new(ResolvedWhen::Date(day), stage),
        }
    }

    /// Parse a timestamp from structured page metadata
    pub fn parse_trusted(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
            return Some(dt.with_timezone(&Utc));
        }
        TRUSTED_NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| anchor_local(naive, self.timezone()))
    }

    fn anchor(&self, day: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        anchor_local(day.and_time(time), self.timezone())
    }

    fn place(&self, parts: DateParts) -> Option<NaiveDate> {
        match parts {
            DateParts::Full(day) => Some(day),
            DateParts::YearLess(month, day) => self.infer_year(month, day),
        }
    }

    /// Put a year-less day/month in the cutoff's year, or the next one if that
    /// would already be in the past. 29 Feb in a non-leap year also moves on.
    pub fn infer_year(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let year = self.cutoff.year();
        let today = self.cutoff.local_date();
        match NaiveDate::from_ymd_opt(year, month, day) {
            Some(candidate) if candidate >= today => Some(candidate),
            _ => (1..=4).find_map(|offset| NaiveDate::from_ymd_opt(year + offset, month, day)),
        }
    }
}
