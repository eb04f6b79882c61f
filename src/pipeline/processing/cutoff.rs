use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::common::types::CanonicalEvent;
use crate::pipeline::processing::datetime::{anchor_local, local_date};

/// Start of the current day in the reference zone, fixed once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff {
    instant: DateTime<Utc>,
    tz: Tz,
}

impl Cutoff {
    pub fn start_of_day(now: DateTime<Utc>, tz: Tz) -> Self {
        let instant = local_date(now, tz)
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| anchor_local(midnight, tz))
            .unwrap_or(now);
        Self { instant, tz }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn local_date(&self) -> NaiveDate {
        local_date(self.instant, self.tz)
    }

    pub fn year(&self) -> i32 {
        self.local_date().year()
    }

    /// Dated events keep when they start at or after the cutoff; undated always keep
    pub fn keeps(&self, event: &CanonicalEvent) -> bool {
        event.start.map_or(true, |start| start >= self.instant)
    }

    /// Returns the kept events and how many were dropped
    pub fn apply(&self, events: Vec<CanonicalEvent>) -> (Vec<CanonicalEvent>, usize) {
        let before = events.len();
        let kept: Vec<CanonicalEvent> = events.into_iter().filter(|e| self.keeps(e)).collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }
}

/// Chronological by start, undated last; ties keep their input order
pub fn sort_for_output(events: &mut [CanonicalEvent]) {
    events.sort_by_key(|e| (e.start.is_none(), e.start));
}
