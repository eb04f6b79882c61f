//! Time-of-day extraction from free text.
//!
//! Prices are removed before anything else so "£10.25" can never be read as
//! 10:25. Only a time with an explicit meridiem, minutes, or a doors label is
//! accepted; a bare hour yields `None`.

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:[£$€]\s*\d+(?:[.,]\d{1,2})?|\b\d+(?:[.,]\d{1,2})?\s*(?:gbp|usd|eur|quid)\b)(?P<tail>\s*(?:-|–|—|to|/)\s*[£$€]?\s*\d+(?:[.,]\d{1,2})?(?:\s*(?:gbp|usd|eur)\b)?)?",
    )
    .expect("price regex")
});

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:from|till late|until late|til late|onwards|start(?:s|ing)?(?: at)?|entry|admission|late)\b")
        .expect("label regex")
});

static NOON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:noon|midday)\b").expect("noon regex"));
static MIDNIGHT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bmidnight\b").expect("midnight regex"));

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?P<h1>\d{1,2})(?:[:.](?P<m1>\d{2}))?\s*(?P<ap1>am|pm)?\s*(?:-|–|—|to|till|until)\s*(?P<h2>\d{1,2})(?:[:.]\d{2})?\s*(?P<ap2>am|pm)\b",
    )
    .expect("range regex")
});
static H12_MIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[:.](\d{2})\s*(am|pm)\b").expect("12h regex"));
// Two-digit hours only: a lone "7.30" could be morning or evening
static H24_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([01]\d|2[0-3])[:.h]([0-5]\d)\b").expect("24h regex"));
static H12_BARE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*(am|pm)\b").expect("bare 12h regex"));
static DOORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bdoors?(?:\s+open)?(?:\s+at)?\s*[:@]?\s*(\d{1,2})(?:[:.](\d{2}))?\b").expect("doors regex")
});

/// Extract a start time from free text, e.g. "£10.25 entry, doors 8pm" -> 20:00
pub fn normalize_time(text: &str) -> Option<NaiveTime> {
    let cleaned = clean_time_text(text);
    if cleaned.is_empty() {
        return None;
    }

    range_start(&cleaned)
        .or_else(|| twelve_hour_with_minutes(&cleaned))
        .or_else(|| doors(&cleaned))
        .or_else(|| twenty_four_hour(&cleaned))
        .or_else(|| bare_twelve_hour(&cleaned))
}

/// `normalize_time` formatted as "HH:MM"
pub fn normalize_time_hhmm(text: &str) -> Option<String> {
    normalize_time(text).map(|t| t.format("%H:%M").to_string())
}

fn clean_time_text(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace("a.m", "am")
        .replace("p.m", "pm");
    let without_prices = strip_prices(&lowered);
    let without_labels = LABEL_RE.replace_all(&without_prices, " ");
    let with_noon = NOON_RE.replace_all(&without_labels, "12:00pm");
    let with_midnight = MIDNIGHT_RE.replace_all(&with_noon, "12:00am");
    with_midnight.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove currency amounts and price ranges. A range tail that is really a
/// time ("£5 - 8pm") is left in place.
pub fn strip_prices(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PRICE_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let mut end = whole.end();
        if let Some(tail) = caps.name("tail") {
            if looks_like_time_suffix(&text[tail.end()..]) {
                end = tail.start();
            }
        }
        out.push_str(&text[last..whole.start()]);
        out.push(' ');
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

fn looks_like_time_suffix(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with("am")
        || rest.starts_with("pm")
        || rest.starts_with(':')
        || (rest.starts_with('.') && rest[1..].starts_with(|c: char| c.is_ascii_digit()))
}

fn to_24h(hour: u32, minute: u32, meridiem: &str) -> Option<NaiveTime> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour_24 = match (meridiem, hour) {
        ("pm", 12) => 12,
        ("pm", h) => h + 12,
        ("am", 12) => 0,
        (_, h) => h,
    };
    NaiveTime::from_hms_opt(hour_24, minute, 0)
}

fn num(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn range_start(text: &str) -> Option<NaiveTime> {
    let caps = RANGE_RE.captures(text)?;
    let h1: u32 = caps.name("h1")?.as_str().parse().ok()?;
    let m1: u32 = caps
        .name("m1")
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let h2: u32 = caps.name("h2")?.as_str().parse().ok()?;
    let ap2 = caps.name("ap2")?.as_str();
    let ap1 = match caps.name("ap1") {
        Some(ap) => ap.as_str(),
        // "10-2am" runs past midnight, so the start is evening
        None if ap2 == "am" && h1 > h2 && h1 != 12 => "pm",
        // "11-1pm" and "10-12pm" start in the morning
        None if ap2 == "pm" && h1 != 12 && (h1 > h2 || h2 == 12) => "am",
        None => ap2,
    };
    to_24h(h1, m1, ap1)
}

fn twelve_hour_with_minutes(text: &str) -> Option<NaiveTime> {
    let caps = H12_MIN_RE.captures(text)?;
    to_24h(num(&caps, 1)?, num(&caps, 2)?, caps.get(3)?.as_str())
}

fn twenty_four_hour(text: &str) -> Option<NaiveTime> {
    let caps = H24_RE.captures(text)?;
    NaiveTime::from_hms_opt(num(&caps, 1)?, num(&caps, 2)?, 0)
}

fn bare_twelve_hour(text: &str) -> Option<NaiveTime> {
    let caps = H12_BARE_RE.captures(text)?;
    to_24h(num(&caps, 1)?, 0, caps.get(2)?.as_str())
}

/// A doors label disambiguates a bare hour: doors open in the evening.
fn doors(text: &str) -> Option<NaiveTime> {
    let caps = DOORS_RE.captures(text)?;
    let hour = num(&caps, 1)?;
    let minute = num(&caps, 2).unwrap_or(0);
    match hour {
        1..=11 => to_24h(hour, minute, "pm"),
        12..=23 => NaiveTime::from_hms_opt(hour, minute, 0),
        _ => None,
    }
}
