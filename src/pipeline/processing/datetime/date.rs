//! Calendar-date recognition for a bounded set of layouts.
//!
//! Numeric dates are day-first. Parsers here only return dates; pairing with a
//! time and anchoring to the reference zone happens in the resolver.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("ordinal regex"));

static DMY_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})$").expect("dmy regex"));
static ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("iso regex"));
static D_MONTH_Y_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}) ([a-z]+)\.? (\d{4})$").expect("d month y regex"));
static MONTH_D_Y_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]+)\.? (\d{1,2}) (\d{4})$").expect("month d y regex"));
static DM_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})$").expect("dm regex"));
static D_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}) ([a-z]+)\.?$").expect("d month regex"));
static MONTH_D_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]+)\.? (\d{1,2})$").expect("month d regex"));
static WEEKDAY_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:mon|tue|tues|wed|weds|thu|thur|thurs|fri|sat|sun)(?:day|nesday|sday|urday|rsday)?\.? ")
        .expect("weekday regex")
});

const MONTH_ALT: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

static EMBEDDED_ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("embedded iso regex"));
static EMBEDDED_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/(?:\d{4}|\d{2}))?\b").expect("embedded slash regex"));
static EMBEDDED_D_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b\d{{1,2}} (?:{})[a-z]*\.?(?: \d{{4}})?\b", MONTH_ALT))
        .expect("embedded d month regex")
});
static EMBEDDED_MONTH_D_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})[a-z]*\.? \d{{1,2}}(?: \d{{4}})?\b", MONTH_ALT))
        .expect("embedded month d regex")
});

/// A date as read from text; the year may still need inferring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateParts {
    Full(NaiveDate),
    /// (month, day)
    YearLess(u32, u32),
}

/// Lowercase, drop ordinal suffixes and commas, collapse whitespace
pub fn clean_date_text(text: &str) -> String {
    let without_ordinals = ORDINAL_RE.replace_all(text, "$1");
    without_ordinals
        .to_lowercase()
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn month_from_name(name: &str) -> Option<u32> {
    let name = name.trim_end_matches('.');
    let month = match name {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn num(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    match raw.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Whole-input match against the explicit layouts: D/M/YYYY, D/M/YY,
/// YYYY-MM-DD and "D Month YYYY". Expects `clean_date_text` output.
pub fn parse_strict(cleaned: &str) -> Option<NaiveDate> {
    if let Some(caps) = DMY_SLASH_RE.captures(cleaned) {
        let year = expand_year(caps.get(3)?.as_str())?;
        return NaiveDate::from_ymd_opt(year, num(&caps, 2)?, num(&caps, 1)?);
    }
    if let Some(caps) = ISO_RE.captures(cleaned) {
        return NaiveDate::from_ymd_opt(caps.get(1)?.as_str().parse().ok()?, num(&caps, 2)?, num(&caps, 3)?);
    }
    if let Some(caps) = D_MONTH_Y_RE.captures(cleaned) {
        let month = month_from_name(caps.get(2)?.as_str())?;
        return NaiveDate::from_ymd_opt(caps.get(3)?.as_str().parse().ok()?, month, num(&caps, 1)?);
    }
    None
}

/// Wider layouts tried once the strict ones fail: weekday prefixes,
/// "Month D YYYY", slash dates only readable month-first, and year-less forms.
pub fn parse_loose(cleaned: &str) -> Option<DateParts> {
    let text = WEEKDAY_PREFIX_RE.replace(cleaned, "");
    let text = text.trim();

    if let Some(date) = parse_strict(text) {
        return Some(DateParts::Full(date));
    }
    if let Some(caps) = MONTH_D_Y_RE.captures(text) {
        let month = month_from_name(caps.get(1)?.as_str())?;
        return NaiveDate::from_ymd_opt(caps.get(3)?.as_str().parse().ok()?, month, num(&caps, 2)?)
            .map(DateParts::Full);
    }
    if let Some(caps) = DMY_SLASH_RE.captures(text) {
        // Day-first failed above; accept month-first only when it is the sole valid reading
        let (first, second) = (num(&caps, 1)?, num(&caps, 2)?);
        if first <= 12 && second > 12 {
            let year = expand_year(caps.get(3)?.as_str())?;
            return NaiveDate::from_ymd_opt(year, first, second).map(DateParts::Full);
        }
        return None;
    }
    if let Some(caps) = DM_SLASH_RE.captures(text) {
        let (day, month) = (num(&caps, 1)?, num(&caps, 2)?);
        return valid_month_day(month, day).map(|(m, d)| DateParts::YearLess(m, d));
    }
    if let Some(caps) = D_MONTH_RE.captures(text) {
        let month = month_from_name(caps.get(2)?.as_str())?;
        return valid_month_day(month, num(&caps, 1)?).map(|(m, d)| DateParts::YearLess(m, d));
    }
    if let Some(caps) = MONTH_D_RE.captures(text) {
        let month = month_from_name(caps.get(1)?.as_str())?;
        return valid_month_day(month, num(&caps, 2)?).map(|(m, d)| DateParts::YearLess(m, d));
    }
    None
}

fn valid_month_day(month: u32, day: u32) -> Option<(u32, u32)> {
    // 2024 is a leap year, so 29 Feb survives here and is placed later
    NaiveDate::from_ymd_opt(2024, month, day).map(|_| (month, day))
}

/// Locate the first date-shaped fragment anywhere in `text` and parse it.
/// Returns the parts plus the text with the fragment cut out.
pub fn find_embedded(cleaned: &str) -> Option<(DateParts, String)> {
    let patterns: [&Regex; 4] = [
        &*EMBEDDED_ISO_RE,
        &*EMBEDDED_SLASH_RE,
        &*EMBEDDED_D_MONTH_RE,
        &*EMBEDDED_MONTH_D_RE,
    ];
    for re in patterns {
        for m in re.find_iter(cleaned) {
            if let Some(parts) = parse_loose(m.as_str()) {
                let residual = format!("{} {}", &cleaned[..m.start()], &cleaned[m.end()..]);
                return Some((parts, residual));
            }
        }
    }
    None
}
