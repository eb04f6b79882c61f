//! Venue address lookup.
//!
//! The table is built once from `[[venues]]` config and only read afterwards.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::VenueConfig;

static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[A-Z]{1,2}\d[A-Z\d]?\s*\d[A-Z]{2}\b").expect("postcode regex")
});

#[derive(Debug, Clone)]
struct VenueEntry {
    name: String,
    address: String,
    /// Lowercased canonical name followed by lowercased aliases
    keys: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VenueAddressMap {
    entries: Vec<VenueEntry>,
    city: Option<String>,
}

impl VenueAddressMap {
    pub fn new(venues: &[VenueConfig], city: Option<&str>) -> Self {
        let entries = venues
            .iter()
            .map(|venue| {
                let mut keys = vec![venue.name.trim().to_lowercase()];
                keys.extend(
                    venue
                        .aliases
                        .iter()
                        .map(|alias| alias.trim().to_lowercase())
                        .filter(|alias| !alias.is_empty()),
                );
                VenueEntry {
                    name: venue.name.trim().to_string(),
                    address: venue.address.trim().to_string(),
                    keys,
                }
            })
            .collect();

        Self {
            entries,
            city: city
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the text already reads like a full postal address
    pub fn looks_complete(&self, address: &str) -> bool {
        if POSTCODE_RE.is_match(address) {
            return true;
        }
        match &self.city {
            Some(city) => address
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == city),
            None => false,
        }
    }

    /// Fill in an address for an event.
    ///
    /// Complete addresses pass through. Otherwise the venue name, then the source
    /// name, is matched exactly against canonical names and aliases; failing that
    /// the first key contained in either name wins. Unknown venues keep `raw`.
    pub fn resolve(&self, raw: &str, venue: &str, source: &str) -> String {
        let raw = raw.trim();
        if !raw.is_empty() && self.looks_complete(raw) {
            return raw.to_string();
        }
        match self.lookup(venue, source) {
            Some(entry) if !entry.address.is_empty() => entry.address.clone(),
            _ => raw.to_string(),
        }
    }

    /// Canonical venue name for a venue or source label, if known
    pub fn canonical_venue(&self, name: &str) -> Option<&str> {
        self.lookup(name, "").map(|entry| entry.name.as_str())
    }

    fn lookup(&self, venue: &str, source: &str) -> Option<&VenueEntry> {
        let venue = venue.trim().to_lowercase();
        let source = source.trim().to_lowercase();

        for name in [&venue, &source] {
            if name.is_empty() {
                continue;
            }
            if let Some(entry) = self.entries.iter().find(|e| e.keys.iter().any(|k| k == name)) {
                return Some(entry);
            }
        }

        self.entries.iter().find(|entry| {
            entry.keys.iter().any(|key| {
                (!venue.is_empty() && venue.contains(key.as_str()))
                    || (!source.is_empty() && source.contains(key.as_str()))
            })
        })
    }
}
