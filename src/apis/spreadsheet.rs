//! Published-spreadsheet source: one event per CSV row.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use super::base::Extractor;
use super::csv::parse_rows;
use crate::common::constants::DEFAULT_TICKET_LABEL;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Offer, RawCandidate, TicketLink};
use crate::observability::metrics;
use crate::pipeline::ingestion::fetcher::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Title,
    Date,
    Time,
    Url,
    Tickets,
    Price,
    Venue,
    Address,
    End,
}

/// Header words per logical column, checked in this order so that
/// "ticket price" is a price and "end time" is not a start time.
const SYNONYMS: &[(Column, &[&str])] = &[
    (Column::End, &["end", "ends", "finish", "finishes", "until"]),
    (Column::Price, &["price", "prices", "cost", "fee", "entry", "admission"]),
    (Column::Tickets, &["ticket", "tickets", "booking", "book", "buy"]),
    (Column::Address, &["address", "postcode"]),
    (Column::Url, &["url", "link", "website", "web", "page", "info"]),
    (Column::Date, &["date", "day", "when"]),
    (Column::Time, &["time", "start", "starts", "doors"]),
    (Column::Venue, &["venue", "location", "where", "place"]),
    (Column::Title, &["title", "event", "name", "what", "act", "artist", "headliner", "show"]),
];

fn classify(header: &str) -> Option<Column> {
    let lowered = header.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.iter().any(|s| words.contains(s)))
        .map(|(column, _)| *column)
}

/// Which CSV column feeds each field; the leftmost matching header wins
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMap {
    title: Option<usize>,
    date: Option<usize>,
    time: Option<usize>,
    url: Option<usize>,
    tickets: Option<usize>,
    price: Option<usize>,
    venue: Option<usize>,
    address: Option<usize>,
    end: Option<usize>,
    width: usize,
}

impl HeaderMap {
    pub fn from_headers(headers: &[String]) -> Self {
        let mut map = HeaderMap {
            width: headers.len(),
            ..Default::default()
        };
        for (idx, header) in headers.iter().enumerate() {
            let slot = match classify(header) {
                Some(Column::Title) => &mut map.title,
                Some(Column::Date) => &mut map.date,
                Some(Column::Time) => &mut map.time,
                Some(Column::Url) => &mut map.url,
                Some(Column::Tickets) => &mut map.tickets,
                Some(Column::Price) => &mut map.price,
                Some(Column::Venue) => &mut map.venue,
                Some(Column::Address) => &mut map.address,
                Some(Column::End) => &mut map.end,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(idx);
            }
        }
        map
    }

    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }
}

fn cell(row: &[String], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn looks_like_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

fn currency_of(price: &str) -> Option<String> {
    let code = if price.contains('£') {
        "GBP"
    } else if price.contains('€') {
        "EUR"
    } else if price.contains('$') {
        "USD"
    } else {
        return None;
    };
    Some(code.to_string())
}

pub struct SpreadsheetExtractor {
    name: String,
    venue: String,
    csv_url: String,
}

impl SpreadsheetExtractor {
    pub fn new(name: impl Into<String>, venue: impl Into<String>, csv_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            venue: venue.into(),
            csv_url: csv_url.into(),
        }
    }

    /// Turn CSV text into candidates. Bad rows are logged and skipped.
    pub fn candidates_from_csv(&self, text: &str) -> Result<Vec<RawCandidate>> {
        let mut rows = parse_rows(text, ',').into_iter();
        let headers = rows.next().ok_or_else(|| ScraperError::Csv {
            row: 1,
            message: "sheet is empty".into(),
        })?;
        let map = HeaderMap::from_headers(&headers);
        if !map.has_title() {
            return Err(ScraperError::Csv {
                row: 1,
                message: format!("no title column among {:?}", headers),
            });
        }

        let mut candidates = Vec::new();
        // Header is sheet row 1
        for (offset, row) in rows.enumerate() {
            let row_no = offset + 2;
            match self.candidate_from_row(&map, row_no, &row) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    warn!(source = %self.name, error = %e, "Skipping spreadsheet row");
                    metrics::sources::candidate_skipped();
                }
            }
        }
        Ok(candidates)
    }

    fn candidate_from_row(&self, map: &HeaderMap, row_no: usize, row: &[String]) -> Result<RawCandidate> {
        let overflow = row[map.width.min(row.len())..]
            .iter()
            .any(|extra| !extra.trim().is_empty());
        if overflow {
            return Err(ScraperError::Csv {
                row: row_no,
                message: format!("{} cells for {} headers", row.len(), map.width),
            });
        }

        let title = cell(row, map.title);
        if title.is_empty() {
            return Err(ScraperError::Csv {
                row: row_no,
                message: "missing title".into(),
            });
        }

        let mut candidate = RawCandidate::new(self.name.as_str(), self.venue.as_str());
        candidate.title = title;
        candidate.date_text = cell(row, map.date);
        candidate.time_text = cell(row, map.time);

        let venue = cell(row, map.venue);
        if !venue.is_empty() {
            candidate.venue_name = venue;
        }
        let address = cell(row, map.address);
        if !address.is_empty() {
            candidate.address_text = Some(address);
        }
        let end = cell(row, map.end);
        if !end.is_empty() {
            candidate.end_timestamp = Some(end);
        }

        let tickets = cell(row, map.tickets);
        if looks_like_url(&tickets) {
            candidate
                .ticket_refs
                .push(TicketLink::new(DEFAULT_TICKET_LABEL, tickets.as_str()));
        }

        let url = cell(row, map.url);
        candidate.url = if looks_like_url(&url) {
            url
        } else if looks_like_url(&tickets) {
            tickets
        } else {
            String::new()
        };

        let price = cell(row, map.price);
        if !price.is_empty() {
            if price.eq_ignore_ascii_case("free") {
                candidate.free_hint = Some(true);
            }
            candidate.offers.push(Offer {
                currency: currency_of(&price),
                price: Some(price),
                availability: None,
            });
        }

        Ok(candidate)
    }
}

#[async_trait]
impl Extractor for SpreadsheetExtractor {
    fn source_name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, fetcher), fields(source = %self.name))]
    async fn extract(&self, fetcher: &PageFetcher) -> Result<Vec<RawCandidate>> {
        let text = fetcher.fetch_text(&self.csv_url).await?;
        let candidates = self.candidates_from_csv(&text)?;
        info!("Parsed {} rows into candidates", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::fakes::StaticHttp;
    use crate::pipeline::ingestion::retry::RetryPolicy;
    use std::sync::Arc;

    const SHEET: &str = "Event Name,Date,Start Time,Ticket Link,Ticket Price,End\n\
Sunday Lunch,2/11/2025,12pm,https://tix.test/lunch,£12.50,\n\
,3/11/2025,8pm,,,\n\
\"Quiz, with prizes\",4/11/2025,7.30pm,,Free,22:00\n\
Overflow,5/11/2025,8pm,,,,surprise\n";

    fn extractor() -> SpreadsheetExtractor {
        SpreadsheetExtractor::new("Tavern Sheet", "The Tavern", "https://sheet.test/pub.csv")
    }

    #[test]
    fn test_fuzzy_headers() {
        let headers: Vec<String> = ["What's On", "Date", "Doors", "More Info", "Book Tickets", "Entry Price", "End Time", "Venue Address", "Location"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = HeaderMap::from_headers(&headers);
        assert_eq!(map.title, Some(0));
        assert_eq!(map.date, Some(1));
        assert_eq!(map.time, Some(2));
        assert_eq!(map.url, Some(3));
        assert_eq!(map.tickets, Some(4));
        assert_eq!(map.price, Some(5));
        assert_eq!(map.end, Some(6));
        assert_eq!(map.address, Some(7));
        assert_eq!(map.venue, Some(8));
    }

    #[test]
    fn test_rows_become_candidates_and_bad_rows_are_skipped() {
        let candidates = extractor().candidates_from_csv(SHEET).unwrap();
        assert_eq!(candidates.len(), 2);

        let lunch = &candidates[0];
        assert_eq!(lunch.title, "Sunday Lunch");
        assert_eq!(lunch.venue_name, "The Tavern");
        assert_eq!(lunch.source_name, "Tavern Sheet");
        assert_eq!(lunch.date_text, "2/11/2025");
        assert_eq!(lunch.time_text, "12pm");
        assert_eq!(lunch.url, "https://tix.test/lunch");
        assert_eq!(lunch.ticket_refs, vec![TicketLink::new("Tickets", "https://tix.test/lunch")]);
        assert_eq!(lunch.offers[0].currency.as_deref(), Some("GBP"));

        let quiz = &candidates[1];
        assert_eq!(quiz.title, "Quiz, with prizes");
        assert_eq!(quiz.free_hint, Some(true));
        assert_eq!(quiz.end_timestamp.as_deref(), Some("22:00"));
        assert!(quiz.url.is_empty());
    }

    #[test]
    fn test_sheet_without_title_column_fails() {
        let err = extractor().candidates_from_csv("Date,Time\n1/1/2026,8pm\n").unwrap_err();
        assert!(matches!(err, ScraperError::Csv { row: 1, .. }));
        assert!(extractor().candidates_from_csv("").is_err());
    }

    #[tokio::test]
    async fn test_extract_fetches_csv() {
        let http = StaticHttp::default().with_page("https://sheet.test/pub.csv", SHEET);
        let fetcher = PageFetcher::new(Arc::new(http), RetryPolicy::no_retry());
        let candidates = extractor().extract(&fetcher).await.unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_missing_sheet_is_an_error() {
        let fetcher = PageFetcher::new(Arc::new(StaticHttp::default()), RetryPolicy::no_retry());
        let err = extractor().extract(&fetcher).await.unwrap_err();
        assert!(matches!(err, ScraperError::Status { status: 404, .. }));
    }
}
