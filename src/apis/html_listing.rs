//! Listing page + detail pages, driven entirely by configured CSS selectors.
//!
//! Structured `application/ld+json` Event metadata on a detail page is used
//! where present; selector text takes precedence for the free-text fields.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use super::base::Extractor;
use crate::common::constants::DEFAULT_TICKET_LABEL;
use crate::common::error::{Result, ScraperError};
use crate::common::types::{Offer, RawCandidate, TicketLink};
use crate::config::HtmlSourceConfig;
use crate::observability::metrics;
use crate::pipeline::ingestion::fetcher::PageFetcher;

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| ScraperError::Config(format!("invalid selector {:?}: {:?}", selector, e)))
}

fn compile_opt(selector: Option<&String>) -> Result<Option<Selector>> {
    selector.map(|s| compile(s)).transpose()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, selector: Option<&Selector>) -> Option<String> {
    let selector = selector?;
    doc.select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

fn is_event_type(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.ends_with("Event"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().map_or(false, |t| t.ends_with("Event"))),
        _ => false,
    }
}

fn find_event(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_event),
        Value::Object(map) => {
            if is_event_type(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_event)
        }
        _ => None,
    }
}

fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ld_address(event: &Value) -> Option<String> {
    let location = as_list(event.get("location")).into_iter().next()?;
    if let Value::String(s) = location {
        return Some(s.clone());
    }
    match location.get("address")? {
        Value::String(s) => Some(s.clone()),
        address @ Value::Object(_) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "postalCode"]
                .iter()
                .filter_map(|key| scalar_string(address.get(*key)))
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

pub struct HtmlListingExtractor {
    name: String,
    venue: String,
    list_url: String,
    link: Selector,
    title: Option<Selector>,
    date: Option<Selector>,
    time: Option<Selector>,
    address: Option<Selector>,
    tickets: Option<Selector>,
    heading: Selector,
    json_ld: Selector,
    max_details: Option<usize>,
    detail_concurrency: usize,
}

impl HtmlListingExtractor {
    pub fn new(
        name: impl Into<String>,
        venue: impl Into<String>,
        config: &HtmlSourceConfig,
        detail_concurrency: usize,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            venue: venue.into(),
            list_url: config.list_url.clone(),
            link: compile(&config.link_selector)?,
            title: compile_opt(config.title_selector.as_ref())?,
            date: compile_opt(config.date_selector.as_ref())?,
            time: compile_opt(config.time_selector.as_ref())?,
            address: compile_opt(config.address_selector.as_ref())?,
            tickets: compile_opt(config.ticket_selector.as_ref())?,
            heading: compile("h1")?,
            json_ld: compile(r#"script[type="application/ld+json"]"#)?,
            max_details: config.max_details,
            detail_concurrency: detail_concurrency.max(1),
        })
    }

    /// Absolute detail-page URLs from the listing, first occurrence order
    pub fn detail_links(&self, html: &str) -> Result<Vec<String>> {
        let base = Url::parse(&self.list_url)
            .map_err(|e| ScraperError::Config(format!("invalid list_url {}: {}", self.list_url, e)))?;
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links: Vec<String> = doc
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| absolutize(&base, href))
            .filter(|url| seen.insert(url.clone()))
            .collect();
        if let Some(max) = self.max_details {
            links.truncate(max);
        }
        Ok(links)
    }

    /// One candidate from a detail page. Unparseable JSON-LD is an error for
    /// this page only.
    pub fn parse_detail(&self, url: &str, html: &str) -> Result<RawCandidate> {
        let doc = Html::parse_document(html);

        let mut event_ld: Option<Value> = None;
        for script in doc.select(&self.json_ld) {
            let raw = script.text().collect::<String>();
            if raw.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&raw)?;
            if let Some(found) = find_event(&value) {
                event_ld = Some(found.clone());
                break;
            }
        }
        let ld = event_ld.as_ref();

        let mut candidate = RawCandidate::new(self.name.as_str(), self.venue.as_str());
        candidate.url = url.to_string();

        candidate.title = first_text(&doc, self.title.as_ref())
            .or_else(|| ld.and_then(|e| scalar_string(e.get("name"))))
            .or_else(|| first_text(&doc, Some(&self.heading)))
            .ok_or_else(|| ScraperError::MissingField(format!("title on {}", url)))?;

        let start = ld.and_then(|e| scalar_string(e.get("startDate")));
        candidate.date_text = first_text(&doc, self.date.as_ref())
            .or_else(|| start.clone())
            .unwrap_or_default();
        candidate.time_text = first_text(&doc, self.time.as_ref()).unwrap_or_default();
        candidate.trusted_timestamp = start;
        candidate.end_timestamp = ld.and_then(|e| scalar_string(e.get("endDate")));
        candidate.address_text =
            first_text(&doc, self.address.as_ref()).or_else(|| ld.and_then(ld_address));

        let base = Url::parse(url).ok();
        if let (Some(selector), Some(base)) = (self.tickets.as_ref(), base.as_ref()) {
            for a in doc.select(selector) {
                if let Some(href) = a.value().attr("href").and_then(|h| absolutize(base, h)) {
                    candidate.ticket_refs.push(TicketLink::new(element_text(a), href));
                }
            }
        }

        for offer in as_list(ld.and_then(|e| e.get("offers"))) {
            if let Some(ticket_url) = scalar_string(offer.get("url")) {
                let label = scalar_string(offer.get("name")).unwrap_or_else(|| DEFAULT_TICKET_LABEL.to_string());
                candidate.ticket_refs.push(TicketLink::new(label, ticket_url));
            }
            candidate.offers.push(Offer {
                price: scalar_string(offer.get("price")),
                currency: scalar_string(offer.get("priceCurrency")),
                availability: scalar_string(offer.get("availability")),
            });
        }

        if let Some(free) = ld.and_then(|e| e.get("isAccessibleForFree")).and_then(Value::as_bool) {
            candidate.free_hint = Some(free);
        }

        Ok(candidate)
    }

    async fn fetch_detail(&self, fetcher: &PageFetcher, url: &str) -> Option<RawCandidate> {
        let html = match fetcher.fetch_text(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source = %self.name, url, error = %e, "Detail fetch failed, skipping");
                metrics::sources::candidate_skipped();
                return None;
            }
        };
        match self.parse_detail(url, &html) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                warn!(source = %self.name, url, error = %e, "Unusable detail page, skipping");
                metrics::sources::candidate_skipped();
                None
            }
        }
    }
}

#[async_trait]
impl Extractor for HtmlListingExtractor {
    fn source_name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, fetcher), fields(source = %self.name))]
    async fn extract(&self, fetcher: &PageFetcher) -> Result<Vec<RawCandidate>> {
        let listing = fetcher.fetch_text(&self.list_url).await?;
        let links = self.detail_links(&listing)?;
        debug!("Found {} detail links", links.len());

        let candidates: Vec<RawCandidate> = stream::iter(links)
            .map(|url| async move { self.fetch_detail(fetcher, &url).await })
            .buffered(self.detail_concurrency)
            .filter_map(|candidate| async move { candidate })
            .collect()
            .await;

        info!("Extracted {} candidates", candidates.len());
        Ok(candidates)
    }
}
