use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_scraper::app::ports::{HttpClientPort, HttpGetResult};
use event_scraper::pipeline::RunStage;
use event_scraper::storage::{InMemoryStore, JsonFileStore, SnapshotStore};
use event_scraper::{CanonicalEvent, Config, EventRun, ScraperError, TicketLink};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::tempdir;

/// Serves fixed bodies; anything unknown is a 404
struct FixtureHttp {
    pages: HashMap<String, String>,
}

impl FixtureHttp {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl HttpClientPort for FixtureHttp {
    async fn get(&self, url: &str) -> event_scraper::Result<HttpGetResult> {
        match self.pages.get(url) {
            Some(body) => Ok(HttpGetResult {
                status: 200,
                bytes: body.as_bytes().to_vec(),
            }),
            None => Err(ScraperError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

const CONFIG: &str = r#"
[run]
timezone = "Europe/London"
default_hour = 19
city = "Leeds"

[fetch]
max_retries = 0
backoff_ms = 1

[[venues]]
name = "The Tavern"
address = "12 High Street, Leeds LS1 4AB"
aliases = ["tavern"]

[[sources]]
name = "tavern_weekly"
venue = "The Tavern"
kind = "recurring"
weeks_ahead = 1
[[sources.slots]]
title = "Sunday Lunch"
weekday = "sunday"
time = "12:00"

[[sources]]
name = "tavern_sheet"
venue = "The Tavern"
kind = "spreadsheet"
csv_url = "https://sheet.test/tavern.csv"
recurring_slot = true

[[sources]]
name = "hall_site"
venue = "Hall"
kind = "html"
list_url = "https://hall.test/whats-on"
link_selector = "a.event"
"#;

const SHEET: &str = "Title,Date,Time,Tickets\n\
Sunday Lunch,2/11/2025,12:00,https://tix.test/lunch\n\
Old Quiz,28/10/2025,8pm,\n\
Open Mic,,,\n";

fn run_for(store: Arc<dyn SnapshotStore>, pages: &[(&str, &str)]) -> EventRun {
    let config = Config::from_toml_str(CONFIG).unwrap();
    EventRun::with_http(config, Arc::new(FixtureHttp::new(pages)), store)
        .with_clock(utc("2025-11-01T10:00:00Z"))
        .with_env(|_| None)
}

#[tokio::test]
async fn test_sunday_lunch_from_two_sources_merges_into_one() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(JsonFileStore::new(dir.path().join("cache.json")));
    let mut run = run_for(store, &[("https://sheet.test/tavern.csv", SHEET)]);

    let report = run.execute().await?;
    assert_eq!(run.stage(), RunStage::Done);

    let lunches: Vec<&CanonicalEvent> = report
        .events
        .iter()
        .filter(|e| e.title == "Sunday Lunch")
        .collect();
    assert_eq!(lunches.len(), 1);
    let lunch = lunches[0];
    assert_eq!(lunch.start, Some(utc("2025-11-02T12:00:00Z")));
    assert_eq!(
        lunch.tickets,
        vec![TicketLink::new("Tickets", "https://tix.test/lunch")]
    );
    assert_eq!(lunch.address, "12 High Street, Leeds LS1 4AB");

    // Past dated row is cut, undated row is kept and sorted last
    assert!(report.events.iter().all(|e| e.title != "Old Quiz"));
    assert_eq!(report.events.last().map(|e| e.title.as_str()), Some("Open Mic"));
    assert_eq!(report.summary.dropped_by_cutoff, 1);

    // The html source had no listing page; it failed alone
    assert_eq!(report.summary.failed_sources(), 1);
    Ok(())
}

#[tokio::test]
async fn test_snapshot_records_survive_when_source_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("cache.json");
    let store = Arc::new(JsonFileStore::new(path.clone()));

    let mut first = run_for(store.clone(), &[("https://sheet.test/tavern.csv", SHEET)]);
    let first_report = first.execute().await?;
    store.save(&first_report.events).await?;

    // Second run: sheet switched off, nothing reachable
    let config = Config::from_toml_str(CONFIG)?;
    let mut second = EventRun::with_http(config, Arc::new(FixtureHttp::new(&[])), store.clone())
        .with_clock(utc("2025-11-01T10:00:00Z"))
        .with_env(|key| (key == "SKIP_TAVERN_SHEET").then(|| "1".to_string()));
    let second_report = second.execute().await?;

    assert!(second_report.events.iter().any(|e| e.title == "Open Mic"));
    let lunch = second_report
        .events
        .iter()
        .find(|e| e.title == "Sunday Lunch")
        .expect("lunch kept");
    assert_eq!(lunch.tickets.len(), 1);
    assert!(second_report.summary.retained_from_snapshot >= 1);
    Ok(())
}

#[tokio::test]
async fn test_two_events_on_one_day_from_a_sheet_stay_separate() -> Result<()> {
    let sheet = "Title,Date,Time,Tickets\n\
Sunday Lunch,2/11/2025,12:00,https://tix.test/lunch\n\
Pub Quiz,2/11/2025,20:00,https://tix.test/quiz\n";
    let store = Arc::new(InMemoryStore::default());
    let mut run = run_for(store, &[("https://sheet.test/tavern.csv", sheet)]);
    let report = run.execute().await?;

    let mut titles: Vec<&str> = report.events.iter().map(|e| e.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Pub Quiz", "Sunday Lunch"]);

    let ticket_urls = |title: &str| -> Vec<String> {
        report
            .events
            .iter()
            .filter(|e| e.title == title)
            .flat_map(|e| e.tickets.iter().map(|t| t.url.clone()))
            .collect()
    };
    assert_eq!(ticket_urls("Sunday Lunch"), vec!["https://tix.test/lunch"]);
    assert_eq!(ticket_urls("Pub Quiz"), vec!["https://tix.test/quiz"]);
    Ok(())
}

#[tokio::test]
async fn test_output_serializes_every_field() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(JsonFileStore::new(dir.path().join("cache.json")));
    let mut run = run_for(store, &[("https://sheet.test/tavern.csv", SHEET)]);
    let report = run.execute().await?;

    let value = serde_json::to_value(&report.events)?;
    let first = &value.as_array().unwrap()[0];
    assert!(first.get("displayTime").is_some());
    assert!(first.get("end").is_some());
    assert!(first.get("tickets").unwrap().is_array());
    Ok(())
}
