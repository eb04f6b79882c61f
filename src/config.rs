use crate::common::constants::{
    self, DEFAULT_CACHE_PATH, DEFAULT_EVENING_HOUR, DEFAULT_TIMEZONE, DEFAULT_USER_AGENT,
};
use crate::common::error::{Result, ScraperError};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// IANA zone every local date/time is anchored to
    pub timezone: String,
    /// Evening hour used when a date has no time at all
    pub default_hour: u32,
    pub cache_path: PathBuf,
    /// City word that marks a scraped address as already complete
    pub city: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_hour: DEFAULT_EVENING_HOUR,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            city: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Sources fetched at the same time
    pub concurrency: usize,
    /// Detail pages fetched at the same time within one source
    pub detail_concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            detail_concurrency: 4,
            timeout_secs: 20,
            max_retries: 2,
            backoff_ms: 750,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub venue: String,
    /// Part of a recurring slot that other sources may also publish
    #[serde(default)]
    pub recurring_slot: bool,
    #[serde(flatten)]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Html(HtmlSourceConfig),
    Spreadsheet(SpreadsheetSourceConfig),
    Recurring(RecurringSourceConfig),
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Html(_) => constants::HTML_SOURCE_KIND,
            SourceKind::Spreadsheet(_) => constants::SPREADSHEET_SOURCE_KIND,
            SourceKind::Recurring(_) => constants::RECURRING_SOURCE_KIND,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HtmlSourceConfig {
    pub list_url: String,
    /// Selects the anchors on the list page that lead to detail pages
    pub link_selector: String,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default)]
    pub date_selector: Option<String>,
    #[serde(default)]
    pub time_selector: Option<String>,
    #[serde(default)]
    pub address_selector: Option<String>,
    #[serde(default)]
    pub ticket_selector: Option<String>,
    #[serde(default)]
    pub max_details: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetSourceConfig {
    pub csv_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringSourceConfig {
    #[serde(default = "default_weeks_ahead")]
    pub weeks_ahead: u32,
    pub slots: Vec<RecurringSlot>,
}

fn default_weeks_ahead() -> u32 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecurringSlot {
    pub title: String,
    /// English weekday name, e.g. "sunday"
    pub weekday: String,
    /// Local start time as HH:MM
    pub time: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ticket_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.timezone()?;
        if self.run.default_hour > 23 {
            return Err(ScraperError::Config(format!(
                "run.default_hour must be 0-23, got {}",
                self.run.default_hour
            )));
        }
        if self.fetch.concurrency == 0 || self.fetch.detail_concurrency == 0 {
            return Err(ScraperError::Config("fetch concurrency must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.to_lowercase()) {
                return Err(ScraperError::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.run
            .timezone
            .parse::<Tz>()
            .map_err(|e| ScraperError::Config(format!("unknown timezone '{}': {}", self.run.timezone, e)))
    }

    /// Sources left after applying the `SKIP_<NAME>` switches read through `lookup`
    pub fn enabled_sources_with<F>(&self, lookup: F) -> Vec<&SourceConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.sources
            .iter()
            .filter(|s| !is_skipped(&s.name, &lookup))
            .collect()
    }

    /// Names of sources whose records take part in the recurring-slot merge
    pub fn recurring_sources(&self) -> HashSet<String> {
        self.sources
            .iter()
            .filter(|s| s.recurring_slot || matches!(s.kind, SourceKind::Recurring(_)))
            .map(|s| s.name.clone())
            .collect()
    }
}

pub fn is_skipped<F>(source_name: &str, lookup: &F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(&constants::skip_env_var(source_name))
        .map(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [run]
        timezone = "Europe/London"
        default_hour = 20
        city = "Bristol"

        [fetch]
        concurrency = 2

        [[venues]]
        name = "The Tavern"
        address = "1 High St, Bristol BS1 1AA"
        aliases = ["tavern"]

        [[sources]]
        name = "tavern_site"
        venue = "The Tavern"
        kind = "html"
        list_url = "https://tavern.test/whats-on"
        link_selector = "a.event"

        [[sources]]
        name = "tavern_sheet"
        venue = "The Tavern"
        kind = "spreadsheet"
        csv_url = "https://sheets.test/pub.csv"
        recurring_slot = true

        [[sources]]
        name = "tavern_weekly"
        venue = "The Tavern"
        kind = "recurring"
        [[sources.slots]]
        title = "Sunday Lunch"
        weekday = "sunday"
        time = "12:00"
    "#;

    #[test]
    fn test_parses_sources_by_kind() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].kind.name(), "html");
        assert_eq!(config.sources[1].kind.name(), "spreadsheet");
        match &config.sources[2].kind {
            SourceKind::Recurring(r) => {
                assert_eq!(r.weeks_ahead, 8);
                assert_eq!(r.slots[0].weekday, "sunday");
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(config.fetch.concurrency, 2);
        assert_eq!(config.fetch.max_retries, 2);
        assert_eq!(config.run.default_hour, 20);
    }

    #[test]
    fn test_recurring_sources_include_flagged_and_generated() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let recurring = config.recurring_sources();
        assert!(recurring.contains("tavern_sheet"));
        assert!(recurring.contains("tavern_weekly"));
        assert!(!recurring.contains("tavern_site"));
    }

    #[test]
    fn test_skip_switches_exclude_sources() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let enabled = config.enabled_sources_with(|key| match key {
            "SKIP_TAVERN_SHEET" => Some("true".into()),
            "SKIP_TAVERN_SITE" => Some("0".into()),
            _ => None,
        });
        let names: Vec<_> = enabled.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["tavern_site", "tavern_weekly"]);
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let err = Config::from_toml_str("[run]\ntimezone = \"Mars/Olympus\"\n").unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = Config::from_toml_str("[fetch]\nconcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.run.timezone, "Europe/London");
        assert_eq!(config.run.default_hour, 19);
        assert!(config.sources.is_empty());
    }
}
