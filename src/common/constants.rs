/// Source kinds accepted in the `[[sources]]` table of config.toml
pub const HTML_SOURCE_KIND: &str = "html";
pub const SPREADSHEET_SOURCE_KIND: &str = "spreadsheet";
pub const RECURRING_SOURCE_KIND: &str = "recurring";

/// Environment switch prefix; `SKIP_<SOURCE_NAME>=1` drops a source from the run
pub const SKIP_ENV_PREFIX: &str = "SKIP_";

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Label used when a ticket link arrives without one
pub const DEFAULT_TICKET_LABEL: &str = "Tickets";

/// Key segment used by the dedupe key for records without a start instant
pub const UNDATED_KEY: &str = "undated";

/// Scheme for synthetic URLs minted by schedule generators
pub const RECURRING_URL_SCHEME: &str = "recurring://";

pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_EVENING_HOUR: u32 = 19;
pub const DEFAULT_CACHE_PATH: &str = "data/events-cache.json";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; event_scraper/0.1; +https://example.invalid/bot)";

/// Turn a source name into the suffix of its skip switch: "The Tavern" -> "THE_TAVERN"
pub fn skip_env_var(source_name: &str) -> String {
    let mut suffix = String::with_capacity(source_name.len());
    for c in source_name.chars() {
        if c.is_ascii_alphanumeric() {
            suffix.push(c.to_ascii_uppercase());
        } else if !suffix.ends_with('_') {
            suffix.push('_');
        }
    }
    format!("{}{}", SKIP_ENV_PREFIX, suffix.trim_matches('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_env_var_normalizes_names() {
        assert_eq!(skip_env_var("the_tavern"), "SKIP_THE_TAVERN");
        assert_eq!(skip_env_var("The Tavern (Sheet)"), "SKIP_THE_TAVERN_SHEET");
        assert_eq!(skip_env_var("kexp"), "SKIP_KEXP");
    }
}
