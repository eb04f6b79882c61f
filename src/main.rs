use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use event_scraper::common::constants::{self, DEFAULT_CONFIG_PATH};
use event_scraper::config::{is_skipped, Config};
use event_scraper::observability;
use event_scraper::pipeline::processing::{Cutoff, DateTimeResolver};
use event_scraper::pipeline::EventRun;
use event_scraper::storage::{InMemoryStore, JsonFileStore, SnapshotStore};

#[derive(Parser)]
#[command(name = "event_scraper")]
#[command(about = "Venue event scraper: fetch, resolve, dedupe, print JSON")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every enabled source and print the merged event list as JSON
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Snapshot file; overrides run.cache_path
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Read the snapshot but leave it untouched
        #[arg(long)]
        no_cache_write: bool,
        /// Ignore the snapshot entirely
        #[arg(long)]
        no_cache: bool,
    },
    /// List configured sources and whether a SKIP_ switch disables them
    Sources {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Resolve a single date/time pair and print the result
    Resolve {
        #[arg(long, default_value = "")]
        date: String,
        #[arg(long, default_value = "")]
        time: String,
        #[arg(long)]
        timestamp: Option<String>,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("Loading {}", path.display()))
}

async fn run(config_path: &Path, cache: Option<PathBuf>, no_cache_write: bool, no_cache: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let cache_path = cache.unwrap_or_else(|| config.run.cache_path.clone());
    let store: Arc<dyn SnapshotStore> = if no_cache {
        Arc::new(InMemoryStore::default())
    } else {
        Arc::new(JsonFileStore::new(cache_path.clone()))
    };

    let mut event_run = EventRun::new(config, store.clone())?;
    let report = event_run.execute().await?;

    // The only fatal failure: output that cannot be produced
    let json = serde_json::to_string_pretty(&report.events).context("Serializing events")?;
    println!("{}", json);

    if !no_cache && !no_cache_write {
        match store.save(&report.events).await {
            Ok(()) => info!(path = %cache_path.display(), events = report.events.len(), "Snapshot written"),
            Err(e) => error!(path = %cache_path.display(), error = %e, "Failed to write snapshot"),
        }
    }
    Ok(())
}

fn list_sources(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let lookup = |key: &str| std::env::var(key).ok();
    for source in &config.sources {
        let state = if is_skipped(&source.name, &lookup) {
            "skipped"
        } else {
            "enabled"
        };
        println!(
            "{:<28} {:<12} {:<8} {}",
            source.name,
            source.kind.name(),
            state,
            constants::skip_env_var(&source.name)
        );
    }
    Ok(())
}

fn resolve(date: &str, time: &str, timestamp: Option<&str>, config_path: &Path) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        load_config(config_path)?
    } else {
        Config::default()
    };
    let tz = config.timezone()?;
    let resolver = DateTimeResolver::new(Cutoff::start_of_day(Utc::now(), tz));
    let resolution = resolver.resolve(date, time, timestamp);
    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            cache,
            no_cache_write,
            no_cache,
        } => run(&config, cache, no_cache_write, no_cache).await,
        Commands::Sources { config } => list_sources(&config),
        Commands::Resolve {
            date,
            time,
            timestamp,
            config,
        } => resolve(&date, &time, timestamp.as_deref(), &config),
    }
}
