use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lanka_weather_core::{
    CacheError, Config, Location, SystemClock, WeatherCache, WeatherStore, provider_from_config,
    seed::seed_locations,
};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "lanka-weather", version, about = "Weather for Sri Lankan cities")]
pub struct Cli {
    /// Database file; defaults to the platform data directory.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key.
    Configure,

    /// Insert the built-in list of Sri Lankan cities.
    Seed,

    /// List stored locations.
    Locations,

    /// Show current weather for a city.
    Current {
        /// City name, e.g. "Kandy".
        city: String,
    },

    /// Show hourly and daily forecasts for a city.
    Forecast {
        /// City name, e.g. "Kandy".
        city: String,
    },

    /// Refresh current weather and forecasts for every stored city.
    Fetch {
        /// Refresh a single city only.
        #[arg(long)]
        city: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(db) = self.db {
            config.database_path = Some(db);
        }

        match self.command {
            Command::Configure => configure(config),
            Command::Seed => {
                let store = open_store(&config)?;
                let report = seed_locations(&store)?;
                println!(
                    "{} cities processed ({} created, {} already present)",
                    report.created + report.existing,
                    report.created,
                    report.existing
                );
                Ok(())
            }
            Command::Locations => {
                let store = open_store(&config)?;
                output::print_locations(&store.list_locations()?);
                Ok(())
            }
            Command::Current { city } => {
                let cache = build_cache(&config)?;
                match cache.get_current_by_name(&city).await {
                    Ok(snapshot) => {
                        output::print_current(&city, &snapshot, &config);
                        Ok(())
                    }
                    Err(CacheError::LocationNotFound(_)) => {
                        bail!("No weather available for '{city}'")
                    }
                    Err(err) => Err(err.into()),
                }
            }
            Command::Forecast { city } => {
                let cache = build_cache(&config)?;
                let location = resolve_location(&cache, &city).await?;
                let forecasts = cache.get_forecasts(&location).await?;
                output::print_forecasts(&location, &forecasts, &config);
                Ok(())
            }
            Command::Fetch { city } => {
                let cache = build_cache(&config)?;
                let summary = cache.refresh_all(city.as_deref()).await?;
                output::print_refresh_summary(&summary);
                Ok(())
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let key = inquire::Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;

    if key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(key);
    config.save()?;
    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<WeatherStore> {
    let path = config.database_path()?;
    tracing::debug!(path = %path.display(), "opening database");
    WeatherStore::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

fn build_cache(config: &Config) -> anyhow::Result<WeatherCache> {
    let store = Arc::new(open_store(config)?);
    let provider = provider_from_config(config)?;

    Ok(WeatherCache::new(
        store,
        provider,
        Arc::new(SystemClock),
        config.cache.clone(),
    ))
}

/// Find a stored location, creating it from an upstream lookup if needed.
async fn resolve_location(cache: &WeatherCache, city: &str) -> anyhow::Result<Location> {
    if let Some(location) = cache.store().location_by_name(city)? {
        return Ok(location);
    }

    match cache.get_current_by_name(city).await {
        Ok(_) => cache
            .store()
            .location_by_name(city)?
            .with_context(|| format!("Location '{city}' vanished after lookup")),
        Err(CacheError::LocationNotFound(_)) => bail!("Unknown city '{city}'"),
        Err(err) => Err(err.into()),
    }
}
