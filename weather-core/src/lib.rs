//! Core library for the `lanka-weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeatherMap client and unit normalization
//! - SQLite persistence for locations, snapshots and forecasts
//! - A time-to-live cache that falls back to stored data when upstream fails
//!
//! It is used by `lanka-weather`, but can also be embedded in a web service.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod retention;
pub mod seed;
pub mod store;
pub mod units;

pub use cache::{RefreshOutcome, RefreshSummary, WeatherCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheSettings, Config};
pub use error::{CacheError, ProviderError, StoreError};
pub use model::{
    CurrentConditions, CurrentReport, CurrentSnapshot, DailyEntry, DailyPoint, ForecastReport,
    Forecasts, HourlyEntry, HourlyPoint, Location,
};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use retention::RetentionTrimmer;
pub use store::WeatherStore;
