use crate::{
    Config,
    error::ProviderError,
    model::{CurrentReport, ForecastReport},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Upstream weather source.
///
/// Implementations normalize units and vocabulary before returning; the cache
/// stores whatever comes back verbatim.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions for a free-text place name.
    async fn fetch_current(&self, query: &str) -> Result<CurrentReport, ProviderError>;

    /// Hourly and daily forecasts for a coordinate pair.
    async fn fetch_forecast(&self, lat: f64, lon: f64) -> Result<ForecastReport, ProviderError>;
}

/// Build the OpenWeatherMap provider from config.
///
/// A missing API key is not an error here: the provider is still built and
/// reports `ProviderError::MissingApiKey` on every fetch.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>, ProviderError> {
    if !config.has_api_key() {
        tracing::warn!(
            "No OpenWeatherMap API key configured; only stored data will be served. \
             Hint: run `lanka-weather configure` or set {}.",
            crate::config::API_KEY_ENV
        );
    }

    Ok(Arc::new(OpenWeatherProvider::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn provider_without_key_short_circuits() {
        let cfg = Config::default();
        let provider = provider_from_config(&cfg).expect("provider builds without a key");

        let err = provider.fetch_current("Colombo").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));

        let err = provider.fetch_forecast(6.93, 79.86).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
    }
}
