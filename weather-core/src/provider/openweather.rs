use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

use crate::{
    Config,
    error::ProviderError,
    model::{CurrentConditions, CurrentReport, DailyEntry, ForecastReport, HourlyEntry},
    units,
};

use super::WeatherProvider;

/// OpenWeatherMap 2.5 API client (current weather + 5 day / 3 hour forecast).
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: Option<String>,
    http: Client,
    base_url: String,
    country_code: String,
    utc_offset: FixedOffset,
    hourly_limit: usize,
    daily_limit: usize,
}

impl OpenWeatherProvider {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(config.timeout()).build()?;

        let utc_offset = config.utc_offset().ok_or_else(|| {
            ProviderError::Malformed(format!(
                "utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;

        Ok(Self {
            api_key: config.api_key().map(str::to_owned),
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_code: config.country_code.clone(),
            utc_offset,
            hourly_limit: config.cache.hourly_limit,
            daily_limit: config.cache.daily_limit,
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)
    }

    fn scoped_query(&self, query: &str) -> String {
        if self.country_code.is_empty() {
            query.to_string()
        } else {
            format!("{query},{}", self.country_code)
        }
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, ProviderError> {
        let url = format!("{}/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key()?), ("units", "metric")])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }

    #[instrument(skip(self))]
    async fn current(&self, query: &str) -> Result<CurrentReport, ProviderError> {
        let q = self.scoped_query(query);
        let body = self.get_json("weather", &[("q", q)]).await?;

        let parsed: OwCurrentResponse = serde_json::from_str(&body)?;
        let report = parse_current(parsed)?;
        debug!(temperature = report.conditions.temperature_c, "fetched current weather");
        Ok(report)
    }

    #[instrument(skip(self))]
    async fn forecast(&self, lat: f64, lon: f64) -> Result<ForecastReport, ProviderError> {
        let body = self
            .get_json("forecast", &[("lat", lat.to_string()), ("lon", lon.to_string())])
            .await?;

        let parsed: OwForecastResponse = serde_json::from_str(&body)?;
        let report = parse_forecast(
            parsed,
            self.utc_offset,
            self.hourly_limit,
            self.daily_limit,
        )?;
        debug!(
            hourly = report.hourly.len(),
            daily = report.daily.len(),
            "fetched forecast"
        );
        Ok(report)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch_current(&self, query: &str) -> Result<CurrentReport, ProviderError> {
        self.current(query).await.inspect_err(|err| {
            error!(query, error = %err, "Error fetching current weather");
        })
    }

    async fn fetch_forecast(&self, lat: f64, lon: f64) -> Result<ForecastReport, ProviderError> {
        self.forecast(lat, lon).await.inspect_err(|err| {
            error!(lat, lon, error = %err, "Error fetching forecast");
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: Option<f64>,
    humidity: Option<i32>,
    pressure: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: Option<String>,
    description: Option<String>,
    icon: Option<String>,
}

impl OwWeather {
    fn condition(&self) -> String {
        self.main.clone().unwrap_or_else(|| "Clear".to_string())
    }

    fn description(&self) -> String {
        units::title_case(self.description.as_deref().unwrap_or_default())
    }

    fn icon(&self) -> String {
        units::map_icon(self.icon.as_deref().unwrap_or("01d")).to_string()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWind {
    speed: f64,
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwClouds {
    all: i32,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    coord: Option<OwCoord>,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    visibility: Option<f64>,
    #[serde(default)]
    clouds: OwClouds,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

fn parse_current(parsed: OwCurrentResponse) -> Result<CurrentReport, ProviderError> {
    let weather = parsed
        .weather
        .first()
        .ok_or_else(|| ProviderError::Malformed("missing weather[0] entry".into()))?;
    let coord = parsed
        .coord
        .ok_or_else(|| ProviderError::Malformed("missing coord block".into()))?;
    let humidity = parsed
        .main
        .humidity
        .ok_or_else(|| ProviderError::Malformed("missing main.humidity".into()))?;

    let conditions = CurrentConditions {
        temperature_c: units::round1(parsed.main.temp),
        feels_like_c: units::round1(parsed.main.feels_like.unwrap_or(parsed.main.temp)),
        condition: weather.condition(),
        description: weather.description(),
        icon: weather.icon(),
        humidity_pct: humidity,
        wind_speed_kmh: units::mps_to_kmh(parsed.wind.speed),
        wind_direction: units::degrees_to_compass(parsed.wind.deg).to_string(),
        wind_deg: parsed.wind.deg.round() as i32,
        visibility_km: units::meters_to_km(parsed.visibility.unwrap_or(units::DEFAULT_VISIBILITY_M)),
        uv_index: None,
        pressure_hpa: parsed.main.pressure,
        clouds_pct: parsed.clouds.all,
    };

    Ok(CurrentReport {
        conditions,
        lat: coord.lat,
        lon: coord.lon,
    })
}

struct DayBucket {
    date: NaiveDate,
    temps: Vec<f64>,
    first: HourlyEntry,
}

/// Map forecast entries and fold them into calendar-day buckets.
///
/// Daily high/low span every entry of the day; everything else is taken
/// from the first entry seen for that date.
fn parse_forecast(
    parsed: OwForecastResponse,
    offset: FixedOffset,
    hourly_limit: usize,
    daily_limit: usize,
) -> Result<ForecastReport, ProviderError> {
    let mut hourly = Vec::with_capacity(parsed.list.len());
    let mut buckets: Vec<DayBucket> = Vec::new();
    let mut bucket_index: HashMap<NaiveDate, usize> = HashMap::new();

    for item in parsed.list {
        let weather = item
            .weather
            .first()
            .ok_or_else(|| ProviderError::Malformed(format!("missing weather[0] at dt={}", item.dt)))?;
        let time = DateTime::from_timestamp(item.dt, 0)
            .ok_or_else(|| ProviderError::Malformed(format!("invalid timestamp dt={}", item.dt)))?;

        let entry = HourlyEntry {
            time,
            temperature_c: units::round1(item.main.temp),
            condition: weather.condition(),
            description: weather.description(),
            icon: weather.icon(),
            humidity_pct: item.main.humidity,
            wind_speed_kmh: Some(units::mps_to_kmh(item.wind.speed)),
            pop: item.pop,
        };

        let date = time.with_timezone(&offset).date_naive();
        match bucket_index.get(&date) {
            Some(&idx) => buckets[idx].temps.push(item.main.temp),
            None => {
                bucket_index.insert(date, buckets.len());
                buckets.push(DayBucket {
                    date,
                    temps: vec![item.main.temp],
                    first: entry.clone(),
                });
            }
        }

        hourly.push(entry);
    }

    let daily = buckets
        .into_iter()
        .take(daily_limit)
        .map(|bucket| {
            let high = bucket.temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let low = bucket.temps.iter().copied().fold(f64::INFINITY, f64::min);
            DailyEntry {
                date: bucket.date,
                temp_high_c: units::round1(high),
                temp_low_c: units::round1(low),
                condition: bucket.first.condition,
                description: bucket.first.description,
                icon: bucket.first.icon,
                humidity_pct: bucket.first.humidity_pct,
                wind_speed_kmh: bucket.first.wind_speed_kmh,
                pop: bucket.first.pop,
            }
        })
        .collect();

    hourly.truncate(hourly_limit);

    Ok(ForecastReport { hourly, daily })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        let head: String = body.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn colombo_offset() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn current_payload() -> serde_json::Value {
        json!({
            "coord": { "lon": 79.8478, "lat": 6.9319 },
            "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
            "main": { "temp": 29.46, "feels_like": 34.02, "humidity": 79, "pressure": 1009 },
            "visibility": 8000,
            "wind": { "speed": 5.0, "deg": 180 },
            "clouds": { "all": 75 },
            "dt": 1717221600,
            "name": "Colombo"
        })
    }

    fn forecast_item(dt: i64, temp: f64, main: &str, icon: &str, pop: f64) -> serde_json::Value {
        json!({
            "dt": dt,
            "main": { "temp": temp, "feels_like": temp, "humidity": 80 },
            "weather": [{ "main": main, "description": "light rain", "icon": icon }],
            "wind": { "speed": 2.5, "deg": 200 },
            "pop": pop
        })
    }

    #[test]
    fn current_payload_is_normalized() {
        let parsed: OwCurrentResponse = serde_json::from_value(current_payload()).unwrap();
        let report = parse_current(parsed).unwrap();
        let c = &report.conditions;

        assert_eq!(c.temperature_c, 29.5);
        assert_eq!(c.feels_like_c, 34.0);
        assert_eq!(c.condition, "Clouds");
        assert_eq!(c.description, "Broken Clouds");
        assert_eq!(c.icon, "cloudy_filled");
        assert_eq!(c.humidity_pct, 79);
        assert_eq!(c.wind_speed_kmh, 18.0);
        assert_eq!(c.wind_direction, "S");
        assert_eq!(c.wind_deg, 180);
        assert_eq!(c.visibility_km, 8.0);
        assert_eq!(c.pressure_hpa, Some(1009));
        assert_eq!(c.clouds_pct, 75);
        assert_eq!(report.lat, 6.9319);
        assert_eq!(report.lon, 79.8478);
    }

    #[test]
    fn current_defaults_fill_missing_optional_fields() {
        let parsed: OwCurrentResponse = serde_json::from_value(json!({
            "coord": { "lon": 80.63, "lat": 7.29 },
            "weather": [{ "icon": "zz" }],
            "main": { "temp": 22.0, "humidity": 90 }
        }))
        .unwrap();
        let c = parse_current(parsed).unwrap().conditions;

        assert_eq!(c.feels_like_c, 22.0);
        assert_eq!(c.condition, "Clear");
        assert_eq!(c.description, "");
        assert_eq!(c.icon, "cloud");
        assert_eq!(c.visibility_km, 10.0);
        assert_eq!(c.wind_speed_kmh, 0.0);
        assert_eq!(c.wind_direction, "N");
        assert_eq!(c.clouds_pct, 0);
        assert_eq!(c.pressure_hpa, None);
    }

    #[test]
    fn current_without_weather_entry_is_malformed() {
        let mut payload = current_payload();
        payload["weather"] = json!([]);
        let parsed: OwCurrentResponse = serde_json::from_value(payload).unwrap();

        let err = parse_current(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(msg) if msg.contains("weather")));
    }

    #[test]
    fn current_without_coord_is_malformed() {
        let mut payload = current_payload();
        payload.as_object_mut().unwrap().remove("coord");
        let parsed: OwCurrentResponse = serde_json::from_value(payload).unwrap();

        let err = parse_current(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(msg) if msg.contains("coord")));
    }

    #[test]
    fn daily_high_low_span_the_whole_day() {
        // 2025-06-01 in Colombo (UTC+05:30): 03:30, 06:30 and 09:30 UTC.
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 3, 30, 0).unwrap().timestamp();
        let parsed: OwForecastResponse = serde_json::from_value(json!({
            "list": [
                forecast_item(base, 24.0, "Rain", "10d", 0.2),
                forecast_item(base + 3 * 3600, 29.5, "Clouds", "03d", 0.5),
                forecast_item(base + 6 * 3600, 22.1, "Clear", "01d", 0.0),
            ]
        }))
        .unwrap();

        let report = parse_forecast(parsed, colombo_offset(), 24, 7).unwrap();

        assert_eq!(report.hourly.len(), 3);
        assert_eq!(report.daily.len(), 1);
        let day = &report.daily[0];
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(day.temp_high_c, 29.5);
        assert_eq!(day.temp_low_c, 22.1);
        // first entry wins for everything but the temperature range
        assert_eq!(day.condition, "Rain");
        assert_eq!(day.icon, "rainy");
        assert_eq!(day.pop, 0.2);
        assert_eq!(day.wind_speed_kmh, Some(9.0));
    }

    #[test]
    fn days_are_bucketed_in_local_time() {
        // 20:00 UTC on June 1st is already June 2nd in Colombo.
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 17, 0, 0).unwrap().timestamp();
        let parsed: OwForecastResponse = serde_json::from_value(json!({
            "list": [
                forecast_item(late, 27.0, "Rain", "10n", 0.3),
                forecast_item(late + 3 * 3600, 26.0, "Rain", "10n", 0.3),
            ]
        }))
        .unwrap();

        let report = parse_forecast(parsed, colombo_offset(), 24, 7).unwrap();

        let dates: Vec<_> = report.daily.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn forecast_lists_are_capped_in_order() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap().timestamp();
        let list: Vec<_> = (0..40)
            .map(|i| forecast_item(start + i * 3 * 3600, 25.0 + (i % 8) as f64, "Rain", "10d", 0.1))
            .collect();
        let parsed: OwForecastResponse = serde_json::from_value(json!({ "list": list })).unwrap();

        let report = parse_forecast(parsed, colombo_offset(), 24, 3).unwrap();

        assert_eq!(report.hourly.len(), 24);
        assert_eq!(report.daily.len(), 3);
        assert!(report.hourly.windows(2).all(|w| w[0].time < w[1].time));
        assert!(report.daily.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(report.hourly[0].time.timestamp(), start);
    }

    #[test]
    fn forecast_entry_without_weather_is_malformed() {
        let parsed: OwForecastResponse = serde_json::from_value(json!({
            "list": [{ "dt": 1717200000, "main": { "temp": 25.0 }, "weather": [] }]
        }))
        .unwrap();

        assert!(matches!(
            parse_forecast(parsed, colombo_offset(), 24, 7),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn huge_utc_offset_is_rejected_without_overflow() {
        let cfg = Config {
            utc_offset_minutes: i32::MAX,
            ..Default::default()
        };

        assert!(matches!(
            OpenWeatherProvider::from_config(&cfg),
            Err(ProviderError::Malformed(msg)) if msg.contains("utc_offset_minutes")
        ));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
