use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A named place tracked by the cache. Names are unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub name: String,
    /// Display region, e.g. "Central Province".
    pub region: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// Zero on either axis means "not known yet".
    pub fn has_coordinates(&self) -> bool {
        self.lat != 0.0 && self.lon != 0.0
    }
}

/// Normalized current conditions, as produced by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub humidity_pct: i32,
    pub wind_speed_kmh: f64,
    pub wind_direction: String,
    pub wind_deg: i32,
    pub visibility_km: f64,
    pub uv_index: Option<f64>,
    pub pressure_hpa: Option<i32>,
    pub clouds_pct: i32,
}

/// Result of a successful current-weather fetch, including the
/// provider-reported coordinates used to back-fill a location.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentReport {
    pub conditions: CurrentConditions,
    pub lat: f64,
    pub lon: f64,
}

/// A persisted current-weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot {
    pub id: i64,
    pub location_id: i64,
    pub conditions: CurrentConditions,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub time: DateTime<Utc>,
    pub temperature_c: f64,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub humidity_pct: Option<i32>,
    pub wind_speed_kmh: Option<f64>,
    /// Probability of precipitation, 0.0..=1.0.
    pub pop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub temp_high_c: f64,
    pub temp_low_c: f64,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub humidity_pct: Option<i32>,
    pub wind_speed_kmh: Option<f64>,
    pub pop: f64,
}

/// Hourly and daily forecast lists returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastReport {
    pub hourly: Vec<HourlyEntry>,
    pub daily: Vec<DailyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub id: i64,
    pub location_id: i64,
    pub entry: HourlyEntry,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub id: i64,
    pub location_id: i64,
    pub entry: DailyEntry,
    pub fetched_at: DateTime<Utc>,
}

/// Forecasts served to callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecasts {
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

impl Forecasts {
    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty() && self.daily.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(lat: f64, lon: f64) -> Location {
        Location {
            id: 1,
            name: "Colombo".into(),
            region: "Western Province".into(),
            lat,
            lon,
        }
    }

    #[test]
    fn zero_on_either_axis_means_unknown() {
        assert!(!location(0.0, 0.0).has_coordinates());
        assert!(!location(6.93, 0.0).has_coordinates());
        assert!(!location(0.0, 79.86).has_coordinates());
        assert!(location(6.93, 79.86).has_coordinates());
    }
}
