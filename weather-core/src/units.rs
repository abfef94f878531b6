//! Unit and vocabulary normalization for provider payloads.

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Visibility assumed when the provider omits it, in meters.
pub const DEFAULT_VISIBILITY_M: f64 = 10_000.0;

/// One decimal, rounding the exact binary value so ties such as 28.25 go to 28.2.
pub fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

/// m/s to km/h, one decimal.
pub fn mps_to_kmh(speed: f64) -> f64 {
    round1(speed * 3.6)
}

/// Meters to kilometers, one decimal.
pub fn meters_to_km(meters: f64) -> f64 {
    round1(meters / 1000.0)
}

/// Map wind degrees onto a 16-point compass rose.
pub fn degrees_to_compass(deg: f64) -> &'static str {
    let idx = (deg / 22.5).round().rem_euclid(16.0) as usize;
    COMPASS_POINTS[idx % COMPASS_POINTS.len()]
}

/// Map an OpenWeatherMap icon code onto the dashboard's icon names.
pub fn map_icon(code: &str) -> &'static str {
    match code {
        "01d" => "wb_sunny",
        "01n" | "02n" => "nights_stay",
        "02d" => "partly_cloudy_day",
        "03d" | "03n" => "cloud",
        "04d" | "04n" => "cloudy_filled",
        "09d" | "09n" | "10d" | "10n" => "rainy",
        "11d" | "11n" => "thunderstorm",
        "13d" | "13n" => "cloudy_snowing",
        "50d" | "50n" => "foggy",
        _ => "cloud",
    }
}

/// Upper-case the first letter of every word, lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;

    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }

    out
}

/// Human label for a UV index reading, e.g. `"6 High"`.
pub fn uv_index_label(uv: Option<f64>) -> String {
    let Some(uv) = uv else {
        return "N/A".to_string();
    };

    let band = if uv <= 2.0 {
        "Low"
    } else if uv <= 5.0 {
        "Moderate"
    } else if uv <= 7.0 {
        "High"
    } else if uv <= 10.0 {
        "Very High"
    } else {
        "Extreme"
    };

    format!("{uv:.0} {band}")
}
