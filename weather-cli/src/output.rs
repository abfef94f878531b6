//! Human-friendly rendering of cache results.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use lanka_weather_core::{
    Config, CurrentSnapshot, Forecasts, Location, RefreshSummary, units::uv_index_label,
};

fn local(time: DateTime<Utc>, config: &Config) -> DateTime<FixedOffset> {
    let offset = config.utc_offset().unwrap_or(Utc.fix());
    time.with_timezone(&offset)
}

pub fn print_current(city: &str, snapshot: &CurrentSnapshot, config: &Config) {
    let c = &snapshot.conditions;

    println!("{city}: {} ({})", c.description, c.condition);
    println!("  Temperature : {:.1}°C (feels like {:.1}°C)", c.temperature_c, c.feels_like_c);
    println!("  Humidity    : {}%", c.humidity_pct);
    println!(
        "  Wind        : {:.1} km/h {} ({}°)",
        c.wind_speed_kmh, c.wind_direction, c.wind_deg
    );
    println!("  Visibility  : {:.1} km", c.visibility_km);
    if let Some(pressure) = c.pressure_hpa {
        println!("  Pressure    : {pressure} hPa");
    }
    println!("  Clouds      : {}%", c.clouds_pct);
    println!("  UV index    : {}", uv_index_label(c.uv_index));
    println!(
        "  Updated     : {}",
        local(snapshot.fetched_at, config).format("%Y-%m-%d %H:%M")
    );
}

pub fn print_forecasts(location: &Location, forecasts: &Forecasts, config: &Config) {
    if forecasts.is_empty() {
        println!("No forecast available for {}", location.name);
        return;
    }

    println!("{}: next hours", location.name);
    for point in &forecasts.hourly {
        let e = &point.entry;
        println!(
            "  {}  {:>5.1}°C  {:<14} rain {:>3.0}%",
            local(e.time, config).format("%a %H:%M"),
            e.temperature_c,
            e.description,
            e.pop * 100.0
        );
    }

    println!();
    println!("{}: daily", location.name);
    for point in &forecasts.daily {
        let e = &point.entry;
        println!(
            "  {}  {:>5.1}° / {:>5.1}°  {:<14} rain {:>3.0}%",
            e.date.format("%a %d %b"),
            e.temp_high_c,
            e.temp_low_c,
            e.description,
            e.pop * 100.0
        );
    }
}

pub fn print_locations(locations: &[Location]) {
    if locations.is_empty() {
        println!("No locations stored. Run `lanka-weather seed` first.");
        return;
    }

    for loc in locations {
        println!("{:<14} {:<24} {:>8.4}, {:>8.4}", loc.name, loc.region, loc.lat, loc.lon);
    }
}

pub fn print_refresh_summary(summary: &RefreshSummary) {
    for outcome in &summary.outcomes {
        match &outcome.current {
            Some(snapshot) => println!(
                "  {}: {:.1}°C, {} (hourly {}, daily {})",
                outcome.location.name,
                snapshot.conditions.temperature_c,
                snapshot.conditions.condition,
                outcome.forecasts.hourly.len(),
                outcome.forecasts.daily.len()
            ),
            None => println!("  {}: failed to fetch current weather", outcome.location.name),
        }
    }

    println!(
        "Done! Success: {}, Errors: {}",
        summary.succeeded(),
        summary.failed()
    );
}
