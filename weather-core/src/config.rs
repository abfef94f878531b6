use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Environment variable that overrides the API key from the config file.
pub const API_KEY_ENV: &str = "OPENWEATHERMAP_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Freshness and retention knobs for the weather cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub current_ttl_minutes: i64,
    pub forecast_ttl_minutes: i64,
    /// Current-weather snapshots kept per location.
    pub snapshot_retention: usize,
    pub hourly_limit: usize,
    pub daily_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            current_ttl_minutes: 15,
            forecast_ttl_minutes: 30,
            snapshot_retention: 10,
            hourly_limit: 24,
            daily_limit: 7,
        }
    }
}

impl CacheSettings {
    pub fn current_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.current_ttl_minutes)
    }

    pub fn forecast_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.forecast_ttl_minutes)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// country_code = "LK"
///
/// [cache]
/// current_ttl_minutes = 15
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Appended to every city query, e.g. `Kandy,LK`.
    pub country_code: String,
    pub timeout_secs: u64,
    /// Offset used to bucket forecast points into calendar days.
    pub utc_offset_minutes: i32,
    pub database_path: Option<PathBuf>,
    pub cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            country_code: "LK".to_string(),
            timeout_secs: 10,
            utc_offset_minutes: 330,
            database_path: None,
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// API key, or `None` when unset or blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Local offset used for forecast days and display, `None` when out of range.
    pub fn utc_offset(&self) -> Option<chrono::FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(chrono::FixedOffset::east_opt)
    }

    /// Replace the file's API key with the environment variable when it is set.
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.set_api_key(key);
            }
        }
        self
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let cfg = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };

        Ok(cfg.apply_env())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Configured database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("weather.db")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("lk", "lanka-weather", "lanka-weather")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_expectations() {
        let cfg = Config::default();

        assert_eq!(cfg.country_code, "LK");
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.cache.current_ttl(), chrono::Duration::minutes(15));
        assert_eq!(cfg.cache.forecast_ttl(), chrono::Duration::minutes(30));
        assert_eq!(cfg.cache.snapshot_retention, 10);
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());

        assert_eq!(cfg.api_key(), None);
    }

    #[test]
    fn set_api_key_trims_whitespace() {
        let mut cfg = Config::default();
        cfg.set_api_key(" KEY \n".into());

        assert_eq!(cfg.api_key(), Some("KEY"));
    }

    #[test]
    fn utc_offset_rejects_out_of_range_minutes() {
        let mut cfg = Config::default();
        assert_eq!(cfg.utc_offset().map(|o| o.local_minus_utc()), Some(19_800));

        cfg.utc_offset_minutes = i32::MAX;
        assert_eq!(cfg.utc_offset(), None);

        cfg.utc_offset_minutes = 24 * 60;
        assert_eq!(cfg.utc_offset(), None);
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            api_key = "abc"

            [cache]
            current_ttl_minutes = 5
            "#,
        )
        .expect("partial config must parse");

        assert_eq!(cfg.api_key(), Some("abc"));
        assert_eq!(cfg.cache.current_ttl_minutes, 5);
        assert_eq!(cfg.cache.forecast_ttl_minutes, 30);
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("SAVED".into());
        cfg.database_path = Some(dir.path().join("weather.db"));
        cfg.save_to(&path).expect("save must succeed");

        let loaded = Config::load_from(&path).expect("load must succeed");
        assert_eq!(loaded.api_key(), Some("SAVED"));
        assert_eq!(
            loaded.database_path().expect("path"),
            dir.path().join("weather.db")
        );
    }
}
