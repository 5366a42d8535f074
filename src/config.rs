//! Startup configuration, read once from the environment.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::scrape::Selectors;

pub const DEFAULT_SCRAPE_URL: &str = "https://news.ycombinator.com/";
pub const DEFAULT_TABLE: &str = "scraped_data";

const SECS_PER_HOUR: u64 = 3600;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: Url,
    pub key: String,
    pub table: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval_hours: u64,
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(SECS_PER_HOUR))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub scrape_url: Url,
    /// `None` when the endpoint or credential is missing.
    pub remote: Option<RemoteConfig>,
    pub schedule: ScheduleConfig,
    pub service_name: String,
    pub environment: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub selectors: Selectors,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let scrape_url = parse_url(
            "SCRAPE_URL",
            get("SCRAPE_URL").as_deref().unwrap_or(DEFAULT_SCRAPE_URL),
        )?;

        let remote = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(endpoint), Some(key)) => Some(RemoteConfig {
                endpoint: parse_url("SUPABASE_URL", &endpoint)?,
                key,
                table: get("SUPABASE_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            }),
            _ => None,
        };

        let interval_hours = match get("SCRAPE_INTERVAL_HOURS") {
            None => 1,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n > 0 && n.checked_mul(SECS_PER_HOUR).is_some() => n,
                Ok(n) if n > 0 => {
                    return Err(ConfigError::IntervalTooLarge {
                        name: "SCRAPE_INTERVAL_HOURS",
                        value: raw,
                    })
                }
                _ => {
                    return Err(ConfigError::NotPositive {
                        name: "SCRAPE_INTERVAL_HOURS",
                        value: raw,
                    })
                }
            },
        };

        let port = match get("PORT") {
            None => 8080,
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::BadPort { name: "PORT", value: raw })?,
        };

        let selectors = Selectors::new(
            get("SCRAPE_ITEM_SELECTOR").as_deref().unwrap_or("article"),
            get("SCRAPE_TITLE_SELECTOR").as_deref().unwrap_or("h2"),
            get("SCRAPE_LINK_SELECTOR").as_deref().unwrap_or("a[href]"),
        )?;

        Ok(Self {
            scrape_url,
            remote,
            schedule: ScheduleConfig { interval_hours },
            service_name: get("SERVICE_NAME").unwrap_or_else(|| "web-scraper".to_string()),
            environment: get("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port,
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            selectors,
        })
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::BadUrl {
        name,
        value: value.to_string(),
    })
}
