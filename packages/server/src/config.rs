use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::kernel::{DEFAULT_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; JobBoardScraper/1.0; +https://github.com/job-board/scraper)";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub database_max_connections: u32,
    /// Empty means any origin is allowed.
    pub allowed_origins: Vec<String>,
    pub processor: ProcessorConfig,
    pub queue: QueueConfig,
    pub scraper: ScraperConfig,
}

/// Background processor schedule.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
}

/// Scrape queue drain limits.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub batch_size: i64,
    pub max_items_per_pass: usize,
    pub lease_duration: Duration,
    pub max_attempts: i32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_items_per_pass: 100,
            lease_duration: Duration::from_secs(600),
            max_attempts: 3,
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let batch_size: i64 = parse_or(&lookup, "SCRAPE_QUEUE_BATCH_SIZE", 5)?;
        let max_attempts: i32 = parse_or(&lookup, "SCRAPE_MAX_ATTEMPTS", 3)?;
        if batch_size < 1 {
            anyhow::bail!("SCRAPE_QUEUE_BATCH_SIZE must be at least 1");
        }
        if max_attempts < 1 {
            anyhow::bail!("SCRAPE_MAX_ATTEMPTS must be at least 1");
        }
        let interval_minutes: u64 =
            parse_or(&lookup, "SCRAPE_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES)?;
        if !(1..=MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            anyhow::bail!(
                "SCRAPE_INTERVAL_MINUTES must be between 1 and {}",
                MAX_INTERVAL_MINUTES
            );
        }

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", 8080)?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            allowed_origins,
            processor: ProcessorConfig {
                enabled: parse_or(&lookup, "SCRAPE_PROCESSOR_ENABLED", true)?,
                interval_minutes,
            },
            queue: QueueConfig {
                batch_size,
                max_items_per_pass: parse_or(&lookup, "SCRAPE_QUEUE_MAX_ITEMS_PER_PASS", 100)?,
                lease_duration: Duration::from_secs(parse_or(
                    &lookup,
                    "SCRAPE_LEASE_SECONDS",
                    600,
                )?),
                max_attempts,
            },
            scraper: ScraperConfig {
                timeout: Duration::from_secs(parse_or(&lookup, "SCRAPER_TIMEOUT_SECONDS", 30)?),
                user_agent: lookup("SCRAPER_USER_AGENT")
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid {}", key, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/jobs")]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.database_max_connections, 10);
        assert!(config.allowed_origins.is_empty());
        assert!(config.processor.enabled);
        assert_eq!(config.processor.interval_minutes, 15);
        assert_eq!(config.queue.batch_size, 5);
        assert_eq!(config.queue.max_items_per_pass, 100);
        assert_eq!(config.queue.lease_duration, Duration::from_secs(600));
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.scraper.timeout, Duration::from_secs(30));
        assert_eq!(config.scraper.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_database_url_required() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_overrides_parsed() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db/jobs"),
            ("PORT", "3000"),
            ("SCRAPE_PROCESSOR_ENABLED", "false"),
            ("SCRAPE_INTERVAL_MINUTES", "5"),
            ("SCRAPE_LEASE_SECONDS", "30"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ])
        .unwrap();

        assert_eq!(config.port, 3000);
        assert!(!config.processor.enabled);
        assert_eq!(config.processor.interval_minutes, 5);
        assert_eq!(config.queue.lease_duration, Duration::from_secs(30));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = config_from(&[("DATABASE_URL", "postgres://db/jobs"), ("PORT", "eighty")])
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://db/jobs"),
            ("SCRAPE_QUEUE_BATCH_SIZE", "0"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SCRAPE_QUEUE_BATCH_SIZE"));
    }

    #[test]
    fn test_interval_out_of_range_rejected() {
        for minutes in ["0", "10081", "18446744073709551615"] {
            let err = config_from(&[
                ("DATABASE_URL", "postgres://db/jobs"),
                ("SCRAPE_INTERVAL_MINUTES", minutes),
            ])
            .unwrap_err();
            assert!(err.to_string().contains("SCRAPE_INTERVAL_MINUTES"), "{}", minutes);
        }
    }
}
