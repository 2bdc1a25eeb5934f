//! Configuration loading: a TOML file into [`Config`], with the
//! defaults listed in `SPEC_FULL.md` §4.9.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("crawler.user_agent is required")]
    MissingUserAgent,
    #[error("crawler.workers must be at least 1")]
    MissingWorkers,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct CrawlerConfig {
    pub user_agent: String,
    #[serde(default = "default_seeds_file")]
    pub seeds_file: String,
    #[serde(default)]
    pub crawl_limit: usize,
    pub workers: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PolitenessConfig {
    pub delay: String,
    pub robots_timeout: String,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            delay: "1s".to_string(),
            robots_timeout: "10s".to_string(),
        }
    }
}

impl PolitenessConfig {
    pub fn delay(&self) -> Duration {
        parse_duration(&self.delay).unwrap_or_else(|| {
            tracing::warn!(value = %self.delay, "invalid politeness.delay, falling back to 1s");
            Duration::from_secs(1)
        })
    }

    pub fn robots_timeout(&self) -> Duration {
        parse_duration(&self.robots_timeout).unwrap_or_else(|| {
            tracing::warn!(value = %self.robots_timeout, "invalid politeness.robots_timeout, falling back to 10s");
            Duration::from_secs(10)
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_seeds_file() -> String {
    "seeds.txt".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();

        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        if config.crawler.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingUserAgent);
        }
        if config.crawler.workers == 0 {
            return Err(ConfigError::MissingWorkers);
        }

        Ok(config)
    }
}

/// Parses the informal `"500ms"` / `"1s"` / `"2m"` / `"1h"` grammar
/// used by the duration-valued config keys.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split_at = value.find(|c: char| !c.is_ascii_digit())?;
    let (amount, unit) = value.split_at(split_at);
    let amount: u64 = amount.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(amount)),
        "s" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_secs(amount * 60)),
        "h" => Some(Duration::from_secs(amount * 3600)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration("not-a-duration"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [crawler]
            user_agent = "test-bot/1.0"
            workers = 4
            "#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.crawler.seeds_file, "seeds.txt");
        assert_eq!(config.crawler.crawl_limit, 0);
        assert_eq!(config.politeness.delay(), Duration::from_secs(1));
        assert_eq!(config.logging.format, "text");
    }

    #[test]
    fn rejects_missing_user_agent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[crawler]\nworkers = 1\nuser_agent = \"\"\n").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::MissingUserAgent)
        ));
    }

    #[test]
    fn rejects_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[crawler]\nuser_agent = \"bot\"\nworkers = 0\n",
        )
        .unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::MissingWorkers)
        ));
    }
}
