use crate::query::DEFAULT_PAGE_SIZE;
use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:3146";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_METADATA_LATENCY_MS: u64 = 1500;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
    pub page_size: usize,
    pub metadata_fixture: Option<PathBuf>,
    pub metadata_latency: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = get("CATALOG_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("CATALOG_ADDR must be a socket address like 127.0.0.1:3146")?;

        let data_dir = get("CATALOG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let page_size = match get("CATALOG_PAGE_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    anyhow!("CATALOG_PAGE_SIZE must be a positive integer, got '{}'", raw)
                })?,
            None => DEFAULT_PAGE_SIZE,
        };

        let metadata_fixture = get("METADATA_FIXTURE").map(PathBuf::from);

        let latency_ms = match get("METADATA_LATENCY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| {
                    format!("METADATA_LATENCY_MS must be milliseconds, got '{}'", raw)
                })?,
            None => DEFAULT_METADATA_LATENCY_MS,
        };

        Ok(Self {
            addr,
            data_dir,
            page_size,
            metadata_fixture,
            metadata_latency: Duration::from_millis(latency_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:3146".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.page_size, 9);
        assert_eq!(cfg.metadata_fixture, None);
        assert_eq!(cfg.metadata_latency, Duration::from_millis(1500));
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("CATALOG_ADDR", "0.0.0.0:8080"),
            ("CATALOG_DATA_DIR", "/var/lib/shelf"),
            ("CATALOG_PAGE_SIZE", "12"),
            ("METADATA_FIXTURE", "fixture.json"),
            ("METADATA_LATENCY_MS", "0"),
            ("UNRELATED", "x"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.page_size, 12);
        assert_eq!(cfg.metadata_fixture, Some(PathBuf::from("fixture.json")));
        assert_eq!(cfg.metadata_latency, Duration::ZERO);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("CATALOG_PAGE_SIZE", "0")]).is_err());
        assert!(config(&[("CATALOG_PAGE_SIZE", "nine")]).is_err());
        assert!(config(&[("CATALOG_ADDR", "localhost")]).is_err());
        assert!(config(&[("METADATA_LATENCY_MS", "-5")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("CATALOG_PAGE_SIZE", "  "), ("METADATA_FIXTURE", "")]).unwrap();
        assert_eq!(cfg.page_size, 9);
        assert_eq!(cfg.metadata_fixture, None);
    }
}
