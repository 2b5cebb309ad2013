//! Configuration Management
//!
//! Handles persistent configuration storage for ibm-findings.

use crate::ibm::client::Endpoints;
use crate::pagination::{Collector, DEFAULT_MAX_PAGES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_REGION: &str = "us-south";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Account listed when none is given on the command line
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// IAM endpoint override
    #[serde(default)]
    pub iam_url: Option<String>,
    /// Findings endpoint override
    #[serde(default)]
    pub findings_url: Option<String>,
    /// Per-request page size
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Page budget for one listing
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ibm-findings").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; a missing or unreadable file gives defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective account (config > IC_ACCOUNT_ID); `None` means the
    /// API key's own account
    pub fn effective_account(&self) -> Option<String> {
        non_empty(self.account_id.clone())
            .or_else(|| non_empty(std::env::var("IC_ACCOUNT_ID").ok()))
    }

    /// Get effective region (config > IC_REGION > us-south)
    pub fn effective_region(&self) -> String {
        non_empty(self.region.clone())
            .or_else(|| non_empty(std::env::var("IC_REGION").ok()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Endpoints for a region, with configured overrides applied
    pub fn endpoints(&self, region: &str) -> Endpoints {
        let mut endpoints = Endpoints::for_region(region);
        if let Some(url) = &self.iam_url {
            endpoints.iam_url = url.clone();
        }
        if let Some(url) = &self.findings_url {
            endpoints.findings_url = url.clone();
        }
        endpoints
    }

    /// Collection policy from configuration
    pub fn collector(&self) -> Collector {
        let mut collector =
            Collector::new().with_max_pages(self.max_pages.unwrap_or(DEFAULT_MAX_PAGES));
        if let Some(page_size) = self.page_size {
            collector = collector.with_page_size(page_size);
        }
        collector
    }

    /// Set account and save
    pub fn set_account(&mut self, account_id: &str) -> Result<()> {
        self.account_id = Some(account_id.to_string());
        self.save()
    }

    /// Set region and save
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        self.region = Some(region.to_string());
        self.save()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibm::auth::DEFAULT_IAM_URL;
    use crate::pagination::{Page, PageRequest};
    use std::cell::Cell;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ibm-findings-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(&temp_path("does-not-exist.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_path("config.json");
        let config = Config {
            account_id: Some("acct".to_string()),
            page_size: Some(50),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let path = temp_path("malformed.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_endpoint_overrides() {
        let config = Config {
            findings_url: Some("http://localhost:9000/findings".to_string()),
            ..Default::default()
        };

        let endpoints = config.endpoints("eu-gb");
        assert_eq!(endpoints.findings_url, "http://localhost:9000/findings");
        assert_eq!(endpoints.iam_url, DEFAULT_IAM_URL);
    }

    #[test]
    fn test_collector_from_config() {
        let config = Config {
            page_size: Some(25),
            max_pages: Some(7),
            ..Default::default()
        };

        let collector = config.collector();
        assert_eq!(collector.page_size, Some(25));
        assert_eq!(collector.max_pages, 7);
        assert_eq!(Config::default().collector(), Collector::default());
    }

    #[test]
    fn test_zero_max_pages_still_lists_empty_collection() {
        let config = Config {
            max_pages: Some(0),
            ..Default::default()
        };

        let calls = Cell::new(0);
        let source = |_: PageRequest| {
            calls.set(calls.get() + 1);
            async { Ok::<_, anyhow::Error>(Page::new(Vec::<u32>::new(), 0)) }
        };

        let collected =
            tokio_test::block_on(config.collector().collect_all(&source, PageRequest::all()))
                .unwrap();
        assert!(collected.items.is_empty());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_effective_account_order() {
        std::env::set_var("IC_ACCOUNT_ID", "env-acct");

        let config = Config {
            account_id: Some("cfg-acct".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_account(), Some("cfg-acct".to_string()));

        let blank = Config {
            account_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank.effective_account(), Some("env-acct".to_string()));
        assert_eq!(Config::default().effective_account(), Some("env-acct".to_string()));

        std::env::set_var("IC_ACCOUNT_ID", "");
        assert_eq!(Config::default().effective_account(), None);

        std::env::remove_var("IC_ACCOUNT_ID");
        assert_eq!(Config::default().effective_account(), None);
    }

    #[test]
    fn test_effective_region_order() {
        std::env::set_var("IC_REGION", "eu-de");

        let config = Config {
            region: Some("jp-tok".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_region(), "jp-tok");
        assert_eq!(Config::default().effective_region(), "eu-de");

        let blank = Config {
            region: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.effective_region(), "eu-de");

        std::env::set_var("IC_REGION", "");
        assert_eq!(Config::default().effective_region(), DEFAULT_REGION);

        std::env::remove_var("IC_REGION");
        assert_eq!(Config::default().effective_region(), DEFAULT_REGION);
    }
}
