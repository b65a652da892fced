// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run configuration: defaults, optional JSON file, environment overrides.

use crate::retry::{RetryOn, RetryPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do with a partition whose session never reached the report page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NavigationFailurePolicy {
    /// Contribute no records for the partition.
    #[default]
    Drop,
    /// Contribute one empty-field record per item of the partition.
    Placeholder,
}

/// Configuration for harvest and taxonomy runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Number of partitions, and therefore browser sessions.
    pub worker_count: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Where the taxonomy enumerator writes its work list.
    pub taxonomy_path: PathBuf,
    pub portal_url: String,
    pub year_label: String,
    pub scheme_label: String,
    /// States walked by the taxonomy enumerator.
    pub states: Vec<String>,
    pub headless: bool,
    pub chromium_path: Option<String>,
    pub navigation_failure: NavigationFailurePolicy,

    /// Timeout for page loads, clicks and dropdown visibility.
    pub standard_timeout_ms: u64,
    /// Timeout for the result table to render inside the report frame.
    pub table_timeout_ms: u64,
    /// Settle delay after each cascade selection, drawn uniformly from the range.
    pub settle_min_ms: u64,
    pub settle_max_ms: u64,
    /// Fixed settle delay used while enumerating the taxonomy.
    pub taxonomy_settle_ms: u64,

    pub navigation_retry: RetryPolicy,
    pub selection_retry: RetryPolicy,
    pub extraction_retry: RetryPolicy,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            input_path: PathBuf::from("names.csv"),
            output_path: PathBuf::from("final_output.csv"),
            taxonomy_path: PathBuf::from("names.csv"),
            portal_url: "https://omms.nic.in/".to_string(),
            year_label: "2008-2009".to_string(),
            scheme_label: "PMGSY1".to_string(),
            states: ["Andhra Pradesh", "Bihar", "Haryana", "Maharashtra", "Rajasthan"]
                .into_iter()
                .map(String::from)
                .collect(),
            headless: true,
            chromium_path: None,
            navigation_failure: NavigationFailurePolicy::Drop,
            standard_timeout_ms: 30_000,
            table_timeout_ms: 60_000,
            settle_min_ms: 1_000,
            settle_max_ms: 2_000,
            taxonomy_settle_ms: 3_000,
            navigation_retry: RetryPolicy::new(3, 1_000, 3_000, RetryOn::Transient),
            selection_retry: RetryPolicy::new(3, 1_000, 3_000, RetryOn::Transient),
            extraction_retry: RetryPolicy::new(3, 2_000, 5_000, RetryOn::Any),
        }
    }
}

impl HarvestConfig {
    /// Resolve the configuration: defaults, then the JSON file (explicit path
    /// or `OMMS_CONFIG`), then environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("OMMS_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("OMMS_WORKERS") {
            self.worker_count = v
                .trim()
                .parse()
                .with_context(|| format!("OMMS_WORKERS is not a number: {v}"))?;
        }
        if let Ok(v) = std::env::var("OMMS_CHROMIUM_PATH") {
            self.chromium_path = Some(v);
        }
        if let Ok(v) = std::env::var("OMMS_HEADLESS") {
            self.headless = !matches!(v.trim(), "0" | "false" | "no");
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            bail!("worker_count must be at least 1");
        }
        if self.year_label.trim().is_empty() || self.scheme_label.trim().is_empty() {
            bail!("year_label and scheme_label must not be empty");
        }
        if self.standard_timeout_ms == 0 || self.table_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.settle_min_ms > self.settle_max_ms {
            bail!(
                "settle range is inverted: {}ms > {}ms",
                self.settle_min_ms,
                self.settle_max_ms
            );
        }
        for (name, policy) in [
            ("navigation_retry", &self.navigation_retry),
            ("selection_retry", &self.selection_retry),
            ("extraction_retry", &self.extraction_retry),
        ] {
            policy.validate().with_context(|| format!("invalid {name}"))?;
        }
        Ok(())
    }

    pub fn standard_timeout(&self) -> Duration {
        Duration::from_millis(self.standard_timeout_ms)
    }

    pub fn table_timeout(&self) -> Duration {
        Duration::from_millis(self.table_timeout_ms)
    }

    pub fn taxonomy_settle(&self) -> Duration {
        Duration::from_millis(self.taxonomy_settle_ms)
    }

    /// A configuration with every delay zeroed and timeouts shortened, for
    /// driving the pipeline against in-memory portals.
    pub fn immediate() -> Self {
        let mut config = Self {
            standard_timeout_ms: 100,
            table_timeout_ms: 100,
            settle_min_ms: 0,
            settle_max_ms: 0,
            taxonomy_settle_ms: 0,
            ..Self::default()
        };
        for policy in [
            &mut config.navigation_retry,
            &mut config.selection_retry,
            &mut config.extraction_retry,
        ] {
            policy.backoff_min_ms = 0;
            policy.backoff_max_ms = 0;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_portal_constants() {
        let config = HarvestConfig::default();
        assert_eq!(config.year_label, "2008-2009");
        assert_eq!(config.scheme_label, "PMGSY1");
        assert_eq!(config.standard_timeout(), Duration::from_secs(30));
        assert_eq!(config.table_timeout(), Duration::from_secs(60));
        assert_eq!(config.extraction_retry.max_attempts, 3);
        assert_eq!(config.extraction_retry.retry_on, RetryOn::Any);
        assert_eq!(config.selection_retry.retry_on, RetryOn::Transient);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "worker_count": 12, "navigation_failure": "placeholder" }}"#
        )
        .unwrap();

        let config = HarvestConfig::from_file(file.path()).unwrap();
        assert_eq!(config.worker_count, 12);
        assert_eq!(config.navigation_failure, NavigationFailurePolicy::Placeholder);
        assert_eq!(config.scheme_label, "PMGSY1");
        assert_eq!(config.selection_retry.max_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HarvestConfig::default();
        config.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::default();
        config.settle_min_ms = 5_000;
        assert!(config.validate().is_err());

        let mut config = HarvestConfig::default();
        config.selection_retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_immediate_has_no_delays() {
        let config = HarvestConfig::immediate();
        assert_eq!(config.settle_max_ms, 0);
        assert_eq!(config.navigation_retry.backoff_max_ms, 0);
        assert!(config.validate().is_ok());
    }
}
