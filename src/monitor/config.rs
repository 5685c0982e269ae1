use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_LATEST_RECORDS: usize = 5;
pub const MIN_LATEST_RECORDS: usize = 3;
pub const MAX_LATEST_RECORDS: usize = 10;

/// Tunables for one monitoring run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Overall bound on a run; stimulus-to-persistence usually takes 1-10 s.
    pub timeout_secs: u64,

    pub poll_interval_ms: u64,

    /// Size of the latest-records window, clamped to 3..=10.
    pub latest_records: usize,

    /// Characters of a record's value kept in summaries.
    pub value_preview_chars: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            latest_records: DEFAULT_LATEST_RECORDS,
            value_preview_chars: 50,
        }
    }
}

impl MonitorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn latest_records_window(&self) -> usize {
        self.latest_records.clamp(MIN_LATEST_RECORDS, MAX_LATEST_RECORDS)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        if self.poll_interval() > self.timeout() {
            bail!(
                "poll interval ({}ms) exceeds timeout ({}s)",
                self.poll_interval_ms,
                self.timeout_secs
            );
        }
        Ok(())
    }
}
