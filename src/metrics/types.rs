use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU and memory usage of one process at one point in time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub cpu_percent: f64,
    pub mem_percent: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMemory {
    pub used: u64,
    pub total: u64,
}

impl SystemMemory {
    /// `None` when the total is unknown (zero).
    pub fn used_percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(100.0 * self.used as f64 / self.total as f64)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub captured_at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub nodes: BTreeMap<String, Sample>,
    /// Per-node failures, only recorded when failures are isolated.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}
