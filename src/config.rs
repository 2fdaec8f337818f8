// src/config.rs

use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::metrics::effective_window;

pub const DEFAULT_MASTER_URI: &str = "http://localhost:11311/";
pub const DEFAULT_CALLER_ID: &str = "/ros_status";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    // Registry
    pub master_uri: String,         // Default: $ROS_MASTER_URI or localhost:11311
    pub caller_id: String,          // Default: /ros_status
    pub rpc_timeout_ms: u64,        // Default: 5000

    // Sampling
    pub sampling_window_ms: u64,    // Default: 100
    pub isolate_failures: bool,     // Default: false (first failure aborts)
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            master_uri: DEFAULT_MASTER_URI.to_string(),
            caller_id: DEFAULT_CALLER_ID.to_string(),
            rpc_timeout_ms: 5_000,
            sampling_window_ms: 100,
            isolate_failures: false,
        }
    }
}

impl ReporterConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ReporterConfig::default();

        if let Some(uri) = non_empty(lookup("ROS_MASTER_URI")) {
            config.master_uri = uri;
        }
        if let Some(caller_id) = non_empty(lookup("ROS_STATUS_CALLER_ID")) {
            config.caller_id = caller_id;
        }
        if let Some(ms) = parse_var(&lookup, "ROS_STATUS_SAMPLING_MS") {
            if ms == 0 {
                warn!("ROS_STATUS_SAMPLING_MS must be positive, keeping {}", config.sampling_window_ms);
            } else {
                let requested = Duration::from_millis(ms);
                let measured = effective_window(requested);
                if measured > requested {
                    warn!(
                        "ROS_STATUS_SAMPLING_MS={} is below what sysinfo resolves, CPU is measured over {:?}",
                        ms, measured
                    );
                }
                config.sampling_window_ms = ms;
            }
        }
        if let Some(ms) = parse_var(&lookup, "ROS_STATUS_RPC_TIMEOUT_MS") {
            if ms == 0 {
                warn!("ROS_STATUS_RPC_TIMEOUT_MS must be positive, keeping {}", config.rpc_timeout_ms);
            } else {
                config.rpc_timeout_ms = ms;
            }
        }
        if let Some(raw) = non_empty(lookup("ROS_STATUS_ISOLATE_FAILURES")) {
            match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.isolate_failures = true,
                "0" | "false" | "no" | "off" => config.isolate_failures = false,
                _ => warn!("ignoring ROS_STATUS_ISOLATE_FAILURES={:?}", raw),
            }
        }

        config
    }

    pub fn sampling_options(&self) -> SamplingOptions {
        SamplingOptions {
            sampling_window: Duration::from_millis(self.sampling_window_ms),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

/// Options recognised by the statistics operations.
///
/// The sysinfo provider cannot resolve CPU usage over less than
/// `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` (200 ms on Linux); shorter windows
/// are measured over that minimum instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    pub sampling_window: Duration,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        SamplingOptions {
            sampling_window: Duration::from_millis(100),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = non_empty(lookup(key))?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {}={:?}: not a whole number of milliseconds", key, raw);
            None
        }
    }
}
