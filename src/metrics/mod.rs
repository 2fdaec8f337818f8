mod cpu;
mod memory;
mod types;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::System;

use crate::error::{Result, StatusError};

pub use cpu::effective_window;
pub use types::{Report, Sample, SystemMemory};

/// OS-level CPU and memory figures, system-wide and per process.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Average utilisation of all CPUs over `window`, in `[0, 100]`.
    /// Implementations may stretch a window shorter than they can resolve.
    async fn system_cpu_percent(&self, window: Duration) -> Result<f64>;

    fn system_memory(&self) -> Result<SystemMemory>;

    /// Raw process utilisation over `window`; one busy core reads 100.
    async fn process_cpu_percent(&self, pid: u32, window: Duration) -> Result<f64>;

    fn process_memory_percent(&self, pid: u32) -> Result<f64>;

    fn logical_cpu_count(&self) -> usize;
}

/// `MetricsProvider` backed by `sysinfo`.
pub struct SysinfoMetrics {
    memory: Mutex<System>,
    cpu_count: usize,
}

impl SysinfoMetrics {
    pub fn new() -> Result<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(StatusError::MetricsUnavailable(format!(
                "sysinfo does not support {}",
                std::env::consts::OS
            )));
        }
        Ok(SysinfoMetrics {
            memory: Mutex::new(System::new()),
            cpu_count: cpu::logical_cpu_count(),
        })
    }
}

#[async_trait]
impl MetricsProvider for SysinfoMetrics {
    async fn system_cpu_percent(&self, window: Duration) -> Result<f64> {
        cpu::sample_system_cpu(window).await
    }

    fn system_memory(&self) -> Result<SystemMemory> {
        memory::read_system_memory(&self.memory)
    }

    async fn process_cpu_percent(&self, pid: u32, window: Duration) -> Result<f64> {
        cpu::sample_process_cpu(pid, window).await
    }

    fn process_memory_percent(&self, pid: u32) -> Result<f64> {
        memory::read_process_memory_percent(&self.memory, pid)
    }

    fn logical_cpu_count(&self) -> usize {
        self.cpu_count
    }
}
