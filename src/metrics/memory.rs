use std::sync::Mutex;

use sysinfo::{Pid, System};

use super::cpu::lock;
use super::types::SystemMemory;
use crate::error::{Result, StatusError};

pub fn read_system_memory(system: &Mutex<System>) -> Result<SystemMemory> {
    let mut guard = lock(system)?;
    guard.refresh_memory();
    let memory = SystemMemory {
        used: guard.used_memory(),
        total: guard.total_memory(),
    };
    if memory.total == 0 {
        return Err(StatusError::MetricsUnavailable(
            "total memory reported as zero".to_string(),
        ));
    }
    Ok(memory)
}

/// Resident memory of `pid` as a percentage of total memory.
pub fn read_process_memory_percent(system: &Mutex<System>, pid: u32) -> Result<f64> {
    let sys_pid = Pid::from_u32(pid);
    let mut guard = lock(system)?;
    guard.refresh_memory();
    let total = guard.total_memory();
    if total == 0 {
        return Err(StatusError::MetricsUnavailable(
            "total memory reported as zero".to_string(),
        ));
    }

    if !guard.refresh_process(sys_pid) {
        return Err(StatusError::ProcessGone { pid });
    }
    let resident = guard
        .process(sys_pid)
        .map(|process| process.memory())
        .ok_or(StatusError::ProcessGone { pid })?;
    Ok(100.0 * resident as f64 / total as f64)
}
