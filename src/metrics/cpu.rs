use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use sysinfo::{Pid, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tokio::time::sleep;

use crate::error::{Result, StatusError};

pub(super) fn lock(system: &Mutex<System>) -> Result<MutexGuard<'_, System>> {
    system
        .lock()
        .map_err(|_| StatusError::MetricsUnavailable("sysinfo state poisoned".to_string()))
}

/// sysinfo drops CPU refreshes closer together than
/// `MINIMUM_CPU_UPDATE_INTERVAL`, so shorter windows are stretched to it.
pub fn effective_window(window: Duration) -> Duration {
    window.max(MINIMUM_CPU_UPDATE_INTERVAL)
}

/// Logical CPUs as sysinfo sees them; process usage is scaled to this count.
pub fn logical_cpu_count() -> usize {
    let mut system = System::new();
    system.refresh_cpu();
    system.cpus().len().max(1)
}

/// Average busy percentage of all CPUs over `window`. Each call measures in
/// its own `System` so no earlier refresh shortens the delta.
pub async fn sample_system_cpu(window: Duration) -> Result<f64> {
    let mut system = System::new();
    system.refresh_cpu();
    sleep(effective_window(window)).await;
    system.refresh_cpu();

    if system.cpus().is_empty() {
        return Err(StatusError::MetricsUnavailable("cpu list empty".to_string()));
    }
    let usage = f64::from(system.global_cpu_info().cpu_usage());
    Ok(usage.clamp(0.0, 100.0))
}

/// Raw usage of one process over `window`, where 100 is one fully busy core.
pub async fn sample_process_cpu(pid: u32, window: Duration) -> Result<f64> {
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(sys_pid) {
        return Err(StatusError::ProcessGone { pid });
    }
    sleep(effective_window(window)).await;

    if !system.refresh_process(sys_pid) {
        return Err(StatusError::ProcessGone { pid });
    }
    let process = system
        .process(sys_pid)
        .ok_or(StatusError::ProcessGone { pid })?;
    Ok(f64::from(process.cpu_usage()).max(0.0))
}
