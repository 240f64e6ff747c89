//! Process resource reporting for transfer runs.
//!
//! Record sets are materialized in memory, so resident memory is the number
//! worth watching on large tables.

#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
    pub cpu_usage: f32,
    pub elapsed: Duration,
}

#[cfg(feature = "cli")]
pub struct TransferMonitor {
    system: System,
    pid: Option<Pid>,
    started: Instant,
    peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
impl TransferMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid().ok()
        } else {
            None
        };

        Self {
            system: System::new(),
            pid,
            started: Instant::now(),
            peak_memory_mb: 0,
        }
    }

    pub fn snapshot(&mut self) -> Option<ProcessSnapshot> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        let process = self.system.process(pid)?;

        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);

        Some(ProcessSnapshot {
            memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            cpu_usage: process.cpu_usage(),
            elapsed: self.started.elapsed(),
        })
    }

    pub fn log_phase(&mut self, phase: &str, records: usize) {
        if let Some(stats) = self.snapshot() {
            tracing::info!(
                phase,
                records,
                memory_mb = stats.memory_mb,
                peak_memory_mb = stats.peak_memory_mb,
                cpu = format!("{:.1}%", stats.cpu_usage),
                elapsed = ?stats.elapsed,
                "process stats"
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pid.is_some()
    }
}

#[cfg(not(feature = "cli"))]
pub struct TransferMonitor;

#[cfg(not(feature = "cli"))]
impl TransferMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_phase(&mut self, _phase: &str, _records: usize) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
