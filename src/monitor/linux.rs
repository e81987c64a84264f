//! Linux telemetry via procfs text interfaces.

use std::fs;

use super::{CpuMonitor, MemoryMonitor};

/// Aggregate jiffy counters from the first line of `/proc/stat`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    active: u64,
    idle: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.active + self.idle
    }
}

/// Parses the aggregate `cpu` line: user nice system idle iowait irq
/// softirq steal. iowait counts as idle, steal as active.
fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let mut fields = line.split_whitespace().skip(1);
    let mut next = || fields.next()?.parse::<u64>().ok();

    let user = next()?;
    let nice = next()?;
    let system = next()?;
    let idle = next()?;
    let iowait = next().unwrap_or(0);
    let irq = next().unwrap_or(0);
    let softirq = next().unwrap_or(0);
    let steal = next().unwrap_or(0);

    Some(CpuTimes {
        active: user + nice + system + irq + softirq + steal,
        idle: idle + iowait,
    })
}

/// Extracts a `kB` field like `VmRSS:` or `MemTotal:` from procfs text.
fn parse_kib_field(text: &str, field: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with(field))?;
    line[field.len()..]
        .split_whitespace()
        .next()?
        .parse::<u64>()
        .ok()
}

pub struct ProcfsCpuMonitor {
    baseline: CpuTimes,
}

impl ProcfsCpuMonitor {
    pub fn new() -> Self {
        Self {
            baseline: CpuTimes::default(),
        }
    }

    fn sample() -> CpuTimes {
        fs::read_to_string("/proc/stat")
            .ok()
            .and_then(|stat| parse_cpu_times(&stat))
            .unwrap_or_default()
    }
}

impl Default for ProcfsCpuMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuMonitor for ProcfsCpuMonitor {
    fn start_measurement(&mut self) {
        self.baseline = Self::sample();
    }

    fn cpu_usage(&mut self) -> f64 {
        let current = Self::sample();
        let total_delta = current.total().saturating_sub(self.baseline.total());
        let idle_delta = current.idle.saturating_sub(self.baseline.idle);
        if total_delta == 0 {
            return 0.0;
        }
        100.0 * (1.0 - idle_delta as f64 / total_delta as f64)
    }
}

pub struct ProcfsMemoryMonitor;

impl MemoryMonitor for ProcfsMemoryMonitor {
    fn process_memory_mb(&self) -> u64 {
        fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|status| parse_kib_field(&status, "VmRSS:"))
            .map_or(0, |kib| kib / 1024)
    }

    fn total_memory_mb(&self) -> u64 {
        fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|meminfo| parse_kib_field(&meminfo, "MemTotal:"))
            .map_or(0, |kib| kib / 1024)
    }
}
