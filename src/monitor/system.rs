//! Static system identity used in the report header.

use serde::{Deserialize, Serialize};

/// Snapshot of the host taken once before the benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSummary {
    pub cpu_name: String,
    pub thread_count: usize,
    pub total_memory_mb: u64,
}

impl SystemSummary {
    pub fn gather() -> Self {
        Self {
            cpu_name: cpu_name(),
            thread_count: logical_cpus(),
            total_memory_mb: super::memory_monitor().total_memory_mb(),
        }
    }
}

/// Logical CPU count; falls back to 4 when the runtime cannot tell.
pub fn logical_cpus() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

#[cfg(target_os = "linux")]
pub fn cpu_name() -> String {
    std::fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|cpuinfo| parse_model_name(&cpuinfo))
        .unwrap_or_else(|| "Unknown CPU".to_string())
}

#[cfg(not(target_os = "linux"))]
pub fn cpu_name() -> String {
    "Unknown CPU".to_string()
}

#[cfg(target_os = "linux")]
fn parse_model_name(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|line| line.starts_with("model name"))
        .and_then(|line| line.split(':').nth(1))
        .map(|name| name.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_cpus_nonzero() {
        assert!(logical_cpus() >= 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_model_name() {
        let cpuinfo = "processor\t: 0\nmodel name\t: AMD Ryzen 9 5950X 16-Core Processor\nstepping: 0\n";
        assert_eq!(
            parse_model_name(cpuinfo).as_deref(),
            Some("AMD Ryzen 9 5950X 16-Core Processor")
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_parse_model_name_missing() {
        assert!(parse_model_name("processor: 0\n").is_none());
    }
}
