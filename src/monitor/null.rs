//! Fallback monitor for platforms without a telemetry backend.

use super::{CpuMonitor, MemoryMonitor};

/// Reports zeros everywhere; keeps the benchmark runnable (CPU pass
/// criteria become vacuous) on unsupported hosts.
pub struct NullMonitor;

impl CpuMonitor for NullMonitor {
    fn start_measurement(&mut self) {}

    fn cpu_usage(&mut self) -> f64 {
        0.0
    }
}

impl MemoryMonitor for NullMonitor {
    fn process_memory_mb(&self) -> u64 {
        0
    }

    fn total_memory_mb(&self) -> u64 {
        0
    }
}
