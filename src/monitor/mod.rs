//! Host telemetry: CPU utilization, memory, and system identity.
//!
//! The monitors are capability traits with platform-specific variants
//! selected at build time; only Linux has a real implementation (procfs),
//! other platforms get a null monitor that reports zeros.

pub mod system;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod null;

/// System-wide CPU usage over a measurement window.
pub trait CpuMonitor: Send {
    /// Starts a new measurement period.
    fn start_measurement(&mut self);

    /// Average CPU usage percentage (0.0–100.0) across all cores since the
    /// last `start_measurement`.
    fn cpu_usage(&mut self) -> f64;
}

/// Process and system memory figures.
pub trait MemoryMonitor: Send {
    /// Current process RSS in MB.
    fn process_memory_mb(&self) -> u64;

    /// Total physical system memory in MB.
    fn total_memory_mb(&self) -> u64;
}

#[cfg(target_os = "linux")]
pub fn cpu_monitor() -> Box<dyn CpuMonitor> {
    Box::new(linux::ProcfsCpuMonitor::new())
}

#[cfg(not(target_os = "linux"))]
pub fn cpu_monitor() -> Box<dyn CpuMonitor> {
    Box::new(null::NullMonitor)
}

#[cfg(target_os = "linux")]
pub fn memory_monitor() -> Box<dyn MemoryMonitor> {
    Box::new(linux::ProcfsMemoryMonitor)
}

#[cfg(not(target_os = "linux"))]
pub fn memory_monitor() -> Box<dyn MemoryMonitor> {
    Box::new(null::NullMonitor)
}
