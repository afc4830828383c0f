use super::QueryError;

/// Cumulative ticks for one core since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoreTickSample {
    pub user: u64,
    pub system: u64,
    pub idle: u64,
}

/// Raw page counts from the VM subsystem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VmPageCounts {
    pub active: u64,
    pub inactive: u64,
    pub wired: u64,
    pub compressed: u64,
    /// File-backed pages.
    pub external: u64,
}

/// One captured set of per-core tick counters.
///
/// Implementations may own OS memory; dropping the buffer releases it.
pub trait TickBuffer {
    fn core_count(&self) -> usize;
    /// Ticks for `index`, which must be below `core_count()`.
    fn core(&self, index: usize) -> CoreTickSample;
}

impl TickBuffer for Vec<CoreTickSample> {
    fn core_count(&self) -> usize {
        self.len()
    }

    fn core(&self, index: usize) -> CoreTickSample {
        self[index]
    }
}

pub trait TickSource {
    type Buffer: TickBuffer;

    fn cpu_ticks(&mut self) -> Result<Self::Buffer, QueryError>;
}

/// Memory counters. `vm_pages` is queried first on every sample; backends
/// that read all values in one pass refresh there.
pub trait MemorySource {
    fn vm_pages(&mut self) -> Result<VmPageCounts, QueryError>;
    fn page_size(&mut self) -> Result<u64, QueryError>;
    fn physical_memory(&mut self) -> Result<u64, QueryError>;
    fn swap_used(&mut self) -> Result<u64, QueryError>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use unsupported as platform_impl;

/// Counter source for the host this binary runs on.
pub type HostCounters = platform_impl::HostCounters;

/// Hostname used as the default record label.
pub fn host_name() -> Option<String> {
    sysinfo::System::host_name()
}

#[cfg(test)]
pub mod fake;
