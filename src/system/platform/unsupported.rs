use super::{CoreTickSample, MemorySource, TickSource, VmPageCounts};
use crate::system::QueryError;

/// Placeholder for targets without a counter backend. Every query fails, so
/// samplers report empty/zero snapshots.
#[derive(Debug, Default)]
pub struct HostCounters;

impl HostCounters {
    pub fn new() -> Self {
        HostCounters
    }
}

fn unsupported<T>() -> Result<T, QueryError> {
    Err(QueryError::Unsupported(std::env::consts::OS))
}

impl TickSource for HostCounters {
    type Buffer = Vec<CoreTickSample>;

    fn cpu_ticks(&mut self) -> Result<Self::Buffer, QueryError> {
        unsupported()
    }
}

impl MemorySource for HostCounters {
    fn vm_pages(&mut self) -> Result<VmPageCounts, QueryError> {
        unsupported()
    }

    fn page_size(&mut self) -> Result<u64, QueryError> {
        unsupported()
    }

    fn physical_memory(&mut self) -> Result<u64, QueryError> {
        unsupported()
    }

    fn swap_used(&mut self) -> Result<u64, QueryError> {
        unsupported()
    }
}
