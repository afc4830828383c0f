//! Scripted counter source for sampler and orchestrator tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CoreTickSample, MemorySource, TickBuffer, TickSource, VmPageCounts};
use crate::system::QueryError;

/// Tick buffer that counts how many instances are alive, standing in for an
/// OS-owned allocation.
#[derive(Debug)]
pub struct FakeTicks {
    cores: Vec<CoreTickSample>,
    live: Arc<AtomicUsize>,
}

impl FakeTicks {
    fn new(cores: Vec<CoreTickSample>, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        FakeTicks { cores, live }
    }
}

impl Drop for FakeTicks {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TickBuffer for FakeTicks {
    fn core_count(&self) -> usize {
        self.cores.len()
    }

    fn core(&self, index: usize) -> CoreTickSample {
        self.cores[index]
    }
}

pub fn ticks(user: u64, system: u64, idle: u64) -> CoreTickSample {
    CoreTickSample { user, system, idle }
}

/// Each `cpu_ticks` call pops the next scripted reading; `None` entries and
/// an exhausted script fail the query. Memory queries fail when their value
/// is `None`.
#[derive(Debug, Default)]
pub struct FakeCounters {
    script: VecDeque<Option<Vec<CoreTickSample>>>,
    live: Arc<AtomicUsize>,
    pub pages: Option<VmPageCounts>,
    pub page_size: Option<u64>,
    pub physical: Option<u64>,
    pub swap: Option<u64>,
}

impl FakeCounters {
    pub fn with_ticks<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = Option<Vec<CoreTickSample>>>,
    {
        FakeCounters {
            script: readings.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_memory(pages: VmPageCounts, page_size: u64, physical: u64, swap: u64) -> Self {
        FakeCounters {
            pages: Some(pages),
            page_size: Some(page_size),
            physical: Some(physical),
            swap: Some(swap),
            ..Self::default()
        }
    }

    /// Shared count of tick buffers that have not been dropped yet.
    pub fn live_buffers(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }
}

fn scripted<T>(value: Option<T>) -> Result<T, QueryError> {
    value.ok_or(QueryError::Unsupported("fake"))
}

impl TickSource for FakeCounters {
    type Buffer = FakeTicks;

    fn cpu_ticks(&mut self) -> Result<Self::Buffer, QueryError> {
        let cores = scripted(self.script.pop_front().flatten())?;
        Ok(FakeTicks::new(cores, Arc::clone(&self.live)))
    }
}

impl MemorySource for FakeCounters {
    fn vm_pages(&mut self) -> Result<VmPageCounts, QueryError> {
        scripted(self.pages)
    }

    fn page_size(&mut self) -> Result<u64, QueryError> {
        scripted(self.page_size)
    }

    fn physical_memory(&mut self) -> Result<u64, QueryError> {
        scripted(self.physical)
    }

    fn swap_used(&mut self) -> Result<u64, QueryError> {
        scripted(self.swap)
    }
}
