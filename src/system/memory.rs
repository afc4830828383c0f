use super::QueryError;
use super::platform::{HostCounters, MemorySource, VmPageCounts};
use super::snapshot::MemorySnapshot;

/// Break raw page counts into activity-monitor categories.
///
/// File-backed pages are reported as cached files and taken out of the
/// active + inactive total to get app memory. Sampling skew can make the
/// file-backed count exceed active + inactive, so app memory clamps at zero.
pub fn decompose(
    pages: VmPageCounts,
    page_size: u64,
    physical_memory: u64,
    swap_used: u64,
) -> MemorySnapshot {
    let bytes = |count: u64| count.saturating_mul(page_size);

    let cached_files = bytes(pages.external);
    let app_memory = bytes(pages.active)
        .saturating_add(bytes(pages.inactive))
        .saturating_sub(cached_files);
    let wired_memory = bytes(pages.wired);
    let compressed_memory = bytes(pages.compressed);

    MemorySnapshot {
        physical_memory,
        memory_used: app_memory
            .saturating_add(wired_memory)
            .saturating_add(compressed_memory),
        app_memory,
        wired_memory,
        compressed_memory,
        cached_files,
        swap_used,
    }
}

/// Stateless memory sampler; every call reads fresh counters.
pub struct MemorySampler<S: MemorySource = HostCounters> {
    source: S,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler {
    pub fn new() -> Self {
        Self::with_source(HostCounters::new())
    }
}

impl<S: MemorySource> MemorySampler<S> {
    pub fn with_source(source: S) -> Self {
        MemorySampler { source }
    }

    /// Current memory snapshot; all zeros if the page statistics are
    /// unavailable. A swap query failure only zeroes `swap_used`.
    pub fn sample(&mut self) -> MemorySnapshot {
        self.query().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "memory query failed");
            MemorySnapshot::default()
        })
    }

    fn query(&mut self) -> Result<MemorySnapshot, QueryError> {
        let pages = self.source.vm_pages()?;
        let page_size = self.source.page_size()?;
        let physical = self.source.physical_memory()?;
        let swap = self.source.swap_used().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "swap usage query failed");
            0
        });
        Ok(decompose(pages, page_size, physical, swap))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::system::platform::fake::FakeCounters;

    const GIB: u64 = 1 << 30;

    fn pages(active: u64, inactive: u64, wired: u64, compressed: u64, external: u64) -> VmPageCounts {
        VmPageCounts {
            active,
            inactive,
            wired,
            compressed,
            external,
        }
    }

    #[test]
    fn page_scenario_matches_expected_bytes() {
        let snapshot = decompose(pages(1000, 500, 0, 0, 200), 4096, 0, 0);
        assert_eq!(snapshot.cached_files, 819_200);
        assert_eq!(snapshot.app_memory, 5_324_800);
        assert_eq!(snapshot.memory_used, 5_324_800);
    }

    #[test]
    fn app_memory_clamps_at_zero() {
        let snapshot = decompose(pages(10, 10, 5, 3, 100), 4096, 16 * GIB, 0);
        assert_eq!(snapshot.app_memory, 0);
        assert_eq!(snapshot.cached_files, 100 * 4096);
        assert_eq!(snapshot.memory_used, (5 + 3) * 4096);
    }

    #[test]
    fn sampler_forwards_physical_and_swap() {
        let source = FakeCounters::with_memory(pages(4, 2, 1, 1, 2), 16384, 8 * GIB, GIB / 2);
        let snapshot = MemorySampler::with_source(source).sample();
        assert_eq!(snapshot.physical_memory, 8 * GIB);
        assert_eq!(snapshot.swap_used, GIB / 2);
        assert_eq!(snapshot.app_memory, 4 * 16384);
        assert_eq!(snapshot.wired_memory, 16384);
        assert_eq!(snapshot.compressed_memory, 16384);
    }

    #[test]
    fn failed_page_query_zeroes_every_field() {
        let mut source = FakeCounters::with_memory(pages(4, 2, 1, 1, 2), 4096, GIB, GIB);
        source.pages = None;
        let snapshot = MemorySampler::with_source(source).sample();
        assert_eq!(snapshot, MemorySnapshot::default());
        assert_eq!(
            [
                snapshot.physical_memory,
                snapshot.memory_used,
                snapshot.app_memory,
                snapshot.wired_memory,
                snapshot.compressed_memory,
                snapshot.cached_files,
                snapshot.swap_used,
            ],
            [0; 7]
        );
    }

    #[test]
    fn failed_page_size_or_physical_zeroes_snapshot() {
        let mut no_page_size = FakeCounters::with_memory(pages(4, 2, 1, 1, 2), 4096, GIB, 0);
        no_page_size.page_size = None;
        assert_eq!(
            MemorySampler::with_source(no_page_size).sample(),
            MemorySnapshot::default()
        );

        let mut no_physical = FakeCounters::with_memory(pages(4, 2, 1, 1, 2), 4096, GIB, 0);
        no_physical.physical = None;
        assert_eq!(
            MemorySampler::with_source(no_physical).sample(),
            MemorySnapshot::default()
        );
    }

    #[test]
    fn failed_swap_query_only_zeroes_swap() {
        let mut source = FakeCounters::with_memory(pages(4, 2, 1, 1, 2), 4096, GIB, GIB);
        source.swap = None;
        let snapshot = MemorySampler::with_source(source).sample();
        assert_eq!(snapshot.swap_used, 0);
        assert_eq!(snapshot.physical_memory, GIB);
        assert_eq!(snapshot.app_memory, 4 * 4096);
    }

    proptest! {
        #[test]
        fn used_is_sum_of_parts(
            active in 0u64..1 << 32,
            inactive in 0u64..1 << 32,
            wired in 0u64..1 << 32,
            compressed in 0u64..1 << 32,
            external in 0u64..1 << 33,
            page_size in prop::sample::select(vec![4096u64, 16384]),
        ) {
            let s = decompose(pages(active, inactive, wired, compressed, external), page_size, 0, 0);
            prop_assert_eq!(s.memory_used, s.app_memory + s.wired_memory + s.compressed_memory);
            prop_assert_eq!(s.cached_files, external * page_size);
            if (active + inactive) < external {
                prop_assert_eq!(s.app_memory, 0);
            } else {
                prop_assert_eq!(s.app_memory, (active + inactive - external) * page_size);
            }
        }
    }
}
