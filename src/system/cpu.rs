use super::platform::{CoreTickSample, HostCounters, TickBuffer, TickSource};
use super::snapshot::CpuSnapshot;

/// Utilization of one core between two tick readings, in percent.
///
/// Counters are monotonic; a counter that went backwards is treated as no
/// progress rather than wrapping.
pub fn core_utilization(prev: CoreTickSample, cur: CoreTickSample) -> f64 {
    let used = cur
        .user
        .saturating_sub(prev.user)
        .saturating_add(cur.system.saturating_sub(prev.system));
    let total = used.saturating_add(cur.idle.saturating_sub(prev.idle));
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

/// Delta-based per-core CPU sampler.
///
/// Keeps the previous tick buffer as its baseline. `sample` takes `&mut self`
/// because it reads and replaces that baseline; share a sampler across
/// threads only behind a `Mutex`.
pub struct CpuSampler<S: TickSource = HostCounters> {
    source: S,
    previous: Option<S::Buffer>,
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::with_source(HostCounters::new())
    }
}

impl<S: TickSource> CpuSampler<S> {
    pub fn with_source(source: S) -> Self {
        CpuSampler {
            source,
            previous: None,
        }
    }

    /// Capture the baseline. The returned snapshot is all zeros (or empty if
    /// the query failed); only later samples carry utilization.
    pub fn initialize(&mut self) -> CpuSnapshot {
        self.sample()
    }

    pub fn sample(&mut self) -> CpuSnapshot {
        let current = match self.source.cpu_ticks() {
            Ok(buffer) => buffer,
            Err(err) => {
                tracing::debug!(error = %err, "cpu tick query failed");
                return CpuSnapshot::empty();
            }
        };

        let cores = current.core_count();
        let snapshot = match &self.previous {
            Some(prev) if prev.core_count() == cores => CpuSnapshot::from_per_core(
                (0..cores)
                    .map(|i| core_utilization(prev.core(i), current.core(i)))
                    .collect(),
            ),
            Some(prev) => {
                tracing::debug!(
                    previous = prev.core_count(),
                    current = cores,
                    "core count changed, resetting baseline"
                );
                CpuSnapshot::idle(cores)
            }
            None => CpuSnapshot::idle(cores),
        };

        // Dropping the old baseline releases its buffer.
        self.previous = Some(current);
        snapshot
    }

    /// Release the retained baseline. The next sample starts from scratch.
    pub fn teardown(&mut self) {
        self.previous = None;
    }

    /// Core count of the retained baseline, if any.
    pub fn baseline_cores(&self) -> Option<usize> {
        self.previous.as_ref().map(TickBuffer::core_count)
    }
}
