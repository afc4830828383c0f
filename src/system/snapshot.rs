use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-core utilization for one sampling cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CpuSnapshot {
    pub per_core: Vec<f64>,
    pub average: f64,
}

impl CpuSnapshot {
    pub fn from_per_core(per_core: Vec<f64>) -> Self {
        let average = if per_core.is_empty() {
            0.0
        } else {
            per_core.iter().sum::<f64>() / per_core.len() as f64
        };
        CpuSnapshot { per_core, average }
    }

    /// All-zero utilization for `cores` cores, reported while no usable
    /// baseline exists.
    pub fn idle(cores: usize) -> Self {
        Self::from_per_core(vec![0.0; cores])
    }

    /// No data this cycle.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn core_count(&self) -> usize {
        self.per_core.len()
    }
}

/// Memory categories in bytes, decomposed the way an activity monitor
/// reports them.
///
/// `memory_used` is always `app_memory + wired_memory + compressed_memory`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub physical_memory: u64,
    pub memory_used: u64,
    pub app_memory: u64,
    pub wired_memory: u64,
    pub compressed_memory: u64,
    pub cached_files: u64,
    pub swap_used: u64,
}

/// One combined record, emitted once per cycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SnapshotRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
}
