//! Delta-sampled per-core CPU utilization and activity-monitor style memory
//! categories, read straight from OS counters.

pub mod config;
pub mod format;
pub mod orchestrator;
pub mod sink;
pub mod system;
