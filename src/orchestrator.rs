use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::sink::SnapshotSink;
use crate::system::cpu::CpuSampler;
use crate::system::memory::MemorySampler;
use crate::system::platform::{HostCounters, MemorySource, TickSource};
use crate::system::snapshot::SnapshotRecord;

/// Interval used when a caller does not pick one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest period `start` will schedule; shorter intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Idle orchestrator: owns both samplers, the host label and the sinks.
///
/// `start` moves it onto a timer task and returns a [`Running`] handle;
/// `Running::stop` hands it back.
pub struct Orchestrator<T: TickSource = HostCounters, M: MemorySource = HostCounters> {
    cpu: CpuSampler<T>,
    memory: MemorySampler<M>,
    host: Option<String>,
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::with_samplers(CpuSampler::new(), MemorySampler::new())
    }
}

impl<T: TickSource, M: MemorySource> Orchestrator<T, M> {
    pub fn with_samplers(cpu: CpuSampler<T>, memory: MemorySampler<M>) -> Self {
        Orchestrator {
            cpu,
            memory,
            host: None,
            sinks: Vec::new(),
        }
    }

    /// Label copied verbatim into every record.
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn with_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Establish the CPU baseline.
    pub fn initialize(&mut self) {
        self.cpu.initialize();
    }

    /// Sample both subsystems once and deliver the record to every sink.
    pub fn cycle(&mut self) -> SnapshotRecord {
        let _span = tracing::debug_span!("orchestrator.cycle").entered();

        let record = SnapshotRecord {
            timestamp: Utc::now(),
            host: self.host.clone(),
            cpu: self.cpu.sample(),
            memory: self.memory.sample(),
        };
        for sink in &mut self.sinks {
            if let Err(err) = sink.emit(&record) {
                tracing::warn!(error = %err, "snapshot sink failed");
            }
        }
        record
    }

    /// Release sampler resources.
    pub fn teardown(&mut self) {
        self.cpu.teardown();
    }
}

impl<T, M> Orchestrator<T, M>
where
    T: TickSource + Send + 'static,
    T::Buffer: Send + 'static,
    M: MemorySource + Send + 'static,
{
    /// Initialize, emit one record immediately, then one per `interval`
    /// (at least [`MIN_INTERVAL`]). Must be called inside a tokio runtime.
    pub fn start(mut self, interval: Duration) -> Running<T, M> {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_millis() as u64,
                "interval below minimum, using 1 ms"
            );
        }
        let interval = interval.max(MIN_INTERVAL);
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            host = self.host.as_deref().unwrap_or(""),
            "starting sampler"
        );

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (cycles_tx, cycles_rx) = watch::channel(0u64);

        let task = tokio::spawn(async move {
            self.initialize();

            // The first tick completes immediately.
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        self.cycle();
                        cycles_tx.send_modify(|n| *n += 1);
                    }
                }
            }
            self
        });

        Running {
            stop: stop_tx,
            cycles: cycles_rx,
            task,
        }
    }
}

/// Handle to an orchestrator running on its timer task.
pub struct Running<T: TickSource = HostCounters, M: MemorySource = HostCounters> {
    stop: oneshot::Sender<()>,
    cycles: watch::Receiver<u64>,
    task: JoinHandle<Orchestrator<T, M>>,
}

impl<T: TickSource, M: MemorySource> Running<T, M> {
    /// Number of cycles completed so far.
    pub fn cycles(&self) -> u64 {
        *self.cycles.borrow()
    }

    /// Resolve once at least `count` cycles have completed. Returns `false`
    /// if the task ended first; `stop` then reports why.
    pub async fn wait_for_cycles(&mut self, count: u64) -> bool {
        self.cycles.wait_for(|&n| n >= count).await.is_ok()
    }

    /// Stop scheduling cycles, let an in-flight cycle finish, then tear the
    /// CPU sampler down and return the idle orchestrator.
    pub async fn stop(self) -> Result<Orchestrator<T, M>, JoinError> {
        // The task may already be gone; the join below reports why.
        let _ = self.stop.send(());
        let mut orchestrator = self.task.await?;
        orchestrator.teardown();
        tracing::info!("sampler stopped");
        Ok(orchestrator)
    }
}
