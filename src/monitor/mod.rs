//! Resource monitoring.
//!
//! A sampler thread probes the OS on a fixed interval and appends immutable
//! [`ResourceSnapshot`]s to a bounded ring. Readers always see complete
//! snapshots (the ring sits behind an `RwLock`; snapshots are cloned out).
//! A failed probe degrades to the last-known snapshot re-stamped and marked
//! stale — consumers slow down, they never halt.

pub mod classify;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, bounded};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::config::MonitorConfig;
use crate::error::{CgError, Result};

pub use classify::{ConstraintLevel, classify};

/// Point-in-time system load reading. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub available_memory_mb: f64,
    pub active_workers: usize,
    pub timestamp: DateTime<Utc>,
    /// Set when the OS probe failed and this is a re-stamped last reading.
    pub stale: bool,
}

/// Windowed mean over the trailing snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowedAverage {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub samples: usize,
}

/// Source of raw load readings. Seam for tests and alternative probes.
pub trait ResourceProbe: Send + Sync {
    /// Returns (cpu%, memory%, available memory in MB).
    fn sample(&self) -> Result<(f64, f64, f64)>;
}

/// `sysinfo`-backed probe.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&self) -> Result<(f64, f64, f64)> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();
        system.refresh_memory();

        let cpu = f64::from(system.global_cpu_usage());
        let total = system.total_memory();
        if total == 0 {
            return Err(CgError::ResourceQueryFailed(
                "total memory reported as zero".to_string(),
            ));
        }
        let used = system.used_memory();
        let memory = used as f64 / total as f64 * 100.0;
        let available_mb = system.available_memory() as f64 / (1024.0 * 1024.0);
        Ok((cpu, memory, available_mb))
    }
}

/// Observer invoked after each sample. Failures are logged, never raised.
pub type Observer = Box<dyn Fn(&ResourceSnapshot) -> Result<()> + Send + Sync>;

/// Gauge of currently dispatched workers, shared with the engine.
#[derive(Debug, Default, Clone)]
pub struct WorkerGauge(Arc<AtomicUsize>);

impl WorkerGauge {
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    /// Increment the gauge for the lifetime of the returned guard.
    #[must_use]
    pub fn enter(&self) -> WorkerGuard {
        self.0.fetch_add(1, Ordering::Relaxed);
        WorkerGuard(self.0.clone())
    }
}

pub struct WorkerGuard(Arc<AtomicUsize>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Periodic sampler with a bounded snapshot ring.
pub struct ResourceMonitor {
    probe: Arc<dyn ResourceProbe>,
    ring: RwLock<VecDeque<ResourceSnapshot>>,
    capacity: usize,
    interval: Duration,
    observers: RwLock<Vec<Observer>>,
    workers: WorkerGauge,
    sampler: Mutex<Option<Sampler>>,
}

struct Sampler {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl ResourceMonitor {
    #[must_use]
    pub fn new(probe: Arc<dyn ResourceProbe>, config: &MonitorConfig) -> Self {
        Self {
            probe,
            ring: RwLock::new(VecDeque::with_capacity(config.history_size)),
            capacity: config.history_size,
            interval: config.sample_interval,
            observers: RwLock::new(Vec::new()),
            workers: WorkerGauge::default(),
            sampler: Mutex::new(None),
        }
    }

    /// Gauge handle for batch dispatch to report live worker counts.
    #[must_use]
    pub fn worker_gauge(&self) -> WorkerGauge {
        self.workers.clone()
    }

    /// Register an observer called after every sample.
    pub fn add_observer(&self, observer: Observer) {
        self.observers.write().push(observer);
    }

    /// Take one sample now: probe, append, notify observers.
    pub fn sample_once(&self) {
        let snapshot = match self.probe.sample() {
            Ok((cpu, memory, available_mb)) => ResourceSnapshot {
                cpu_percent: cpu,
                memory_percent: memory,
                available_memory_mb: available_mb,
                active_workers: self.workers.count(),
                timestamp: Utc::now(),
                stale: false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "resource probe failed, degrading to stale snapshot");
                let Some(last) = self.current() else {
                    return;
                };
                ResourceSnapshot {
                    timestamp: Utc::now(),
                    stale: true,
                    ..last
                }
            }
        };

        {
            let mut ring = self.ring.write();
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(snapshot.clone());
        }

        for observer in self.observers.read().iter() {
            if let Err(err) = observer(&snapshot) {
                tracing::warn!(error = %err, "resource observer failed");
            }
        }
    }

    /// Latest snapshot, if any sample has been taken.
    #[must_use]
    pub fn current(&self) -> Option<ResourceSnapshot> {
        self.ring.read().back().cloned()
    }

    /// Arithmetic mean of cpu/memory over the trailing window, computed on
    /// demand from the ring. `None` when the window holds no samples.
    #[must_use]
    pub fn windowed_average(&self, window: Duration) -> Option<WindowedAverage> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).ok()?;
        let ring = self.ring.read();
        let mut cpu = 0.0;
        let mut memory = 0.0;
        let mut samples = 0usize;
        for snapshot in ring.iter().rev() {
            if snapshot.timestamp < cutoff {
                break;
            }
            cpu += snapshot.cpu_percent;
            memory += snapshot.memory_percent;
            samples += 1;
        }
        (samples > 0).then(|| WindowedAverage {
            cpu_percent: cpu / samples as f64,
            memory_percent: memory / samples as f64,
            samples,
        })
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.ring.read().len()
    }

    /// Start the periodic sampler thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut sampler = self.sampler.lock();
        if sampler.is_some() {
            return;
        }
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        // The thread holds only a weak handle so dropping the last external
        // Arc still reaches Drop; the upgrade failing is a second exit path
        // besides the shutdown channel.
        let weak = Arc::downgrade(self);
        let interval = self.interval;
        let spawned = std::thread::Builder::new()
            .name("cardguard-monitor".to_string())
            .spawn(move || {
                loop {
                    let Some(monitor) = weak.upgrade() else {
                        break;
                    };
                    monitor.sample_once();
                    drop(monitor);
                    // recv_timeout doubles as the sample interval and the
                    // shutdown wakeup
                    match shutdown_rx.recv_timeout(interval) {
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                // On-demand sampling still works without the thread
                tracing::error!(error = %err, "failed to spawn monitor thread");
                return;
            }
        };
        *sampler = Some(Sampler {
            shutdown: shutdown_tx,
            handle,
        });
    }

    /// Stop the sampler thread and wait for it to exit.
    pub fn stop(&self) {
        let Some(sampler) = self.sampler.lock().take() else {
            return;
        };
        drop(sampler.shutdown);
        // Drop can run on the sampler thread itself when its per-tick
        // upgrade held the last strong reference; a self-join would hang
        if sampler.handle.thread().id() != std::thread::current().id() {
            let _ = sampler.handle.join();
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
