//! Host utilization gauges.
//!
//! The gauges are observed by the meter provider on its own export cadence. This module
//! only supplies the callbacks. A failed read yields no observation for that cycle.

use crate::error::ProbeError;
use opentelemetry::{
    InstrumentationScope,
    metrics::{MeterProvider, ObservableGauge},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use sysinfo::{Disks, System};
use tracing::{debug, info, trace};

pub const CPU_UTILIZATION: &str = "system.cpu.utilization";
pub const MEMORY_UTILIZATION: &str = "system.memory.utilization";
pub const DISK_UTILIZATION: &str = "system.disk.utilization";

/// Source of host utilization ratios in `[0.0, 1.0]`.
///
/// Called concurrently and repeatedly for the lifetime of the meter provider.
pub trait HostProbe: Send + Sync + 'static {
    fn cpu_utilization(&self) -> Result<f64, ProbeError>;
    fn memory_utilization(&self) -> Result<f64, ProbeError>;
    fn disk_utilization(&self) -> Result<f64, ProbeError>;
}

/// Registered gauges. Dropped on shutdown together with the meter provider.
pub struct HostMetrics {
    _gauges: [ObservableGauge<f64>; 3],
}

impl HostMetrics {
    /// Registers the gauges backed by [`SysinfoProbe`].
    ///
    /// Returns `None` when the platform has no OS metrics support.
    pub fn start(
        provider: &SdkMeterProvider,
        scope: String,
        version: &'static str,
        interval: Duration,
    ) -> Option<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            debug!("OS metrics unsupported on this platform, system metrics disabled");
            return None;
        }

        let metrics = Self::with_probe(provider, scope, version, SysinfoProbe::new(interval));
        info!(interval_secs = interval.as_secs_f64(), "System metrics collection started");
        Some(metrics)
    }

    pub fn with_probe(
        provider: &SdkMeterProvider,
        scope: String,
        version: &'static str,
        probe: impl HostProbe,
    ) -> Self {
        let probe = Arc::new(probe);
        let meter = provider.meter_with_scope(
            InstrumentationScope::builder(scope)
                .with_version(version)
                .build(),
        );

        let gauge = |name: &'static str, description: &'static str, read: Reader| {
            let probe = Arc::clone(&probe);
            meter
                .f64_observable_gauge(name)
                .with_description(description)
                .with_unit("1")
                .with_callback(move |observer| {
                    observe(name, read(&*probe), |value| observer.observe(value, &[]))
                })
                .build()
        };

        Self {
            _gauges: [
                gauge(CPU_UTILIZATION, "CPU utilization (0.0 to 1.0)", |p| {
                    p.cpu_utilization()
                }),
                gauge(MEMORY_UTILIZATION, "Memory utilization (0.0 to 1.0)", |p| {
                    p.memory_utilization()
                }),
                gauge(DISK_UTILIZATION, "Disk utilization (0.0 to 1.0)", |p| {
                    p.disk_utilization()
                }),
            ],
        }
    }
}

type Reader = fn(&dyn HostProbe) -> Result<f64, ProbeError>;

/// Records one sample, or nothing when the probe failed.
fn observe(gauge: &str, sample: Result<f64, ProbeError>, record: impl FnOnce(f64)) {
    match sample {
        Ok(value) => record(value.clamp(0.0, 1.0)),
        Err(error) => trace!(%error, gauge, "Skipping host metric observation"),
    }
}

#[derive(Clone, Copy, Default)]
struct Snapshot {
    cpu: Option<f64>,
    memory: Option<f64>,
    disk: Option<f64>,
}

struct ProbeState {
    system: System,
    refreshed_at: Option<Instant>,
    snapshot: Snapshot,
}

/// [`HostProbe`] backed by `sysinfo`.
///
/// OS statistics are refreshed at most once per `interval`. Reads in between are served
/// from the last snapshot.
pub struct SysinfoProbe {
    interval: Duration,
    state: Mutex<ProbeState>,
}

impl SysinfoProbe {
    pub fn new(interval: Duration) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one.
        system.refresh_cpu_usage();

        Self {
            interval,
            state: Mutex::new(ProbeState {
                system,
                refreshed_at: None,
                snapshot: Snapshot::default(),
            }),
        }
    }

    fn snapshot(&self) -> Result<Snapshot, ProbeError> {
        let mut state = self.state.lock().map_err(|_| ProbeError::Poisoned)?;

        let stale = state
            .refreshed_at
            .is_none_or(|at| at.elapsed() >= self.interval);
        if stale {
            let system = &mut state.system;
            system.refresh_cpu_usage();
            system.refresh_memory();

            let cpu = f64::from(system.global_cpu_usage()) / 100.0;
            let memory = ratio(system.used_memory(), system.total_memory());
            let disk = root_disk_utilization(&Disks::new_with_refreshed_list());

            state.snapshot = Snapshot {
                cpu: cpu.is_finite().then_some(cpu),
                memory,
                disk,
            };
            state.refreshed_at = Some(Instant::now());
        }

        Ok(state.snapshot)
    }
}

impl HostProbe for SysinfoProbe {
    fn cpu_utilization(&self) -> Result<f64, ProbeError> {
        self.snapshot()?.cpu.ok_or(ProbeError::Unavailable("cpu"))
    }

    fn memory_utilization(&self) -> Result<f64, ProbeError> {
        self.snapshot()?.memory.ok_or(ProbeError::Unavailable("memory"))
    }

    fn disk_utilization(&self) -> Result<f64, ProbeError> {
        self.snapshot()?.disk.ok_or(ProbeError::Unavailable("disk"))
    }
}

fn ratio(used: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| used as f64 / total as f64)
}

/// Utilization of the disk mounted at `/`, or of the first disk when there is none.
fn root_disk_utilization(disks: &Disks) -> Option<f64> {
    let disk = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first())?;

    let total = disk.total_space();
    ratio(total.saturating_sub(disk.available_space()), total)
}
