//! Resource telemetry for the local device.
//!
//! While the room is connected, [`TelemetrySampler`] samples CPU, memory and
//! battery on a fixed interval and reports three display strings to a
//! [`TelemetrySink`]. It never touches room state.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut sampler = TelemetrySampler::new(Box::new(SysinfoProbe::new()), sink, interval);
//! sampler.start(&cancel_token);
//! // ...
//! sampler.stop().await;
//! ```

use crate::collaborators::{TelemetrySink, TelemetrySlot};
use crate::observability::metrics;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// One reading of local resource usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// System-wide CPU usage, 0-100.
    pub total_cpu: f32,
    /// CPU usage of this process, normalised to 0-100.
    pub process_cpu: f32,
    /// Used memory in megabytes.
    pub used_memory_mb: f64,
    /// Used memory as a percentage of total, 0-100.
    pub memory_percent: f64,
    /// Battery charge, 0-100. `None` when the device has no battery.
    pub battery_level: Option<u8>,
}

/// Source of [`ResourceSample`]s.
pub trait ResourceProbe: Send {
    fn sample(&mut self) -> ResourceSample;
}

/// Probe backed by `sysinfo`, with battery read from the Linux power supply class.
///
/// Keeps its `System` between samples so CPU usage is computed as a delta.
/// The first sample may therefore report 0% CPU.
pub struct SysinfoProbe {
    system: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    #[must_use]
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(target: "room.telemetry", error = e, "Cannot resolve current pid");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let total_cpu = self.system.global_cpu_info().cpu_usage().clamp(0.0, 100.0);

        // sysinfo reports per-process usage summed over cores
        #[allow(clippy::cast_precision_loss)]
        let cores = self.system.cpus().len().max(1) as f32;
        let process_cpu = self
            .pid
            .filter(|pid| self.system.refresh_process(*pid))
            .and_then(|pid| self.system.process(pid))
            .map_or(0.0, |process| {
                (process.cpu_usage() / cores).clamp(0.0, 100.0)
            });

        #[allow(clippy::cast_precision_loss)]
        let used_memory = self.system.used_memory() as f64;
        #[allow(clippy::cast_precision_loss)]
        let total_memory = self.system.total_memory() as f64;
        let memory_percent = if total_memory > 0.0 {
            (used_memory / total_memory * 100.0).min(100.0)
        } else {
            0.0
        };

        ResourceSample {
            total_cpu,
            process_cpu,
            used_memory_mb: used_memory / (1024.0 * 1024.0),
            memory_percent,
            battery_level: read_battery_level(Path::new(POWER_SUPPLY_DIR)),
        }
    }
}

/// Capacity of the first power supply whose type is `Battery`.
fn read_battery_level(dir: &Path) -> Option<u8> {
    let entries = fs::read_dir(dir).ok()?;
    entries.flatten().find_map(|entry| {
        let path = entry.path();
        let kind = fs::read_to_string(path.join("type")).ok()?;
        if kind.trim() != "Battery" {
            return None;
        }
        let capacity = fs::read_to_string(path.join("capacity")).ok()?;
        capacity.trim().parse::<u8>().ok().map(|level| level.min(100))
    })
}

#[must_use]
pub fn format_cpu(sample: &ResourceSample) -> String {
    format!(
        "CPU stats. TotalCPU: {:.2}% PidCPU: {:.2}%",
        sample.total_cpu, sample.process_cpu
    )
}

#[must_use]
pub fn format_memory(sample: &ResourceSample) -> String {
    format!(
        "Memory stats. UsedMem: {:.2} UsedMem per: {:.2}%",
        sample.used_memory_mb, sample.memory_percent
    )
}

/// Battery consumed since the baseline. Negative while charging.
#[must_use]
pub fn format_battery(baseline: Option<u8>, current: Option<u8>) -> String {
    match (baseline, current) {
        (Some(first), Some(now)) => format!(
            "Battery stats. Battery consume: {}%",
            i16::from(first) - i16::from(now)
        ),
        _ => "Battery stats. unavailable".to_string(),
    }
}

/// Probe plus the battery level seen at the first sample.
struct ProbeState {
    probe: Box<dyn ResourceProbe>,
    battery_baseline: Option<u8>,
}

impl ProbeState {
    fn sample_and_report(&mut self, sink: &dyn TelemetrySink) {
        let sample = self.probe.sample();
        if self.battery_baseline.is_none() {
            self.battery_baseline = sample.battery_level;
        }

        sink.report(TelemetrySlot::Cpu, format_cpu(&sample));
        sink.report(TelemetrySlot::Memory, format_memory(&sample));
        sink.report(
            TelemetrySlot::Battery,
            format_battery(self.battery_baseline, sample.battery_level),
        );
        metrics::record_telemetry_sample();
    }
}

struct Running {
    cancel_token: CancellationToken,
    task: JoinHandle<ProbeState>,
}

/// Periodic sampler. Owned by the room actor.
pub struct TelemetrySampler {
    interval: Duration,
    sink: Arc<dyn TelemetrySink>,
    idle: Option<ProbeState>,
    running: Option<Running>,
}

impl TelemetrySampler {
    #[must_use]
    pub fn new(
        probe: Box<dyn ResourceProbe>,
        sink: Arc<dyn TelemetrySink>,
        interval: Duration,
    ) -> Self {
        Self {
            interval,
            sink,
            idle: Some(ProbeState {
                probe,
                battery_baseline: None,
            }),
            running: None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start sampling on a child of `parent`. Samples once immediately.
    ///
    /// No-op if already running.
    pub fn start(&mut self, parent: &CancellationToken) {
        if self.running.is_some() {
            return;
        }
        let Some(mut state) = self.idle.take() else {
            warn!(target: "room.telemetry", "Probe unavailable, telemetry not started");
            return;
        };

        let cancel_token = parent.child_token();
        let task_token = cancel_token.clone();
        let sink = Arc::clone(&self.sink);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => state.sample_and_report(sink.as_ref()),
                }
            }
            state
        });

        debug!(
            target: "room.telemetry",
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Telemetry started"
        );
        self.running = Some(Running { cancel_token, task });
    }

    /// Stop sampling and wait for the task to hand the probe back.
    ///
    /// No-op if not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel_token.cancel();
        match running.task.await {
            Ok(state) => {
                self.idle = Some(state);
                debug!(target: "room.telemetry", "Telemetry stopped");
            }
            Err(e) => {
                error!(target: "room.telemetry", error = %e, "Telemetry task failed");
            }
        }
    }
}
