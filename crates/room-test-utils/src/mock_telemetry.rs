//! Telemetry sink and probe mocks.

use room_controller::collaborators::{TelemetrySink, TelemetrySlot};
use room_controller::telemetry::{ResourceProbe, ResourceSample};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(TelemetrySlot, String)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(TelemetrySlot, String)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self, slot: TelemetrySlot) -> usize {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == slot)
            .count()
    }

    /// Most recent text reported for a slot.
    pub fn latest(&self, slot: TelemetrySlot) -> Option<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(s, _)| *s == slot)
            .map(|(_, text)| text.clone())
    }

    pub fn total(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl TelemetrySink for RecordingSink {
    fn report(&self, slot: TelemetrySlot, text: String) {
        self.reports.lock().unwrap().push((slot, text));
    }
}

/// Probe that replays a fixed list of samples, repeating the last one.
#[derive(Debug)]
pub struct ScriptedProbe {
    samples: VecDeque<ResourceSample>,
    last: ResourceSample,
}

impl ScriptedProbe {
    #[must_use]
    pub fn new(samples: impl IntoIterator<Item = ResourceSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            last: idle_sample(),
        }
    }

    /// Probe whose battery drains by `step` percent per sample from `start`.
    #[must_use]
    pub fn draining(start: u8, step: u8, samples: usize) -> Self {
        Self::new((0..samples).map(|i| {
            let drained = u8::try_from(i).unwrap_or(u8::MAX).saturating_mul(step);
            ResourceSample {
                battery_level: Some(start.saturating_sub(drained)),
                ..idle_sample()
            }
        }))
    }
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new([])
    }
}

impl ResourceProbe for ScriptedProbe {
    fn sample(&mut self) -> ResourceSample {
        if let Some(next) = self.samples.pop_front() {
            self.last = next;
        }
        self.last
    }
}

/// A quiet machine with no battery.
#[must_use]
pub fn idle_sample() -> ResourceSample {
    ResourceSample {
        total_cpu: 5.0,
        process_cpu: 1.0,
        used_memory_mb: 256.0,
        memory_percent: 12.5,
        battery_level: None,
    }
}
