//! Fan-out of samples to the configured sinks.
//!
//! # Rules
//!
//! - Sinks run synchronously, in configuration order, on the loop thread.
//! - A failing sink never stops the others from receiving the sample.
//! - Failures are counted per sink and recorded in the health state.

use crate::estimator::RateSample;
use crate::health::{HealthCode, HealthState};
use crate::sink::Sink;

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Slot {
    sink: Box<dyn Sink>,
    failures: u32,
}

/// Ordered list of sinks.
pub struct ReportDispatcher<'a> {
    slots: Vec<Slot>,
    health: &'a HealthState,
}

impl<'a> ReportDispatcher<'a> {
    pub fn new(health: &'a HealthState) -> Self {
        Self {
            slots: Vec::new(),
            health,
        }
    }

    /// Append a sink. Dispatch order is insertion order.
    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        log::debug!("sink #{} registered: {}", self.slots.len(), sink.name());
        self.slots.push(Slot { sink, failures: 0 });
    }

    /// Builder form of [`add_sink`](Self::add_sink).
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Deliver `sample` to every sink.
    pub fn publish(&mut self, sample: &RateSample) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            match slot.sink.receive(sample) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    slot.failures = slot.failures.saturating_add(1);
                    report.failed += 1;
                    self.health.set(HealthCode::SinkFailure, idx as u32);
                    log::warn!("sink `{}` failed: {}", slot.sink.name(), e);
                }
            }
        }

        report
    }

    /// Failures seen by the sink at `idx` since boot.
    pub fn failures(&self, idx: usize) -> Option<u32> {
        self.slots.get(idx).map(|s| s.failures)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sink names in dispatch order.
    pub fn sink_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.sink.name()).collect()
    }
}
