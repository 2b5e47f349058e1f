//! Report sinks.
//!
//! A sink is anything that consumes a [`RateSample`]: the OLED, the MQTT
//! telemetry publisher, a test probe. Which sinks run is decided once, at
//! configuration time.

use crate::error::SinkError;
use crate::estimator::RateSample;

/// Consumer of computed samples.
///
/// Called on the loop thread, once per closed window. Implementations must
/// not assume they are the only sink nor that earlier sinks succeeded.
pub trait Sink {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one sample.
    fn receive(&mut self, sample: &RateSample) -> Result<(), SinkError>;
}
