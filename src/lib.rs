//! # GeigerCounter
//!
//! CPM monitor for the RadiationD-v1.1 (CAJOE) Geiger board.
//!
//! ## Architecture
//!
//! ```text
//! GPIO ISR ──▶ PulseCounter ──▶ RateEstimator ──▶ ReportDispatcher ──▶ Sinks
//!  (atomic)     drain/window      CPM sample        in order            display
//!                                                                       telemetry
//!                           WebResponder ◀── latest sample (on demand)
//! ```
//!
//! - The ISR only increments an atomic. Everything else runs on one
//!   cooperative loop ([`Monitor`]).
//! - Deployments (display, cloud, web) are configurations of the same loop.

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod estimator;
pub mod health;
pub mod log_drain;
pub mod logging;
pub mod monitor;
pub mod pulse;
pub mod retry;
pub mod sink;
pub mod telemetry;
pub mod web;

#[cfg(target_os = "espidf")]
pub mod hal;

#[cfg(not(target_os = "espidf"))]
pub mod sim;

pub use clock::{elapsed_ms, ManualClock, SystemClock, TickClock};
pub use config::{Deployment, MonitorConfig};
pub use dispatch::{DispatchReport, ReportDispatcher};
pub use display::{DisplayDriver, DisplaySink};
#[cfg(not(target_os = "espidf"))]
pub use display::FrameLog;
pub use error::{ConfigError, SinkError, TransportError};
pub use estimator::{estimate_cpm, RateEstimator, RateSample, SamplingWindow};
pub use health::{HealthCode, HealthState, HEALTH};
pub use monitor::{Monitor, StepOutcome};
pub use pulse::{PulseCounter, PULSE_COUNTER};
pub use retry::RetryPolicy;
pub use sink::Sink;
pub use telemetry::{MqttTransport, TelemetryPublisher};
pub use web::{SchedulingPolicy, WebResponder};

/// Version string (set by build.rs, includes git hash)
pub const VERSION: &str = env!("VERSION_STRING");
