//! Runtime health record.
//!
//! Nothing in the monitor is fatal. Connectivity loss and sink failures
//! degrade the device instead of stopping it; this record makes the
//! degradation visible to diagnostics.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Why the monitor is running degraded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthCode {
    /// All configured surfaces are up.
    Ok = 0,

    /// Wi-Fi association gave up after the retry cap.
    /// Sampling and display continue, network sinks are skipped.
    WifiDegraded = 1,

    /// Broker connect gave up after the retry cap.
    /// Telemetry sink not installed.
    BrokerDegraded = 2,

    /// A sink returned an error during dispatch.
    SinkFailure = 3,
}

impl HealthCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => HealthCode::WifiDegraded,
            2 => HealthCode::BrokerDegraded,
            3 => HealthCode::SinkFailure,
            _ => HealthCode::Ok,
        }
    }

    /// Connectivity loss outranks a single failing sink.
    pub fn severity(self) -> u8 {
        match self {
            HealthCode::Ok => 0,
            HealthCode::SinkFailure => 1,
            HealthCode::BrokerDegraded => 2,
            HealthCode::WifiDegraded => 3,
        }
    }
}

/// Lock-free health state.
///
/// # Usage
///
/// ```ignore
/// static HEALTH: HealthState = HealthState::new();
///
/// if connect_with_retry(...).is_err() {
///     HEALTH.set(HealthCode::BrokerDegraded, attempts);
/// }
/// ```
pub struct HealthState {
    degraded: AtomicBool,
    code: AtomicU8,

    /// Extra data (attempt count, failing sink index).
    data: AtomicU32,

    /// Total degradation events since boot (never cleared).
    count: AtomicU32,
}

impl HealthState {
    pub const fn new() -> Self {
        Self {
            degraded: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Record a degradation. Increments the event counter.
    ///
    /// While degraded, a less severe code does not replace the recorded
    /// one (a flaky panel must not hide a lost link).
    #[inline]
    pub fn set(&self, code: HealthCode, data: u32) {
        self.count.fetch_add(1, Ordering::Relaxed);

        if self.is_degraded() && self.code().severity() > code.severity() {
            return;
        }

        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.degraded.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Last recorded code (only meaningful if `is_degraded()`).
    #[inline]
    pub fn code(&self) -> HealthCode {
        HealthCode::from_u8(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear the degraded flag. The event counter is kept.
    #[inline]
    pub fn clear(&self) {
        self.degraded.store(false, Ordering::Release);
    }

    #[inline]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            degraded: self.is_degraded(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub degraded: bool,
    pub code: HealthCode,
    pub data: u32,
    pub count: u32,
}

/// Device-wide health record.
pub static HEALTH: HealthState = HealthState::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_set_and_clear() {
        let health = HealthState::new();
        assert!(!health.is_degraded());
        assert_eq!(health.code(), HealthCode::Ok);

        health.set(HealthCode::WifiDegraded, 20);
        assert!(health.is_degraded());
        assert_eq!(health.code(), HealthCode::WifiDegraded);
        assert_eq!(health.data(), 20);

        health.clear();
        assert!(!health.is_degraded());
        assert_eq!(health.count(), 1);
    }

    #[test]
    fn test_sink_failure_keeps_link_code() {
        let health = HealthState::new();
        health.set(HealthCode::WifiDegraded, 20);
        health.set(HealthCode::SinkFailure, 0);

        assert_eq!(health.code(), HealthCode::WifiDegraded);
        assert_eq!(health.data(), 20);
        assert_eq!(health.count(), 2);

        // Cleared: the next event is recorded whatever its rank
        health.clear();
        health.set(HealthCode::SinkFailure, 1);
        assert_eq!(health.code(), HealthCode::SinkFailure);
        assert_eq!(health.data(), 1);
    }

    #[test]
    fn test_health_count_accumulates() {
        let health = HealthState::new();
        health.set(HealthCode::SinkFailure, 0);
        health.set(HealthCode::BrokerDegraded, 3);
        assert_eq!(health.count(), 2);
        assert_eq!(
            health.snapshot(),
            HealthSnapshot {
                degraded: true,
                code: HealthCode::BrokerDegraded,
                data: 3,
                count: 2,
            }
        );
    }
}
