//! Windowed CPM estimation.
//!
//! # State machine
//!
//! ```text
//!              elapsed > period
//! Accumulating ────────────────▶ Reporting
//!      ▲                             │
//!      └──────── sample taken ───────┘
//! ```
//!
//! The estimator drains [`PulseCounter`] once per window and scales the
//! count up to the normalization period (per minute by default).
//!
//! # Fidelity caveat
//!
//! If the loop stalls for longer than one window (e.g. a blocking web
//! client), the next sample still extrapolates over the nominal period,
//! not the real elapsed time. The resulting CPM over-reads after a stall.

use crate::clock::elapsed_ms;
use crate::error::ConfigError;
use crate::pulse::PulseCounter;

/// One minute, in milliseconds.
pub const MINUTE_MS: u32 = 60_000;

/// Fixed sampling window and the period rates are normalized to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingWindow {
    period_ms: u32,
    normalization_ms: u32,
    factor: f64,
}

impl SamplingWindow {
    /// Validate and freeze a window.
    pub fn new(period_ms: u32, normalization_ms: u32) -> Result<Self, ConfigError> {
        if period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if normalization_ms == 0 {
            return Err(ConfigError::ZeroNormalization);
        }
        Ok(Self {
            period_ms,
            normalization_ms,
            factor: normalization_ms as f64 / period_ms as f64,
        })
    }

    /// Window of `period_ms` reporting counts per minute.
    pub fn per_minute(period_ms: u32) -> Result<Self, ConfigError> {
        Self::new(period_ms, MINUTE_MS)
    }

    #[inline]
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    #[inline]
    pub fn normalization_ms(&self) -> u32 {
        self.normalization_ms
    }

    /// `normalization_ms / period_ms`.
    #[inline]
    pub fn extrapolation_factor(&self) -> f64 {
        self.factor
    }
}

/// Latest computed rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Extrapolated counts per normalization period.
    pub cpm: f64,
    /// Raw pulses drained for this window.
    pub count: u32,
    /// Tick (ms) at which the window closed.
    pub timestamp_ms: u32,
}

impl RateSample {
    /// CPM truncated to an integer, as shown on the web page.
    #[inline]
    pub fn whole_cpm(&self) -> i64 {
        self.cpm as i64
    }
}

/// Scale a window count up to the normalization period.
#[inline]
pub fn estimate_cpm(count: u32, window: &SamplingWindow) -> f64 {
    count as f64 * window.extrapolation_factor()
}

/// Estimator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    /// Waiting for the window to elapse.
    Accumulating,
    /// A sample was just taken and awaits dispatch.
    Reporting,
}

/// Drives window boundaries and keeps the latest [`RateSample`].
pub struct RateEstimator {
    window: SamplingWindow,
    last_sample_ms: u32,
    latest: Option<RateSample>,
    state: EstimatorState,
}

impl RateEstimator {
    /// Start the first window at `start_ms`.
    pub fn new(window: SamplingWindow, start_ms: u32) -> Self {
        Self {
            window,
            last_sample_ms: start_ms,
            latest: None,
            state: EstimatorState::Accumulating,
        }
    }

    /// Poll the window.
    ///
    /// Returns a fresh sample when more than `period_ms` elapsed since the
    /// last boundary (strictly greater: exactly one period does not fire).
    pub fn poll(&mut self, now_ms: u32, counter: &PulseCounter) -> Option<RateSample> {
        // Reporting is transient: a new poll means the previous sample was handled
        self.state = EstimatorState::Accumulating;

        if elapsed_ms(now_ms, self.last_sample_ms) <= self.window.period_ms() {
            return None;
        }

        self.last_sample_ms = now_ms;
        let count = counter.drain_and_reset();
        let sample = RateSample {
            cpm: estimate_cpm(count, &self.window),
            count,
            timestamp_ms: now_ms,
        };

        self.latest = Some(sample);
        self.state = EstimatorState::Reporting;
        Some(sample)
    }

    /// Most recent sample, if any window has closed yet.
    #[inline]
    pub fn latest(&self) -> Option<RateSample> {
        self.latest
    }

    #[inline]
    pub fn state(&self) -> EstimatorState {
        self.state
    }

    #[inline]
    pub fn window(&self) -> &SamplingWindow {
        &self.window
    }

    #[inline]
    pub fn last_sample_ms(&self) -> u32 {
        self.last_sample_ms
    }
}
