//! Millisecond tick source with wrap-safe arithmetic.
//!
//! Ticks are `u32` milliseconds and roll over every ~49.7 days. All
//! differences go through [`elapsed_ms`], never plain subtraction.

use core::cell::Cell;
use std::time::{Duration, Instant};

/// Elapsed milliseconds from `last` to `now`, modulo 2^32.
///
/// Correct across rollover: `elapsed_ms(5, u32::MAX - 2) == 8`.
#[inline]
pub fn elapsed_ms(now: u32, last: u32) -> u32 {
    now.wrapping_sub(last)
}

/// Monotonic tick source used by the sampling loop.
pub trait TickClock {
    /// Current tick in milliseconds (wrapping).
    fn now_ms(&self) -> u32;

    /// Block the calling thread for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

/// `std::time::Instant` based clock.
///
/// Works on host and on ESP-IDF (std is backed by `esp_timer`).
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap
        self.origin.elapsed().as_millis() as u32
    }

    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// Hand-driven clock for tests and simulations.
///
/// `delay_ms` advances the clock instead of sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn starting_at(ms: u32) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl TickClock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}
