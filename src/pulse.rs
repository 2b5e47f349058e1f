//! Interrupt-driven pulse tally.
//!
//! # Architecture
//!
//! ```text
//! GPIO ISR                PulseCounter              Main loop
//! ────────                ────────────              ─────────
//!
//! on_pulse_edge() ──────▶ [ AtomicU32 ] ──────────▶ drain_and_reset()
//! fetch_add(1)            lock-free                 swap(0)
//! bounded, ~10ns                                    once per window
//! ```
//!
//! # Rules
//!
//! - The ISR is the only caller of [`PulseCounter::on_pulse_edge`].
//! - The cooperative loop is the only caller of [`PulseCounter::drain_and_reset`].
//! - No locks: the ISR can never wait on the loop.

use core::sync::atomic::{AtomicU32, Ordering};

/// Falling-edge counter shared between the ISR and the sampling loop.
///
/// 32 bits is enough headroom: even a saturated CAJOE tube (a few
/// thousand counts per second) needs days to wrap within one window.
pub struct PulseCounter {
    count: AtomicU32,
}

impl PulseCounter {
    /// Create a counter at zero.
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// Record one falling edge.
    ///
    /// # Timing
    ///
    /// Single atomic RMW. Never blocks, never allocates, never logs.
    /// Safe to call from interrupt context.
    #[inline]
    pub fn on_pulse_edge(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the accumulated count and reset it to zero in one step.
    ///
    /// Edges recorded before the swap belong to the returned window,
    /// edges recorded after it belong to the next one.
    #[inline]
    pub fn drain_and_reset(&self) -> u32 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Current count without draining.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter fed by the GPIO interrupt on the device (and by the simulated
/// source on host).
pub static PULSE_COUNTER: PulseCounter = PulseCounter::new();
