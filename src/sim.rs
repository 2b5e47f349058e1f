//! Simulated pulse source for host runs.
//!
//! Stands in for the GPIO interrupt: a background thread calls
//! [`PulseCounter::on_pulse_edge`] with exponentially distributed gaps,
//! i.e. Poisson arrivals at the requested mean rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;

use crate::pulse::PulseCounter;

/// Longest single sleep, so a stop request is seen promptly.
const SLICE: Duration = Duration::from_millis(50);

/// Exponential gap (ms) for a Poisson process of `cpm` events per minute.
///
/// `u` is a uniform sample in `(0, 1]`. A rate that is not a positive
/// finite number is a silent tube: no gap, no pulses.
pub fn poisson_gap_ms(cpm: f64, u: f64) -> Option<f64> {
    if !(cpm.is_finite() && cpm > 0.0) {
        return None;
    }
    let mean_ms = 60_000.0 / cpm;
    Some((-u.ln() * mean_ms).max(0.0))
}

/// Sleep for `gap` in slices. `false` if `stop` was raised meanwhile.
fn wait(gap: Duration, stop: &AtomicBool) -> bool {
    let mut left = gap;
    while !left.is_zero() {
        if stop.load(Ordering::Acquire) {
            return false;
        }
        let slice = left.min(SLICE);
        thread::sleep(slice);
        left -= slice;
    }
    !stop.load(Ordering::Acquire)
}

/// Handle to a running pulse source.
pub struct PulseSource {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl PulseSource {
    /// Start emitting edges into `counter` at a mean of `cpm`.
    pub fn spawn(counter: &'static PulseCounter, cpm: f64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        if poisson_gap_ms(cpm, 1.0).is_none() {
            log::info!("simulated tube is silent (cpm = {})", cpm);
        }

        let handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut emitted = 0u64;
            while !flag.load(Ordering::Acquire) {
                // gen() is in [0, 1); flip to (0, 1] so ln() stays finite
                let u = 1.0 - rng.gen::<f64>();
                let gap = poisson_gap_ms(cpm, u)
                    .and_then(|ms| Duration::try_from_secs_f64(ms / 1_000.0).ok());

                match gap {
                    Some(gap) => {
                        if wait(gap, &flag) {
                            counter.on_pulse_edge();
                            emitted += 1;
                        }
                    }
                    None => thread::sleep(SLICE),
                }
            }
            emitted
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the thread and return how many edges it emitted.
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for PulseSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisson_gap_mean() {
        // u = 1/e gives exactly one mean gap
        let gap = poisson_gap_ms(60.0, (-1.0f64).exp()).unwrap();
        assert!((gap - 1_000.0).abs() < 1e-9);
        assert_eq!(poisson_gap_ms(60.0, 1.0), Some(0.0));
    }

    #[test]
    fn test_poisson_gap_silent_rates() {
        assert_eq!(poisson_gap_ms(0.0, 0.5), None);
        assert_eq!(poisson_gap_ms(-30.0, 0.5), None);
        assert_eq!(poisson_gap_ms(f64::NAN, 0.5), None);
        assert_eq!(poisson_gap_ms(f64::INFINITY, 0.5), None);
    }

    #[test]
    fn test_silent_source_emits_nothing() {
        static ZERO: PulseCounter = PulseCounter::new();
        static NEGATIVE: PulseCounter = PulseCounter::new();

        let zero = PulseSource::spawn(&ZERO, 0.0);
        let negative = PulseSource::spawn(&NEGATIVE, -10.0);
        thread::sleep(Duration::from_millis(120));

        assert_eq!(zero.stop(), 0);
        assert_eq!(negative.stop(), 0);
        assert_eq!(ZERO.drain_and_reset(), 0);
        assert_eq!(NEGATIVE.drain_and_reset(), 0);
    }

    #[test]
    fn test_slow_source_stops_promptly() {
        static SLOW: PulseCounter = PulseCounter::new();

        // Mean gap of 100 years; stop must not wait for it
        let source = PulseSource::spawn(&SLOW, 1e-8);
        thread::sleep(Duration::from_millis(20));
        let started = std::time::Instant::now();
        assert_eq!(source.stop(), 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_source_feeds_counter() {
        static COUNTER: PulseCounter = PulseCounter::new();

        let source = PulseSource::spawn(&COUNTER, 60_000.0); // ~1 per ms
        thread::sleep(Duration::from_millis(50));
        let emitted = source.stop();

        assert!(emitted > 0);
        assert_eq!(COUNTER.drain_and_reset() as u64, emitted);
    }
}
