//! The cooperative sampling loop.
//!
//! # Step order
//!
//! ```text
//! no web:            poll window ─▶ dispatch ─▶ sleep
//! WebBlocksSampling: accept (blocks) ─▶ poll window ─▶ dispatch ─▶ serve
//! NonBlockingAccept: poll window ─▶ dispatch ─▶ try accept ─▶ serve ─▶ sleep
//! ```
//!
//! Everything here runs on one thread. The only state shared with the
//! interrupt is the [`PulseCounter`].

use crate::clock::TickClock;
use crate::dispatch::{DispatchReport, ReportDispatcher};
use crate::estimator::{RateEstimator, RateSample, SamplingWindow};
use crate::pulse::PulseCounter;
use crate::web::{RequestEnd, SchedulingPolicy, WebResponder};

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    /// Sample taken this iteration, if the window closed.
    pub sample: Option<RateSample>,
    pub dispatch: Option<DispatchReport>,
    /// Web request answered this iteration.
    pub served: Option<RequestEnd>,
}

/// Estimator, sinks and optional web responder driven by one clock.
pub struct Monitor<'a, C: TickClock> {
    clock: C,
    counter: &'a PulseCounter,
    estimator: RateEstimator,
    dispatcher: ReportDispatcher<'a>,
    web: Option<WebResponder>,
    loop_delay_ms: u32,
}

impl<'a, C: TickClock> Monitor<'a, C> {
    /// First window starts now.
    pub fn new(
        clock: C,
        counter: &'a PulseCounter,
        window: SamplingWindow,
        dispatcher: ReportDispatcher<'a>,
    ) -> Self {
        let start = clock.now_ms();
        Self {
            clock,
            counter,
            estimator: RateEstimator::new(window, start),
            dispatcher,
            web: None,
            loop_delay_ms: 0,
        }
    }

    pub fn with_web(mut self, web: WebResponder) -> Self {
        self.web = Some(web);
        self
    }

    /// Sleep between iterations (not applied while accept blocks).
    pub fn with_loop_delay(mut self, ms: u32) -> Self {
        self.loop_delay_ms = ms;
        self
    }

    /// Run one iteration.
    pub fn step(&mut self) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        match self.web.as_ref().map(|w| w.policy()) {
            None => {
                self.sample_and_dispatch(&mut outcome);
                self.idle();
            }
            Some(SchedulingPolicy::WebBlocksSampling) => {
                // No window can close while we wait here
                let conn = self.accept();
                self.sample_and_dispatch(&mut outcome);
                if let Some(stream) = conn {
                    outcome.served = self.respond(stream);
                }
            }
            Some(SchedulingPolicy::NonBlockingAccept) => {
                self.sample_and_dispatch(&mut outcome);
                if let Some(stream) = self.accept() {
                    outcome.served = self.respond(stream);
                }
                self.idle();
            }
        }

        outcome
    }

    /// Loop forever. `after_step` runs at the end of every iteration.
    pub fn run<F: FnMut(&StepOutcome)>(&mut self, mut after_step: F) -> ! {
        loop {
            let outcome = self.step();
            after_step(&outcome);
        }
    }

    fn sample_and_dispatch(&mut self, outcome: &mut StepOutcome) {
        let now = self.clock.now_ms();
        if let Some(sample) = self.estimator.poll(now, self.counter) {
            log::info!("CPM: {:?}", sample.cpm);
            outcome.dispatch = Some(self.dispatcher.publish(&sample));
            outcome.sample = Some(sample);
        }
    }

    fn accept(&self) -> Option<std::net::TcpStream> {
        let web = self.web.as_ref()?;
        match web.accept() {
            Ok(conn) => conn.map(|(stream, _)| stream),
            Err(e) => {
                log::warn!("accept failed: {}", e);
                None
            }
        }
    }

    fn respond(&mut self, stream: std::net::TcpStream) -> Option<RequestEnd> {
        let latest = self.estimator.latest();
        let web = self.web.as_mut()?;
        match web.respond(stream, latest) {
            Ok(end) => Some(end),
            Err(e) => {
                log::warn!("response not delivered: {}", e);
                None
            }
        }
    }

    fn idle(&self) {
        if self.loop_delay_ms > 0 {
            self.clock.delay_ms(self.loop_delay_ms);
        }
    }

    pub fn estimator(&self) -> &RateEstimator {
        &self.estimator
    }

    pub fn dispatcher(&self) -> &ReportDispatcher<'a> {
        &self.dispatcher
    }

    pub fn web(&self) -> Option<&WebResponder> {
        self.web.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
