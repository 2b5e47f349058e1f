//! GeigerCounter - Main entry point
//!
//! 1. Install the ring logger
//! 2. Load and validate the build-time configuration
//! 3. Arm the pulse input (GPIO interrupt, or the simulator on host)
//! 4. Bring up the configured surfaces, degrading on connectivity loss
//! 5. Run the sampling loop forever

use geiger_counter::config::MonitorConfig;
use geiger_counter::log_drain::LogDrain;
use geiger_counter::logging::{self, uptime_us, LOG_STREAM};
use geiger_counter::{Monitor, StepOutcome, TickClock, VERSION};
use log::LevelFilter;

/// Build-time config, falling back to display-only when it does not validate.
fn load_config(prepare: impl FnOnce(&mut MonitorConfig)) -> Option<MonitorConfig> {
    let loaded = MonitorConfig::from_build_env().and_then(|mut config| {
        prepare(&mut config);
        config.validate()?;
        Ok(config)
    });

    match loaded {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("configuration rejected ({}), running display-only", e);
            MonitorConfig::display_only()
                .map_err(|e| log::error!("no usable configuration: {}", e))
                .ok()
        }
    }
}

/// Drain logs after every loop iteration.
fn run_forever<C: TickClock>(monitor: &mut Monitor<'_, C>) -> ! {
    let mut drain = LogDrain::new(&LOG_STREAM);
    let mut out = std::io::stdout();
    let _ = drain.pump(&mut out, uptime_us());

    monitor.run(|_outcome: &StepOutcome| {
        let _ = drain.pump(&mut out, uptime_us());
    })
}

#[cfg(target_os = "espidf")]
fn main() {
    esp_idf_svc::sys::link_patches();

    if let Err(e) = logging::init(LevelFilter::Info) {
        println!("logger already installed: {}", e);
    }
    log::info!("{}", VERSION);

    let Some(config) = load_config(|_| {}) else {
        let _ = geiger_counter::log_drain::drain_to(&LOG_STREAM, &mut std::io::stdout());
        return;
    };
    if let Err(e) = device::run(config) {
        log::error!("startup failed: {}", e);
        let _ = geiger_counter::log_drain::drain_to(&LOG_STREAM, &mut std::io::stdout());
    }
}

#[cfg(target_os = "espidf")]
mod device {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::EspError;

    use geiger_counter::config::MonitorConfig;
    use geiger_counter::display::DisplaySink;
    use geiger_counter::hal::{self, display::OledPanel, mqtt::EspMqttTransport, pulse_input, wifi};
    use geiger_counter::telemetry::{client_id, connect_with_retry, TelemetryPublisher};
    use geiger_counter::{
        HealthCode, Monitor, ReportDispatcher, SystemClock, WebResponder, HEALTH, PULSE_COUNTER,
    };

    pub fn run(config: MonitorConfig) -> Result<(), EspError> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take().ok();
        let clock = SystemClock::new();

        let mut display = None;
        if config.display {
            match OledPanel::open(peripherals.i2c0, &config.panel) {
                Ok(panel) => {
                    let mut sink = DisplaySink::new(panel);
                    if let Err(e) = sink.welcome() {
                        log::warn!("welcome screen not shown: {}", e);
                    }
                    display = Some(sink);
                }
                // Headless board: keep sampling for the other surfaces
                Err(e) => log::warn!("display disabled: {}", e),
            }
        }

        // A dead pulse line reads as 0 CPM, it does not stop the device
        if let Err(e) = pulse_input::attach_pulse_interrupt(config.pulse_gpio) {
            log::error!("pulse interrupt not armed: {}", e);
        }

        let mut station = None;
        let mut online = false;
        if let Some(wifi_config) = &config.wifi {
            match wifi::connect_station(peripherals.modem, sysloop, nvs, wifi_config, &config.wifi_retry) {
                Ok(s) => {
                    online = s.connected;
                    station = Some(s);
                }
                Err(e) => log::warn!("Wi-Fi driver unavailable: {}", e),
            }
            if !online {
                HEALTH.set(HealthCode::WifiDegraded, config.wifi_retry.max_attempts);
            }
        }

        let mut dispatcher = ReportDispatcher::new(&HEALTH);
        if let Some(display) = display {
            dispatcher.add_sink(Box::new(display));
        }

        if let Some(cloud) = &config.cloud {
            if online {
                let mut transport = EspMqttTransport::new();
                let id = client_id(hal::random_u32());
                match connect_with_retry(&mut transport, &id, &cloud.broker, &config.broker_retry, &clock) {
                    Ok(()) => dispatcher.add_sink(Box::new(TelemetryPublisher::new(
                        transport,
                        cloud.telemetry.clone(),
                        hal::free_heap,
                    ))),
                    Err(e) => {
                        log::warn!("telemetry disabled: {}", e);
                        HEALTH.set(HealthCode::BrokerDegraded, e.attempts);
                    }
                }
            } else {
                HEALTH.set(HealthCode::BrokerDegraded, 0);
            }
        }

        let mut monitor = Monitor::new(clock, &PULSE_COUNTER, config.window, dispatcher)
            .with_loop_delay(config.loop_delay_ms);

        if let (Some(web), true) = (config.web, online) {
            match WebResponder::bind(("0.0.0.0", web.port), web.policy) {
                Ok(responder) => monitor = monitor.with_web(responder),
                Err(e) => log::warn!("web responder disabled: {}", e),
            }
        }

        // Dropping the station would tear the link down
        let _station = station;
        super::run_forever(&mut monitor)
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    if let Err(e) = logging::init(LevelFilter::Info) {
        eprintln!("logger already installed: {}", e);
    }
    log::info!("{} (host simulation)", VERSION);

    // No radio on host; the dry-run transport needs placeholder credentials
    match load_config(host::prepare) {
        Some(config) => host::run(config),
        None => {
            let _ = geiger_counter::log_drain::drain_to(&LOG_STREAM, &mut std::io::stderr());
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use geiger_counter::config::MonitorConfig;
    use geiger_counter::display::{DisplaySink, FrameLog};
    use geiger_counter::sim::PulseSource;
    use geiger_counter::telemetry::{client_id, connect_with_retry, DryRunTransport, TelemetryPublisher};
    use geiger_counter::{
        HealthCode, Monitor, ReportDispatcher, SystemClock, WebResponder, HEALTH, PULSE_COUNTER,
    };

    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_SIM_CPM: f64 = 30.0;

    fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn prepare(config: &mut MonitorConfig) {
        config.wifi = None;
        if let Some(web) = config.web.as_mut() {
            web.port = env_or("GEIGER_HTTP_PORT", DEFAULT_HTTP_PORT);
        }
        if let Some(cloud) = config.cloud.as_mut() {
            if cloud.telemetry.channel_id.is_empty() {
                cloud.telemetry.channel_id = "0".to_string();
            }
            if cloud.telemetry.write_api_key.is_empty() {
                cloud.telemetry.write_api_key = "DRYRUN".to_string();
            }
            if cloud.broker.user.is_empty() {
                cloud.broker.user = "dryrun".to_string();
            }
            if cloud.broker.password.is_empty() {
                cloud.broker.password = "DRYRUN".to_string();
            }
        }
    }

    pub fn run(config: MonitorConfig) -> ! {
        let clock = SystemClock::new();
        let _source = PulseSource::spawn(&PULSE_COUNTER, env_or("GEIGER_SIM_CPM", DEFAULT_SIM_CPM));

        let mut dispatcher = ReportDispatcher::new(&HEALTH);
        if config.display {
            let mut display = DisplaySink::new(FrameLog::new());
            let _ = display.welcome();
            dispatcher.add_sink(Box::new(display));
        }

        if let Some(cloud) = &config.cloud {
            let mut transport = DryRunTransport::new();
            let id = client_id(rand::random());
            match connect_with_retry(&mut transport, &id, &cloud.broker, &config.broker_retry, &clock) {
                Ok(()) => dispatcher.add_sink(Box::new(TelemetryPublisher::new(
                    transport,
                    cloud.telemetry.clone(),
                    || 0,
                ))),
                Err(e) => HEALTH.set(HealthCode::BrokerDegraded, e.attempts),
            }
        }

        let mut monitor = Monitor::new(clock, &PULSE_COUNTER, config.window, dispatcher)
            .with_loop_delay(config.loop_delay_ms);

        if let Some(web) = config.web {
            match WebResponder::bind(("127.0.0.1", web.port), web.policy) {
                Ok(responder) => monitor = monitor.with_web(responder),
                Err(e) => log::warn!("web responder disabled: {}", e),
            }
        }

        super::run_forever(&mut monitor)
    }
}
