//! ThingSpeak-style MQTT telemetry sink.
//!
//! Publishes on its own cadence, independent of the sampling window:
//! every received sample is checked against `publish_interval_ms` and
//! only due samples go out. Delivery is fire-and-forget.
//!
//! Wire format:
//!
//! ```text
//! topic:   channels/<channel_id>/publish/<write_api_key>
//! payload: field1=<cpm, 2 decimals>[&field2=<free heap bytes>]\n
//! ```

use core::fmt::Write as _;

use crate::clock::{elapsed_ms, TickClock};
use crate::error::{RetryError, SinkError, TransportError};
use crate::estimator::RateSample;
use crate::retry::RetryPolicy;
use crate::sink::Sink;

/// Broker endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl BrokerConfig {
    /// `mqtt://server:port`
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.server, self.port)
    }
}

/// Channel addressing and publish cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub channel_id: String,
    pub write_api_key: String,
    pub publish_interval_ms: u32,
    /// Append the free-heap reading as `field2`.
    pub report_free_heap: bool,
}

/// Opaque MQTT transport.
pub trait MqttTransport {
    fn connect(&mut self, client_id: &str, broker: &BrokerConfig) -> Result<(), TransportError>;
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
    fn disconnect(&mut self);
}

/// `client_<n>` with `n` folded to 24 bits.
pub fn client_id(seed: u32) -> String {
    format!("client_{}", seed & 0x00FF_FFFF)
}

/// Publish topic for a channel.
pub fn topic(config: &TelemetryConfig) -> String {
    format!("channels/{}/publish/{}", config.channel_id, config.write_api_key)
}

/// Payload for one sample.
pub fn format_payload(cpm: f64, free_heap: Option<u32>) -> String {
    let mut payload = format!("field1={:.2}", cpm);
    if let Some(free) = free_heap {
        let _ = write!(payload, "&field2={}", free);
    }
    payload.push('\n');
    payload
}

/// Connect with the bounded retry policy.
///
/// On exhaustion the caller continues without telemetry.
pub fn connect_with_retry<T: MqttTransport, C: TickClock>(
    transport: &mut T,
    client_id: &str,
    broker: &BrokerConfig,
    retry: &RetryPolicy,
    clock: &C,
) -> Result<(), RetryError<TransportError>> {
    retry.run(
        |attempt| {
            log::info!("connecting to {} as {} (attempt {})", broker.url(), client_id, attempt);
            transport.connect(client_id, broker)
        },
        |ms| clock.delay_ms(ms),
    )
}

/// Telemetry sink.
pub struct TelemetryPublisher<T: MqttTransport> {
    transport: T,
    config: TelemetryConfig,
    topic: String,
    free_heap: fn() -> u32,
    last_publish_ms: Option<u32>,
    published: u32,
}

impl<T: MqttTransport> TelemetryPublisher<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T, config: TelemetryConfig, free_heap: fn() -> u32) -> Self {
        Self {
            topic: topic(&config),
            transport,
            config,
            free_heap,
            last_publish_ms: None,
            published: 0,
        }
    }

    /// True when `now_ms` is at least one interval past the last publish.
    pub fn is_due(&self, now_ms: u32) -> bool {
        match self.last_publish_ms {
            None => true,
            Some(last) => elapsed_ms(now_ms, last) >= self.config.publish_interval_ms,
        }
    }

    /// Publish `sample` now, regardless of cadence.
    pub fn publish_now(&mut self, sample: &RateSample) -> Result<(), SinkError> {
        let free = (self.free_heap)();
        let heap_field = self.config.report_free_heap.then_some(free);
        let payload = format_payload(sample.cpm, heap_field);

        // The slot is consumed even if the publish fails: no retry
        self.last_publish_ms = Some(sample.timestamp_ms);
        self.transport.publish(&self.topic, payload.as_bytes())?;
        self.published += 1;
        log::debug!("published {} (free heap {} B)", payload.trim_end(), free);
        Ok(())
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Disconnect and hand the transport back.
    pub fn shutdown(mut self) -> T {
        self.transport.disconnect();
        self.transport
    }
}

impl<T: MqttTransport> Sink for TelemetryPublisher<T> {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn receive(&mut self, sample: &RateSample) -> Result<(), SinkError> {
        if !self.is_due(sample.timestamp_ms) {
            return Ok(());
        }
        self.publish_now(sample)
    }
}

/// Transport that logs instead of sending. Used on host builds.
#[derive(Debug, Default)]
pub struct DryRunTransport {
    connected: bool,
    last: Option<(String, String)>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last (topic, payload) published.
    pub fn last(&self) -> Option<&(String, String)> {
        self.last.as_ref()
    }
}

impl MqttTransport for DryRunTransport {
    fn connect(&mut self, client_id: &str, broker: &BrokerConfig) -> Result<(), TransportError> {
        log::info!("[dry-run] {} connected to {}", client_id, broker.url());
        self.connected = true;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let payload = String::from_utf8_lossy(payload).into_owned();
        log::info!("[dry-run] {} <- {}", topic, payload.trim_end());
        self.last = Some((topic.to_string(), payload));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_ms: u32) -> TelemetryConfig {
        TelemetryConfig {
            channel_id: "442333".into(),
            write_api_key: "WRITEKEY".into(),
            publish_interval_ms: interval_ms,
            report_free_heap: false,
        }
    }

    fn sample(cpm: f64, at: u32) -> RateSample {
        RateSample { cpm, count: 0, timestamp_ms: at }
    }

    #[test]
    fn test_topic_and_payload() {
        assert_eq!(topic(&config(30_000)), "channels/442333/publish/WRITEKEY");
        assert_eq!(format_payload(0.0, None), "field1=0.00\n");
        assert_eq!(format_payload(72.0, None), "field1=72.00\n");
        assert_eq!(format_payload(8.571, Some(10_240)), "field1=8.57&field2=10240\n");
    }

    #[test]
    fn test_client_id_is_24_bit() {
        assert_eq!(client_id(42), "client_42");
        assert_eq!(client_id(0xFF00_0001), "client_1");
    }

    #[test]
    fn test_cadence_independent_of_window() {
        let mut transport = DryRunTransport::new();
        transport.connected = true;
        let mut publisher = TelemetryPublisher::new(transport, config(30_000), || 0);

        // 10 s windows, 30 s publish cadence
        publisher.receive(&sample(6.0, 10_000)).unwrap();
        publisher.receive(&sample(12.0, 20_000)).unwrap();
        publisher.receive(&sample(18.0, 30_000)).unwrap();
        assert_eq!(publisher.published(), 1);

        publisher.receive(&sample(24.0, 40_000)).unwrap();
        assert_eq!(publisher.published(), 2);
        let (_, payload) = publisher.transport().last().unwrap();
        assert_eq!(payload, "field1=24.00\n");
    }

    #[test]
    fn test_publish_failure_is_reported_not_retried() {
        let transport = DryRunTransport::new(); // never connected
        let mut publisher = TelemetryPublisher::new(transport, config(30_000), || 0);

        assert!(publisher.receive(&sample(6.0, 10_000)).is_err());
        // Slot consumed: the next sample inside the interval is skipped
        assert!(publisher.receive(&sample(6.0, 20_000)).is_ok());
        assert_eq!(publisher.published(), 0);
    }

    #[test]
    fn test_free_heap_field() {
        let mut transport = DryRunTransport::new();
        transport.connected = true;
        let mut cfg = config(1);
        cfg.report_free_heap = true;
        let mut publisher = TelemetryPublisher::new(transport, cfg, || 4096);

        publisher.receive(&sample(2.0, 5)).unwrap();
        let (_, payload) = publisher.transport().last().unwrap();
        assert_eq!(payload, "field1=2.00&field2=4096\n");
    }
}
