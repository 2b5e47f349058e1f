//! Telemetry set-up tests: bounded broker retry and degraded start

use geiger_counter::error::TransportError;
use geiger_counter::telemetry::{
    client_id, connect_with_retry, format_payload, BrokerConfig, DryRunTransport, MqttTransport,
    TelemetryConfig, TelemetryPublisher,
};
use geiger_counter::{ManualClock, RateSample, RetryPolicy, Sink, TickClock};

/// Broker that refuses the first `failures` connects.
struct FlakyBroker {
    failures: u32,
    attempts: u32,
    connected: bool,
}

impl MqttTransport for FlakyBroker {
    fn connect(&mut self, _client_id: &str, _broker: &BrokerConfig) -> Result<(), TransportError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(TransportError::Connect("connection refused".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn publish(&mut self, _topic: &str, _payload: &[u8]) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

fn broker() -> BrokerConfig {
    BrokerConfig {
        server: "mqtt.thingspeak.com".into(),
        port: 1883,
        user: "user".into(),
        password: "apikey".into(),
    }
}

#[test]
fn test_broker_url() {
    assert_eq!(broker().url(), "mqtt://mqtt.thingspeak.com:1883");
}

#[test]
fn test_connect_recovers_within_cap() {
    let clock = ManualClock::starting_at(0);
    let mut transport = FlakyBroker { failures: 2, attempts: 0, connected: false };
    let retry = RetryPolicy::new(3, 1_000).unwrap();

    connect_with_retry(&mut transport, &client_id(7), &broker(), &retry, &clock).unwrap();

    assert!(transport.connected);
    assert_eq!(transport.attempts, 3);
    // Two backoffs between three attempts
    assert_eq!(clock.now_ms(), 2_000);
}

#[test]
fn test_connect_gives_up_at_cap() {
    let clock = ManualClock::starting_at(0);
    let mut transport = FlakyBroker { failures: u32::MAX, attempts: 0, connected: false };
    let retry = RetryPolicy::new(3, 1_000).unwrap();

    let err = connect_with_retry(&mut transport, "client_1", &broker(), &retry, &clock).unwrap_err();

    assert_eq!(err.attempts, 3);
    assert_eq!(transport.attempts, 3);
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn test_zero_cpm_payload_has_two_decimals() {
    assert_eq!(format_payload(0.0, None), "field1=0.00\n");

    let mut transport = DryRunTransport::new();
    connect_with_retry(&mut transport, "client_1", &broker(), &RetryPolicy::default(), &ManualClock::default())
        .unwrap();

    let mut publisher = TelemetryPublisher::new(
        transport,
        TelemetryConfig {
            channel_id: "442333".into(),
            write_api_key: "KEY".into(),
            publish_interval_ms: 30_000,
            report_free_heap: false,
        },
        || 0,
    );
    publisher
        .receive(&RateSample { cpm: 0.0, count: 0, timestamp_ms: 30_001 })
        .unwrap();

    let (topic, payload) = publisher.transport().last().unwrap();
    assert_eq!(topic, "channels/442333/publish/KEY");
    assert_eq!(payload, "field1=0.00\n");

    let transport = publisher.shutdown();
    assert!(!transport.is_connected());
}
