//! ESP-IDF MQTT client as a [`MqttTransport`].

use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

use crate::error::TransportError;
use crate::telemetry::{BrokerConfig, MqttTransport};

/// MQTT over plain TCP (port 1883). The IDF client reconnects on its own.
#[derive(Default)]
pub struct EspMqttTransport {
    client: Option<EspMqttClient<'static>>,
}

impl EspMqttTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MqttTransport for EspMqttTransport {
    fn connect(&mut self, client_id: &str, broker: &BrokerConfig) -> Result<(), TransportError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: Some(broker.user.as_str()),
            password: Some(broker.password.as_str()),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(&broker.url(), &conf, |event| match event.payload() {
            EventPayload::Connected(_) => log::info!("broker connected"),
            EventPayload::Disconnected => log::warn!("broker disconnected"),
            _ => {}
        })
        .map_err(|e| TransportError::Connect(e.to_string()))?;

        self.client = Some(client);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotConnected)?;
        // Fire-and-forget: queue the message and return
        client
            .enqueue(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    fn disconnect(&mut self) {
        self.client = None;
    }
}
