//! Error types.

use thiserror::Error;

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sampling period must be > 0 ms")]
    ZeroPeriod,
    #[error("normalization period must be > 0 ms")]
    ZeroNormalization,
    #[error("telemetry publish interval must be > 0 ms")]
    ZeroPublishInterval,
    #[error("retry policy needs at least one attempt")]
    ZeroAttempts,
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
}

/// MQTT transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected to broker")]
    NotConnected,
    #[error("broker connect failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Failure of a single sink during dispatch.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("display error: {0}")]
    Display(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// All attempts of a bounded retry failed.
#[derive(Debug, Error)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryError<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub last: E,
}
