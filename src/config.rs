//! Module: config
//!
//! Purpose: Process-start configuration for the monitor.
//!
//! Architecture:
//! - One `MonitorConfig` covers every deployment (display, cloud, web);
//!   deployments are presets, not separate loops.
//! - Credentials and channel ids are baked in at build time from
//!   `GEIGER_*` environment variables (see build.rs).
//! - Nothing here is mutated after `validate()`.

use core::str::FromStr;

use crate::error::ConfigError;
use crate::estimator::{SamplingWindow, MINUTE_MS};
use crate::retry::RetryPolicy;
use crate::telemetry::{BrokerConfig, TelemetryConfig};
use crate::web::SchedulingPolicy;

/// Build-time settings.
pub mod build_env {
    pub const DEPLOYMENT: &str = match option_env!("GEIGER_DEPLOYMENT") {
        Some(v) => v,
        None => "web",
    };
    pub const WIFI_SSID: &str = match option_env!("GEIGER_WIFI_SSID") {
        Some(v) => v,
        None => "",
    };
    pub const WIFI_PASSWORD: &str = match option_env!("GEIGER_WIFI_PASSWORD") {
        Some(v) => v,
        None => "",
    };
    pub const MQTT_USER: &str = match option_env!("GEIGER_MQTT_USER") {
        Some(v) => v,
        None => "",
    };
    pub const MQTT_API_KEY: &str = match option_env!("GEIGER_MQTT_API_KEY") {
        Some(v) => v,
        None => "",
    };
    pub const CHANNEL_ID: &str = match option_env!("GEIGER_CHANNEL_ID") {
        Some(v) => v,
        None => "",
    };
    pub const CHANNEL_WRITE_KEY: &str = match option_env!("GEIGER_CHANNEL_WRITE_KEY") {
        Some(v) => v,
        None => "",
    };
}

/// Default sampling window for the display and web deployments.
pub const DEFAULT_PERIOD_MS: u32 = 10_000;
/// Sampling window of the cloud deployment.
pub const CLOUD_PERIOD_MS: u32 = 30_000;
/// Telemetry cadence.
pub const DEFAULT_PUBLISH_INTERVAL_MS: u32 = 30_000;
/// GPIO wired to the CAJOE VIN (pulse) output.
pub const DEFAULT_PULSE_GPIO: u8 = 34;
/// SSD1306 wiring (I2C0).
pub const DEFAULT_DISPLAY_SDA_GPIO: u8 = 21;
pub const DEFAULT_DISPLAY_SCL_GPIO: u8 = 22;
/// 7-bit panel address, SA0 tied low.
pub const DEFAULT_DISPLAY_I2C_ADDR: u8 = 0x3C;
pub const DEFAULT_DISPLAY_I2C_HZ: u32 = 400_000;
pub const DEFAULT_WEB_PORT: u16 = 80;
pub const THINGSPEAK_BROKER: &str = "mqtt.thingspeak.com";
pub const THINGSPEAK_PORT: u16 = 1883;

/// Which surfaces the firmware drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    /// OLED only, no network.
    Display,
    /// MQTT telemetry, no display.
    Cloud,
    /// OLED plus web page.
    Web,
}

impl FromStr for Deployment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "display" => Ok(Deployment::Display),
            "cloud" => Ok(Deployment::Cloud),
            "web" => Ok(Deployment::Web),
            _ => Err(ConfigError::Missing("GEIGER_DEPLOYMENT (display|cloud|web)")),
        }
    }
}

/// Station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
}

/// Web responder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebConfig {
    pub port: u16,
    pub policy: SchedulingPolicy,
}

/// OLED panel wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    pub sda_gpio: u8,
    pub scl_gpio: u8,
    pub address: u8,
    pub i2c_hz: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            sda_gpio: DEFAULT_DISPLAY_SDA_GPIO,
            scl_gpio: DEFAULT_DISPLAY_SCL_GPIO,
            address: DEFAULT_DISPLAY_I2C_ADDR,
            i2c_hz: DEFAULT_DISPLAY_I2C_HZ,
        }
    }
}

/// Broker plus channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub broker: BrokerConfig,
    pub telemetry: TelemetryConfig,
}

/// Complete monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub window: SamplingWindow,
    pub pulse_gpio: u8,
    pub display: bool,
    pub panel: PanelConfig,
    pub web: Option<WebConfig>,
    pub cloud: Option<CloudConfig>,
    pub wifi: Option<WifiConfig>,
    pub wifi_retry: RetryPolicy,
    pub broker_retry: RetryPolicy,
    /// Sleep between loop iterations.
    pub loop_delay_ms: u32,
}

impl MonitorConfig {
    fn base(period_ms: u32) -> Result<Self, ConfigError> {
        Ok(Self {
            window: SamplingWindow::new(period_ms, MINUTE_MS)?,
            pulse_gpio: DEFAULT_PULSE_GPIO,
            display: false,
            panel: PanelConfig::default(),
            web: None,
            cloud: None,
            wifi: None,
            wifi_retry: RetryPolicy::default(),
            broker_retry: RetryPolicy::new(3, 1_000)?,
            loop_delay_ms: 10,
        })
    }

    /// OLED-only: 10 s window, no network.
    pub fn display_only() -> Result<Self, ConfigError> {
        let mut config = Self::base(DEFAULT_PERIOD_MS)?;
        config.display = true;
        Ok(config)
    }

    /// MQTT telemetry: 30 s window, 30 s cadence, 1 s loop sleep.
    pub fn cloud() -> Result<Self, ConfigError> {
        let mut config = Self::base(CLOUD_PERIOD_MS)?;
        config.wifi = Some(build_wifi());
        config.cloud = Some(CloudConfig {
            broker: BrokerConfig {
                server: THINGSPEAK_BROKER.to_string(),
                port: THINGSPEAK_PORT,
                user: build_env::MQTT_USER.to_string(),
                password: build_env::MQTT_API_KEY.to_string(),
            },
            telemetry: TelemetryConfig {
                channel_id: build_env::CHANNEL_ID.to_string(),
                write_api_key: build_env::CHANNEL_WRITE_KEY.to_string(),
                publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
                report_free_heap: false,
            },
        });
        config.loop_delay_ms = 1_000;
        Ok(config)
    }

    /// OLED plus web page on port 80; accept blocks sampling.
    pub fn web() -> Result<Self, ConfigError> {
        let mut config = Self::base(DEFAULT_PERIOD_MS)?;
        config.display = true;
        config.wifi = Some(build_wifi());
        config.web = Some(WebConfig {
            port: DEFAULT_WEB_PORT,
            policy: SchedulingPolicy::WebBlocksSampling,
        });
        Ok(config)
    }

    pub fn for_deployment(deployment: Deployment) -> Result<Self, ConfigError> {
        match deployment {
            Deployment::Display => Self::display_only(),
            Deployment::Cloud => Self::cloud(),
            Deployment::Web => Self::web(),
        }
    }

    /// Preset selected by `GEIGER_DEPLOYMENT` at build time.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::for_deployment(build_env::DEPLOYMENT.parse()?)
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.period_ms() == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.wifi_retry.max_attempts == 0 || self.broker_retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if let Some(wifi) = &self.wifi {
            if wifi.ssid.is_empty() {
                return Err(ConfigError::Missing("GEIGER_WIFI_SSID"));
            }
        }
        if let Some(cloud) = &self.cloud {
            if cloud.telemetry.publish_interval_ms == 0 {
                return Err(ConfigError::ZeroPublishInterval);
            }
            if cloud.telemetry.channel_id.is_empty() {
                return Err(ConfigError::Missing("GEIGER_CHANNEL_ID"));
            }
            if cloud.telemetry.write_api_key.is_empty() {
                return Err(ConfigError::Missing("GEIGER_CHANNEL_WRITE_KEY"));
            }
            if cloud.broker.user.is_empty() {
                return Err(ConfigError::Missing("GEIGER_MQTT_USER"));
            }
            if cloud.broker.password.is_empty() {
                return Err(ConfigError::Missing("GEIGER_MQTT_API_KEY"));
            }
        }
        Ok(())
    }
}

fn build_wifi() -> WifiConfig {
    WifiConfig {
        ssid: build_env::WIFI_SSID.to_string(),
        password: build_env::WIFI_PASSWORD.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let display = MonitorConfig::display_only().unwrap();
        assert!(display.display);
        assert!(display.web.is_none() && display.cloud.is_none() && display.wifi.is_none());
        assert_eq!(display.window.extrapolation_factor(), 6.0);
        assert!(display.validate().is_ok());
        assert_eq!(display.panel.sda_gpio, 21);
        assert_eq!(display.panel.scl_gpio, 22);
        assert_eq!(display.panel.address, 0x3C);

        let cloud = MonitorConfig::cloud().unwrap();
        assert!(!cloud.display);
        assert_eq!(cloud.window.period_ms(), 30_000);
        assert_eq!(cloud.cloud.as_ref().unwrap().telemetry.publish_interval_ms, 30_000);

        let web = MonitorConfig::web().unwrap();
        assert_eq!(web.web.unwrap().port, 80);
        assert_eq!(web.web.unwrap().policy, SchedulingPolicy::WebBlocksSampling);
        assert_eq!(web.wifi_retry, RetryPolicy { max_attempts: 20, backoff_ms: 1_000 });
    }

    #[test]
    fn test_deployment_parse() {
        assert_eq!("Cloud".parse::<Deployment>().unwrap(), Deployment::Cloud);
        assert_eq!(" web ".parse::<Deployment>().unwrap(), Deployment::Web);
        assert!("satellite".parse::<Deployment>().is_err());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut config = MonitorConfig::cloud().unwrap();
        config.wifi = Some(WifiConfig { ssid: "lab".into(), password: "pw".into() });
        if let Some(cloud) = config.cloud.as_mut() {
            cloud.telemetry.channel_id = String::new();
            cloud.telemetry.write_api_key = "KEY".into();
        }
        assert_eq!(config.validate(), Err(ConfigError::Missing("GEIGER_CHANNEL_ID")));

        if let Some(cloud) = config.cloud.as_mut() {
            cloud.telemetry.channel_id = "1".into();
            cloud.telemetry.publish_interval_ms = 0;
        }
        assert_eq!(config.validate(), Err(ConfigError::ZeroPublishInterval));

        config.wifi = Some(WifiConfig { ssid: String::new(), password: String::new() });
        assert_eq!(config.validate(), Err(ConfigError::Missing("GEIGER_WIFI_SSID")));
    }

    #[test]
    fn test_validate_requires_broker_credentials() {
        let mut config = MonitorConfig::cloud().unwrap();
        config.wifi = Some(WifiConfig { ssid: "lab".into(), password: "pw".into() });
        let cloud = config.cloud.as_mut().unwrap();
        cloud.telemetry.channel_id = "1".into();
        cloud.telemetry.write_api_key = "KEY".into();
        cloud.broker.user = String::new();
        cloud.broker.password = "API".into();
        assert_eq!(config.validate(), Err(ConfigError::Missing("GEIGER_MQTT_USER")));

        let cloud = config.cloud.as_mut().unwrap();
        cloud.broker.user = "user".into();
        cloud.broker.password = String::new();
        assert_eq!(config.validate(), Err(ConfigError::Missing("GEIGER_MQTT_API_KEY")));

        config.cloud.as_mut().unwrap().broker.password = "API".into();
        assert!(config.validate().is_ok());
    }
}
