//! Wi-Fi station association with a bounded retry.

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{self, EspError};
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use crate::config::WifiConfig;
use crate::retry::RetryPolicy;

/// Station driver plus whether association succeeded.
///
/// The driver is returned even when association gave up so the caller
/// can keep it alive and continue degraded.
pub struct Station {
    pub wifi: BlockingWifi<EspWifi<'static>>,
    pub connected: bool,
}

fn invalid_arg() -> EspError {
    EspError::from_infallible::<{ sys::ESP_ERR_INVALID_ARG as sys::esp_err_t }>()
}

/// Bring up the station and try to associate.
pub fn connect_station(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: Option<EspDefaultNvsPartition>,
    config: &WifiConfig,
    retry: &RetryPolicy,
) -> Result<Station, EspError> {
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), nvs)?, sysloop)?;

    let auth_method = if config.password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config.ssid.as_str().try_into().map_err(|_| invalid_arg())?,
        password: config.password.as_str().try_into().map_err(|_| invalid_arg())?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;

    let associated = retry.run(
        |_| wifi.connect(),
        |ms| FreeRtos::delay_ms(ms),
    );
    let connected = match associated {
        Ok(()) => {
            wifi.wait_netif_up()?;
            let ip = wifi.wifi().sta_netif().get_ip_info()?;
            log::info!("Wi-Fi connected to `{}`, ip {}", config.ssid, ip.ip);
            true
        }
        Err(e) => {
            log::warn!("Wi-Fi did not connect: {}", e);
            false
        }
    };

    Ok(Station { wifi, connected })
}
