//! Falling-edge interrupt on the CAJOE pulse line.
//!
//! ```text
//! CAJOE VIN ──▶ GPIO34 (input only, no pulls) ──▶ NEGEDGE ISR ──▶ PULSE_COUNTER
//! ```

use core::ffi::c_void;

use esp_idf_svc::sys::{self, esp, EspError};

use crate::pulse::PULSE_COUNTER;

/// ISR: one atomic increment, nothing else.
unsafe extern "C" fn on_falling_edge(_arg: *mut c_void) {
    PULSE_COUNTER.on_pulse_edge();
}

/// Configure `gpio` as input and route its falling edges to [`PULSE_COUNTER`].
pub fn attach_pulse_interrupt(gpio: u8) -> Result<(), EspError> {
    let io = sys::gpio_config_t {
        pin_bit_mask: 1u64 << gpio,
        mode: sys::gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: sys::gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: sys::gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: sys::gpio_int_type_t_GPIO_INTR_NEGEDGE,
        ..Default::default()
    };

    // SAFETY: `io` outlives the call
    esp!(unsafe { sys::gpio_config(&io) })?;

    // Already installed by another driver is fine
    let err = unsafe { sys::gpio_install_isr_service(0) };
    if err != sys::ESP_ERR_INVALID_STATE as sys::esp_err_t {
        esp!(err)?;
    }

    // SAFETY: Handler is a plain fn touching only a static atomic
    esp!(unsafe {
        sys::gpio_isr_handler_add(
            gpio as sys::gpio_num_t,
            Some(on_falling_edge),
            core::ptr::null_mut(),
        )
    })?;

    log::info!("pulse interrupt armed on GPIO{}", gpio);
    Ok(())
}
