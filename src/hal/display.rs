//! SSD1306 128x64 OLED on I2C0 as a [`DisplayDriver`].
//!
//! ```text
//! GPIO21 (SDA) ──┐
//!                ├──▶ I2C0 ──▶ SSD1306 @ 0x3C
//! GPIO22 (SCL) ──┘
//! ```
//!
//! Text is drawn into the panel's frame buffer and pushed on `present`.
//! Coordinates are the top-left corner of the text, as on the original
//! framebuffer layout.

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver, I2C0};
use esp_idf_svc::hal::units::Hertz;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use crate::config::PanelConfig;
use crate::display::DisplayDriver;
use crate::error::SinkError;

type Panel = Ssd1306<
    I2CInterface<I2cDriver<'static>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

fn panel_err(e: impl core::fmt::Debug) -> SinkError {
    SinkError::Display(format!("{:?}", e))
}

/// Buffered SSD1306 panel.
pub struct OledPanel {
    panel: Panel,
    style: MonoTextStyle<'static, BinaryColor>,
}

impl OledPanel {
    /// Bring up I2C0 on the configured pins and initialize the panel.
    pub fn open(i2c: I2C0, wiring: &PanelConfig) -> Result<Self, SinkError> {
        // SAFETY: SDA/SCL are not claimed by any other driver in the firmware
        let sda = unsafe { AnyIOPin::new(wiring.sda_gpio as i32) };
        let scl = unsafe { AnyIOPin::new(wiring.scl_gpio as i32) };

        let config = I2cConfig::new().baudrate(Hertz(wiring.i2c_hz));
        let bus = I2cDriver::new(i2c, sda, scl, &config)
            .map_err(|e| SinkError::Display(format!("i2c: {}", e)))?;

        let interface = I2CDisplayInterface::new_custom_address(bus, wiring.address);
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        panel.init().map_err(panel_err)?;

        log::info!(
            "OLED ready (SDA GPIO{}, SCL GPIO{}, addr {:#04x})",
            wiring.sda_gpio,
            wiring.scl_gpio,
            wiring.address
        );

        Ok(Self {
            panel,
            style: MonoTextStyle::new(&FONT_6X10, BinaryColor::On),
        })
    }
}

impl DisplayDriver for OledPanel {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.panel.clear_buffer();
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: u8, y: u8) -> Result<(), SinkError> {
        Text::with_baseline(text, Point::new(x.into(), y.into()), self.style, Baseline::Top)
            .draw(&mut self.panel)
            .map_err(panel_err)?;
        Ok(())
    }

    fn present(&mut self) -> Result<(), SinkError> {
        self.panel.flush().map_err(panel_err)
    }
}
