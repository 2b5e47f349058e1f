//! Text display sink (128x64 OLED layout).
//!
//! Pixel rendering belongs to the driver. This module only decides what
//! text goes where:
//!
//! ```text
//! (10,0)  Geiger Counter
//! (30,20) CPM:  (70,20) 72.0
//! ```

use crate::error::SinkError;
use crate::estimator::RateSample;
use crate::sink::Sink;

/// Minimal text-mode display driver.
pub trait DisplayDriver {
    fn clear(&mut self) -> Result<(), SinkError>;
    fn draw_text(&mut self, text: &str, x: u8, y: u8) -> Result<(), SinkError>;
    /// Push the frame to the panel.
    fn present(&mut self) -> Result<(), SinkError>;
}

/// Decimal CPM text, e.g. `72.0` or `8.571428571428571`.
pub fn format_cpm_text(cpm: f64) -> String {
    // Debug keeps the trailing `.0` on whole values
    format!("{:?}", cpm)
}

/// Renders each sample on a [`DisplayDriver`].
pub struct DisplaySink<D: DisplayDriver> {
    driver: D,
}

impl<D: DisplayDriver> DisplaySink<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Startup splash.
    pub fn welcome(&mut self) -> Result<(), SinkError> {
        self.driver.clear()?;
        self.driver.draw_text("Welcome", 30, 20)?;
        self.driver.present()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: DisplayDriver> Sink for DisplaySink<D> {
    fn name(&self) -> &'static str {
        "display"
    }

    fn receive(&mut self, sample: &RateSample) -> Result<(), SinkError> {
        self.driver.clear()?;
        self.driver.draw_text("Geiger Counter", 10, 0)?;
        self.driver.draw_text("CPM: ", 30, 20)?;
        self.driver.draw_text(&format_cpm_text(sample.cpm), 70, 20)?;
        self.driver.present()
    }
}

/// One positioned text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextCell {
    pub text: String,
    pub x: u8,
    pub y: u8,
}

/// Driver that keeps the frame in memory and logs it on `present`.
///
/// Host runs only; the device draws on the OLED (`hal::display`).
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct FrameLog {
    pending: Vec<TextCell>,
    shown: Vec<TextCell>,
    frames: u32,
}

#[cfg(not(target_os = "espidf"))]
impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells of the last presented frame.
    pub fn shown(&self) -> &[TextCell] {
        &self.shown
    }

    /// Number of frames presented.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}

#[cfg(not(target_os = "espidf"))]
impl DisplayDriver for FrameLog {
    fn clear(&mut self) -> Result<(), SinkError> {
        self.pending.clear();
        Ok(())
    }

    fn draw_text(&mut self, text: &str, x: u8, y: u8) -> Result<(), SinkError> {
        self.pending.push(TextCell {
            text: text.to_string(),
            x,
            y,
        });
        Ok(())
    }

    fn present(&mut self) -> Result<(), SinkError> {
        self.shown = core::mem::take(&mut self.pending);
        self.frames += 1;

        let line: String = self.shown.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" | ");
        log::info!("[display] {}", line);
        Ok(())
    }
}
