//! Linux wiring: spidev for the panel bus, sysfs GPIO for the control lines
//! and the buttons.

use std::time::Duration;

use anyhow::{Context, Result};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Delay, SpidevDevice, SysfsPin};
use log::{info, warn};
use slb::display::{DisplayError, Frame, Surface};
use slb::input::{Button, InputError, Level, LineSampler};
use slb::st7789::St7789;

use crate::config::{ButtonPins, Config};

type Panel = St7789<SpidevDevice, SysfsPin, SysfsPin, Delay>;

/// Sysfs needs a moment after export before udev has fixed up permissions.
const EXPORT_SETTLE: Duration = Duration::from_millis(10);

fn export_pin(number: u64, direction: Direction) -> Result<SysfsPin> {
    let pin = SysfsPin::new(number);
    pin.export()
        .with_context(|| format!("failed to export GPIO {number}"))?;
    std::thread::sleep(EXPORT_SETTLE);
    pin.set_direction(direction)
        .with_context(|| format!("failed to set direction of GPIO {number}"))?;
    Ok(pin)
}

fn unexport_pin(pin: &SysfsPin) {
    if let Err(e) = pin.unexport() {
        warn!("failed to unexport GPIO {}: {e}", pin.get_pin_num());
    }
}

/// The panel for the lifetime of the process. Closing releases the bus and
/// unexports the control lines; after that every blit fails with
/// [`DisplayError::Closed`].
pub struct DisplaySession {
    panel: Option<Panel>,
}

impl DisplaySession {
    pub fn open(config: &Config) -> Result<Self> {
        let mut spi = SpidevDevice::open(&config.spi_device)
            .with_context(|| format!("failed to open {}", config.spi_device))?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(config.spi_speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)
            .with_context(|| format!("failed to configure {}", config.spi_device))?;

        let dc = export_pin(config.dc_pin, Direction::Low)?;
        let rst = export_pin(config.rst_pin, Direction::High)?;

        let mut panel = St7789::new(spi, dc, rst, Delay).with_madctl(config.madctl);
        panel.init().context("failed to initialize ST7789")?;
        info!(
            "display ready on {} at {} Hz",
            config.spi_device, config.spi_speed_hz
        );
        Ok(Self { panel: Some(panel) })
    }

    /// Release the bus and the control lines. Safe to call more than once.
    pub fn close(&mut self) {
        let Some(panel) = self.panel.take() else {
            return;
        };
        let (spi, dc, rst) = panel.release();
        drop(spi);
        unexport_pin(&dc);
        unexport_pin(&rst);
        info!("display closed");
    }
}

impl Surface for DisplaySession {
    fn blit(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        match self.panel.as_mut() {
            Some(panel) => panel.blit(frame),
            None => Err(DisplayError::Closed),
        }
    }
}

impl Drop for DisplaySession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Button lines read through sysfs. Pull-ups come from the boot
/// configuration; sysfs cannot set them.
pub struct GpioButtons {
    pins: Vec<(Button, SysfsPin)>,
}

impl GpioButtons {
    pub fn open(pins: &ButtonPins) -> Result<Self> {
        let pins = Button::ALL
            .iter()
            .map(|&button| Ok((button, export_pin(pins.pin(button), Direction::In)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { pins })
    }
}

fn level_from_value(value: u8) -> Level {
    if value == 0 { Level::Low } else { Level::High }
}

impl LineSampler for GpioButtons {
    fn sample(&mut self, button: Button) -> Result<Level, InputError> {
        let Some((_, pin)) = self.pins.iter().find(|(b, _)| *b == button) else {
            return Err(InputError {
                button,
                reason: "line not configured".to_string(),
            });
        };
        pin.get_value().map(level_from_value).map_err(|e| InputError {
            button,
            reason: e.to_string(),
        })
    }
}

impl Drop for GpioButtons {
    fn drop(&mut self) {
        for (_, pin) in &self.pins {
            unexport_pin(pin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_low_levels() {
        assert_eq!(level_from_value(0), Level::Low);
        assert_eq!(level_from_value(1), Level::High);
    }
}
