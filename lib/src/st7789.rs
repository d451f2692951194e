//! Raw command/data driver for the ST7789 240x240 panel.
//!
//! The driver is generic over the `embedded-hal` 1.0 traits so that the same
//! code runs against Linux spidev/sysfs handles on the device and against
//! recording doubles in tests. The data/command line selects how the panel
//! interprets each byte: low for a command opcode, high for payload.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::spi::{Error as _, SpiDevice};
use log::debug;

use crate::display::{DisplayError, Frame, HEIGHT, Surface, WIDTH};
use crate::rgb565;

/// spidev rejects transfers larger than its buffer size (4096 by default).
pub const MAX_TRANSFER: usize = 4096;

/// MADCTL value rotating the panel 90° clockwise, matching the enclosure.
pub const DEFAULT_MADCTL: u8 = 0x60;

pub mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// COLMOD payload selecting 16 bits per pixel.
const COLMOD_16BPP: u8 = 0x55;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Window {
    pub const FULL: Window = Window {
        x0: 0,
        y0: 0,
        x1: WIDTH as u16 - 1,
        y1: HEIGHT as u16 - 1,
    };

    fn is_valid(&self) -> bool {
        self.x0 <= self.x1
            && self.y0 <= self.y1
            && (self.x1 as usize) < WIDTH
            && (self.y1 as usize) < HEIGHT
    }
}

pub struct St7789<SPI, DC, RST, D> {
    spi: SPI,
    dc: DC,
    rst: RST,
    delay: D,
    madctl: u8,
    window: Option<Window>,
}

impl<SPI, DC, RST, D> St7789<SPI, DC, RST, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    pub fn new(spi: SPI, dc: DC, rst: RST, delay: D) -> Self {
        Self {
            spi,
            dc,
            rst,
            delay,
            madctl: DEFAULT_MADCTL,
            window: None,
        }
    }

    pub fn with_madctl(mut self, madctl: u8) -> Self {
        self.madctl = madctl;
        self
    }

    /// Hardware reset followed by the power-up command sequence. The panel
    /// ignores commands during the post-reset and sleep-out settling times,
    /// so the delays are minimums.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        debug!("resetting ST7789 (madctl=0x{:02X})", self.madctl);
        self.rst.set_low().map_err(|e| DisplayError::Pin(e.kind()))?;
        self.delay.delay_ms(50);
        self.rst.set_high().map_err(|e| DisplayError::Pin(e.kind()))?;
        self.delay.delay_ms(120);

        self.write_command(cmd::SWRESET)?;
        self.delay.delay_ms(150);
        self.write_command(cmd::SLPOUT)?;
        self.delay.delay_ms(150);
        self.write_command(cmd::COLMOD)?;
        self.write_data(&[COLMOD_16BPP])?;
        self.write_command(cmd::MADCTL)?;
        self.write_data(&[self.madctl])?;
        self.write_command(cmd::INVON)?;
        self.write_command(cmd::DISPON)?;
        self.delay.delay_ms(100);

        self.window = None;
        Ok(())
    }

    pub fn write_command(&mut self, command: u8) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|e| DisplayError::Pin(e.kind()))?;
        self.spi
            .write(&[command])
            .map_err(|e| DisplayError::Spi(e.kind()))
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_high().map_err(|e| DisplayError::Pin(e.kind()))?;
        for chunk in data.chunks(MAX_TRANSFER) {
            self.spi
                .write(chunk)
                .map_err(|e| DisplayError::Spi(e.kind()))?;
        }
        Ok(())
    }

    /// Target the inclusive rectangle `(x0, y0)..=(x1, y1)` and open a memory
    /// write. The next [`Self::write_data`] fills it row by row.
    pub fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DisplayError> {
        let window = Window { x0, y0, x1, y1 };
        if !window.is_valid() {
            return Err(DisplayError::Window { x0, y0, x1, y1 });
        }

        let [x0h, x0l] = x0.to_be_bytes();
        let [x1h, x1l] = x1.to_be_bytes();
        let [y0h, y0l] = y0.to_be_bytes();
        let [y1h, y1l] = y1.to_be_bytes();
        self.write_command(cmd::CASET)?;
        self.write_data(&[x0h, x0l, x1h, x1l])?;
        self.write_command(cmd::RASET)?;
        self.write_data(&[y0h, y0l, y1h, y1l])?;
        self.write_command(cmd::RAMWR)?;

        self.window = Some(window);
        Ok(())
    }

    /// The addressing window most recently set, if any since init.
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Give the bus and pins back so their owner can release them.
    pub fn release(self) -> (SPI, DC, RST) {
        (self.spi, self.dc, self.rst)
    }
}

impl<SPI, DC, RST, D> Surface for St7789<SPI, DC, RST, D>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    D: DelayNs,
{
    fn blit(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let Window { x0, y0, x1, y1 } = Window::FULL;
        self.set_window(x0, y0, x1, y1)?;
        self.write_data(&rgb565::encode(frame.data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::new_frame;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Reset(bool),
        Delay(u32),
        Command(u8),
        Data(Vec<u8>),
    }

    type Log = Rc<RefCell<Vec<Op>>>;

    struct MockSpi {
        log: Log,
        dc_high: Rc<RefCell<bool>>,
    }

    impl embedded_hal::spi::ErrorType for MockSpi {
        type Error = Infallible;
    }

    impl SpiDevice for MockSpi {
        fn transaction(
            &mut self,
            operations: &mut [embedded_hal::spi::Operation<'_, u8>],
        ) -> Result<(), Infallible> {
            for op in operations {
                if let embedded_hal::spi::Operation::Write(bytes) = op {
                    let entry = if *self.dc_high.borrow() {
                        Op::Data(bytes.to_vec())
                    } else {
                        assert_eq!(bytes.len(), 1, "commands are a single byte");
                        Op::Command(bytes[0])
                    };
                    self.log.borrow_mut().push(entry);
                }
            }
            Ok(())
        }
    }

    struct MockDc(Rc<RefCell<bool>>);

    impl embedded_hal::digital::ErrorType for MockDc {
        type Error = Infallible;
    }

    impl OutputPin for MockDc {
        fn set_low(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = true;
            Ok(())
        }
    }

    struct MockRst(Log);

    impl embedded_hal::digital::ErrorType for MockRst {
        type Error = Infallible;
    }

    impl OutputPin for MockRst {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(Op::Reset(false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().push(Op::Reset(true));
            Ok(())
        }
    }

    struct MockDelay(Log);

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.borrow_mut().push(Op::Delay(ns / 1_000_000));
        }
        fn delay_ms(&mut self, ms: u32) {
            self.0.borrow_mut().push(Op::Delay(ms));
        }
    }

    fn driver() -> (St7789<MockSpi, MockDc, MockRst, MockDelay>, Log) {
        let log: Log = Rc::default();
        let dc = Rc::new(RefCell::new(false));
        let spi = MockSpi {
            log: log.clone(),
            dc_high: dc.clone(),
        };
        let driver = St7789::new(spi, MockDc(dc), MockRst(log.clone()), MockDelay(log.clone()));
        (driver, log)
    }

    /// Merge consecutive data writes so assertions don't depend on chunking.
    fn coalesce(ops: &[Op]) -> Vec<Op> {
        let mut out: Vec<Op> = Vec::new();
        for op in ops {
            match (out.last_mut(), op) {
                (Some(Op::Data(prev)), Op::Data(next)) => prev.extend_from_slice(next),
                _ => out.push(op.clone()),
            }
        }
        out
    }

    #[test]
    fn test_init_sequence_and_timing() {
        let (mut panel, log) = driver();
        panel.init().unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                Op::Reset(false),
                Op::Delay(50),
                Op::Reset(true),
                Op::Delay(120),
                Op::Command(cmd::SWRESET),
                Op::Delay(150),
                Op::Command(cmd::SLPOUT),
                Op::Delay(150),
                Op::Command(cmd::COLMOD),
                Op::Data(vec![0x55]),
                Op::Command(cmd::MADCTL),
                Op::Data(vec![DEFAULT_MADCTL]),
                Op::Command(cmd::INVON),
                Op::Command(cmd::DISPON),
                Op::Delay(100),
            ]
        );
    }

    #[test]
    fn test_custom_orientation() {
        let (panel, log) = driver();
        let mut panel = panel.with_madctl(0x00);
        panel.init().unwrap();
        assert!(log.borrow().contains(&Op::Data(vec![0x00])));
    }

    #[test]
    fn test_set_window_big_endian() {
        let (mut panel, log) = driver();
        panel.set_window(1, 2, 200, 239).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                Op::Command(cmd::CASET),
                Op::Data(vec![0x00, 0x01, 0x00, 0xC8]),
                Op::Command(cmd::RASET),
                Op::Data(vec![0x00, 0x02, 0x00, 0xEF]),
                Op::Command(cmd::RAMWR),
            ]
        );
        assert_eq!(
            panel.window(),
            Some(Window {
                x0: 1,
                y0: 2,
                x1: 200,
                y1: 239
            })
        );
    }

    #[test]
    fn test_set_window_rejects_out_of_range() {
        let (mut panel, log) = driver();
        assert!(matches!(
            panel.set_window(0, 0, 240, 10),
            Err(DisplayError::Window { x1: 240, .. })
        ));
        assert!(panel.set_window(10, 0, 9, 0).is_err());
        assert!(panel.set_window(0, 5, 0, 4).is_err());
        assert!(log.borrow().is_empty());
        assert_eq!(panel.window(), None);
    }

    #[test]
    fn test_write_data_chunks() {
        let (mut panel, log) = driver();
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        panel.write_data(&data).unwrap();
        let sizes: Vec<usize> = log
            .borrow()
            .iter()
            .map(|op| match op {
                Op::Data(d) => d.len(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(coalesce(&log.borrow()), vec![Op::Data(data)]);
    }

    #[test]
    fn test_blit_full_window_then_pixels() {
        let (mut panel, log) = driver();
        let mut frame = new_frame();
        use embedded_graphics::pixelcolor::Rgb888;
        use embedded_graphics::prelude::*;
        frame.clear(Rgb888::new(0xF8, 0, 0)).ok();

        panel.blit(&frame).unwrap();

        let ops = coalesce(&log.borrow());
        assert_eq!(ops[0], Op::Command(cmd::CASET));
        assert_eq!(ops[1], Op::Data(vec![0, 0, 0, 239]));
        assert_eq!(ops[3], Op::Data(vec![0, 0, 0, 239]));
        assert_eq!(ops[4], Op::Command(cmd::RAMWR));
        let Op::Data(pixels) = &ops[5] else {
            panic!("expected pixel data")
        };
        assert_eq!(pixels.len(), WIDTH * HEIGHT * 2);
        assert!(pixels.chunks(2).all(|p| p == [0xF8, 0x00]));
        assert_eq!(panel.window(), Some(Window::FULL));
    }
}
