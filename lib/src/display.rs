//! Frames, the blit surface, and the small drawing kit shared by every screen.

use embedded_graphics::framebuffer::{Framebuffer, buffer_size};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::pixelcolor::raw::BigEndian;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use thiserror::Error;

pub const WIDTH: usize = 240;
pub const HEIGHT: usize = 240;

/// A full-screen RGB888 frame. Pixels are stored row-major, three bytes each,
/// which is exactly the layout [`crate::rgb565::encode`] consumes.
pub type Frame = Framebuffer<
    Rgb888,
    <Rgb888 as PixelColor>::Raw,
    BigEndian,
    WIDTH,
    HEIGHT,
    { buffer_size::<Rgb888>(WIDTH, HEIGHT) },
>;

pub const BACKGROUND: Rgb888 = Rgb888::new(10, 10, 10);
pub const FOREGROUND: Rgb888 = Rgb888::new(210, 210, 210);
pub const HEADER_BG: Rgb888 = Rgb888::new(25, 80, 160);
pub const HEADER_FG: Rgb888 = Rgb888::WHITE;
pub const SELECTED_BG: Rgb888 = Rgb888::new(0, 150, 75);
pub const DIVIDER: Rgb888 = Rgb888::new(45, 45, 45);
pub const ERROR_FG: Rgb888 = Rgb888::new(255, 80, 80);
pub const MESSAGE_FG: Rgb888 = Rgb888::new(220, 220, 220);

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("SPI transfer failed: {0:?}")]
    Spi(embedded_hal::spi::ErrorKind),
    #[error("GPIO write failed: {0:?}")]
    Pin(embedded_hal::digital::ErrorKind),
    #[error("window ({x0},{y0})..({x1},{y1}) is outside the 240x240 panel")]
    Window { x0: u16, y0: u16, x1: u16, y1: u16 },
    #[error("display session is closed")]
    Closed,
}

/// Anything that can show a full frame. This is the only mutation the UI
/// layer performs on the display.
pub trait Surface {
    fn blit(&mut self, frame: &Frame) -> Result<(), DisplayError>;
}

pub fn new_frame() -> Box<Frame> {
    Box::new(Frame::new())
}

/// Width in pixels of `text` rendered with a monospaced font.
pub fn text_width(font: &MonoFont, text: &str) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * font.character_size.width + (n - 1) * font.character_spacing
}

/// Draw `text` with its top-left corner at `(x, y)`.
pub fn draw_text(frame: &mut Frame, text: &str, x: i32, y: i32, style: MonoTextStyle<Rgb888>) {
    Text::with_baseline(text, Point::new(x, y), style, Baseline::Top)
        .draw(frame)
        .ok();
}

/// Draw `text` horizontally centred with its top edge at `y`.
pub fn draw_centered(frame: &mut Frame, text: &str, y: i32, style: MonoTextStyle<Rgb888>) {
    let w = text_width(style.font, text) as i32;
    draw_text(frame, text, (WIDTH as i32 - w) / 2, y, style);
}

pub fn fill_rect(frame: &mut Frame, x: i32, y: i32, w: u32, h: u32, color: Rgb888) {
    if w == 0 || h == 0 {
        return;
    }
    Rectangle::new(Point::new(x, y), Size::new(w, h))
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(frame)
        .ok();
}

/// Clear the frame and draw a full-width title bar of `height` pixels.
pub fn draw_header(
    frame: &mut Frame,
    title: &str,
    height: u32,
    style: MonoTextStyle<Rgb888>,
) {
    frame.clear(BACKGROUND).ok();
    fill_rect(frame, 0, 0, WIDTH as u32, height, HEADER_BG);
    let text_h = style.font.character_size.height;
    let y = (height.saturating_sub(text_h) / 2) as i32;
    draw_text(frame, title, 6, y, style);
}

/// A one-line message screen under a titled header.
pub fn render_message(frame: &mut Frame, title: &str, message: &str) {
    use embedded_graphics::mono_font::ascii::{FONT_7X13, FONT_8X13_BOLD};
    draw_header(frame, title, 22, MonoTextStyle::new(&FONT_8X13_BOLD, HEADER_FG));
    draw_centered(
        frame,
        message,
        HEIGHT as i32 / 2 - 6,
        MonoTextStyle::new(&FONT_7X13, MESSAGE_FG),
    );
}
