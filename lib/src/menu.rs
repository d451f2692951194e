//! Scrollable, wrapping list menu.
//!
//! The model keeps `offset <= selected < offset + visible` at all times, and
//! `offset` never scrolls past the point where the last entry sits on the
//! bottom row.

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_7X13, FONT_8X13_BOLD};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use thiserror::Error;

use crate::display::{
    self, BACKGROUND, DIVIDER, FOREGROUND, Frame, HEADER_BG, HEADER_FG, HEIGHT, SELECTED_BG, WIDTH,
};

pub const HEADER_HEIGHT: u32 = 28;
pub const ROW_HEIGHT: u32 = 20;
pub const SCROLLBAR_WIDTH: u32 = 10;
const MIN_THUMB: u32 = 14;

const TRACK: Rgb888 = Rgb888::new(28, 28, 28);
const THUMB: Rgb888 = Rgb888::new(110, 110, 110);

/// Rows that fit under the header on a full screen.
pub const VISIBLE_ROWS: usize = ((HEIGHT as u32 - HEADER_HEIGHT) / ROW_HEIGHT) as usize;

#[derive(Debug, Error, PartialEq)]
pub enum MenuError {
    #[error("a menu needs at least one entry")]
    Empty,
    #[error("a menu needs at least one visible row")]
    NoRows,
}

pub struct Menu<T> {
    title: String,
    entries: Vec<(String, T)>,
    selected: usize,
    offset: usize,
    visible: usize,
}

impl<T> Menu<T> {
    pub fn new(title: impl Into<String>, entries: Vec<(String, T)>) -> Result<Self, MenuError> {
        Self::with_visible_rows(title, entries, VISIBLE_ROWS)
    }

    pub fn with_visible_rows(
        title: impl Into<String>,
        entries: Vec<(String, T)>,
        visible: usize,
    ) -> Result<Self, MenuError> {
        if entries.is_empty() {
            return Err(MenuError::Empty);
        }
        if visible == 0 {
            return Err(MenuError::NoRows);
        }
        Ok(Self {
            title: title.into(),
            entries,
            selected: 0,
            offset: 0,
            visible,
        })
    }

    /// Move up one entry; from the first entry wrap to the last with the
    /// list scrolled to its tail.
    pub fn up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            if self.selected < self.offset {
                self.offset -= 1;
            }
        } else {
            self.selected = self.entries.len() - 1;
            self.offset = (self.selected + 1).saturating_sub(self.visible);
        }
    }

    /// Move down one entry; from the last entry wrap to the top.
    pub fn down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
            if self.selected >= self.offset + self.visible {
                self.offset += 1;
            }
        } else {
            self.selected = 0;
            self.offset = 0;
        }
    }

    /// The highlighted entry.
    pub fn select(&self) -> (&str, &T) {
        let (label, value) = &self.entries[self.selected];
        (label, value)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn visible_rows(&self) -> usize {
        self.visible
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scrollbar thumb as `(y, height)` in screen pixels, or `None` when every
    /// entry fits on screen.
    pub fn scrollbar_thumb(&self) -> Option<(u32, u32)> {
        let n = self.entries.len();
        if n <= self.visible {
            return None;
        }
        let track_top = HEADER_HEIGHT;
        let track_h = HEIGHT as u32 - track_top;
        let thumb_h = (track_h * self.visible as u32 / n as u32).max(MIN_THUMB);
        let max_offset = (n - self.visible).max(1) as u32;
        let thumb_y = track_top + (track_h - thumb_h) * self.offset as u32 / max_offset;
        Some((thumb_y, thumb_h))
    }

    pub fn render(&self, frame: &mut Frame) {
        let header_style = MonoTextStyle::new(&FONT_8X13_BOLD, HEADER_FG);
        display::draw_header(frame, &self.title, HEADER_HEIGHT, header_style);

        let counter = format!("{}/{}", self.selected + 1, self.entries.len());
        let item_font = &FONT_7X13;
        let counter_w = display::text_width(item_font, &counter) as i32;
        display::draw_text(
            frame,
            &counter,
            WIDTH as i32 - SCROLLBAR_WIDTH as i32 - counter_w - 4,
            8,
            MonoTextStyle::new(item_font, HEADER_FG),
        );

        self.render_rows(frame);
        self.render_scrollbar(frame);
    }

    fn render_rows(&self, frame: &mut Frame) {
        let content_w = WIDTH as u32 - SCROLLBAR_WIDTH - 1;
        let rows = self.entries.iter().enumerate().skip(self.offset).take(self.visible);
        for (row, (idx, (label, _))) in rows.enumerate() {
            let y = (HEADER_HEIGHT + row as u32 * ROW_HEIGHT) as i32;
            let is_selected = idx == self.selected;
            let (bg, fg) = if is_selected {
                (SELECTED_BG, HEADER_FG)
            } else {
                (BACKGROUND, FOREGROUND)
            };

            display::fill_rect(frame, 0, y, content_w, ROW_HEIGHT, bg);
            let prefix = if is_selected { '>' } else { ' ' };
            display::draw_text(
                frame,
                &format!("{prefix} {label}"),
                6,
                y + 4,
                MonoTextStyle::new(&FONT_7X13, fg),
            );

            if !is_selected {
                let bottom = y + ROW_HEIGHT as i32 - 1;
                Line::new(Point::new(4, bottom), Point::new(content_w as i32 - 4, bottom))
                    .into_styled(PrimitiveStyle::with_stroke(DIVIDER, 1))
                    .draw(frame)
                    .ok();
            }
        }
    }

    fn render_scrollbar(&self, frame: &mut Frame) {
        let Some((thumb_y, thumb_h)) = self.scrollbar_thumb() else {
            return;
        };
        let x = (WIDTH as u32 - SCROLLBAR_WIDTH) as i32;
        let track_h = HEIGHT as u32 - HEADER_HEIGHT;
        display::fill_rect(frame, x, HEADER_HEIGHT as i32, SCROLLBAR_WIDTH, track_h, TRACK);
        display::fill_rect(frame, x + 2, thumb_y as i32, SCROLLBAR_WIDTH - 4, thumb_h, THUMB);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::new_frame;
    use crate::display::tests::pixel;

    fn menu(n: usize, visible: usize) -> Menu<usize> {
        let entries = (0..n).map(|i| (format!("item {i}"), i)).collect();
        Menu::with_visible_rows("TEST", entries, visible).unwrap()
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(
            Menu::<()>::new("X", vec![]).err(),
            Some(MenuError::Empty)
        );
        assert_eq!(
            Menu::with_visible_rows("X", vec![("a".to_string(), ())], 0).err(),
            Some(MenuError::NoRows)
        );
    }

    #[test]
    fn test_visible_rows_for_full_screen() {
        assert_eq!(VISIBLE_ROWS, 10);
    }

    #[test]
    fn test_three_entries_two_visible() {
        let mut m = menu(3, 2);
        m.down();
        m.down();
        assert_eq!((m.selected(), m.offset()), (2, 1));
        m.down();
        assert_eq!((m.selected(), m.offset()), (0, 0));
    }

    #[test]
    fn test_up_wraps_to_tail() {
        let mut m = menu(25, 10);
        m.up();
        assert_eq!((m.selected(), m.offset()), (24, 15));
        m.up();
        assert_eq!((m.selected(), m.offset()), (23, 15));
    }

    #[test]
    fn test_up_wrap_short_list_keeps_offset_zero() {
        let mut m = menu(4, 10);
        m.up();
        assert_eq!((m.selected(), m.offset()), (3, 0));
    }

    #[test]
    fn test_up_scrolls_when_leaving_window() {
        let mut m = menu(25, 10);
        m.up();
        for _ in 0..9 {
            m.up();
        }
        assert_eq!((m.selected(), m.offset()), (15, 15));
        m.up();
        assert_eq!((m.selected(), m.offset()), (14, 14));
    }

    #[test]
    fn test_select_preserves_insertion_order() {
        let entries = vec![
            ("Zeta".to_string(), 'z'),
            ("Alpha".to_string(), 'a'),
            ("Mid".to_string(), 'm'),
        ];
        let mut m = Menu::new("ORDER", entries).unwrap();
        assert_eq!(m.select(), ("Zeta", &'z'));
        m.down();
        assert_eq!(m.select(), ("Alpha", &'a'));
        // pure read
        assert_eq!(m.select(), ("Alpha", &'a'));
        assert_eq!(m.selected(), 1);
    }

    #[test]
    fn test_scrollbar_geometry() {
        let mut m = menu(20, 10);
        // track is 212px: thumb 106px at the top
        assert_eq!(m.scrollbar_thumb(), Some((28, 106)));
        m.up();
        assert_eq!(m.offset(), 10);
        assert_eq!(m.scrollbar_thumb(), Some((28 + 106, 106)));
        assert_eq!(menu(10, 10).scrollbar_thumb(), None);
    }

    #[test]
    fn test_scrollbar_min_thumb() {
        let m = menu(500, 10);
        assert_eq!(m.scrollbar_thumb(), Some((28, MIN_THUMB)));
    }

    #[test]
    fn test_render_highlights_selected_row() {
        let mut m = menu(12, 10);
        m.down();
        let mut frame = new_frame();
        m.render(&mut frame);
        // header bar
        assert_eq!(pixel(&frame, 2, 2), (25, 80, 160));
        // second row is selected, away from its text
        let y = (HEADER_HEIGHT + ROW_HEIGHT + 1) as usize;
        assert_eq!(pixel(&frame, 200, y), (0, 150, 75));
        // first row is not
        assert_eq!(pixel(&frame, 200, HEADER_HEIGHT as usize + 1), (10, 10, 10));
        // scrollbar track is present
        assert_eq!(pixel(&frame, WIDTH - 1, 200), (28, 28, 28));
    }
}
