//! Question/answer pages: word wrap plus first-fit packing into screens.

use embedded_graphics::mono_font::ascii::{FONT_7X13, FONT_8X13_BOLD};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use serde::{Deserialize, Serialize};

use crate::display::{self, DIVIDER, Frame, HEADER_FG, HEIGHT, WIDTH};

pub const HEADER_HEIGHT: u32 = 24;
pub const LINE_HEIGHT: u32 = 15;
pub const PAD: u32 = 4;

const QUESTION_FG: Rgb888 = Rgb888::new(100, 200, 255);
const ANSWER_FG: Rgb888 = Rgb888::new(140, 220, 140);

static BODY_FONT: &MonoFont = &FONT_7X13;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// One wrapped question/answer pair as it appears on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub question: Vec<String>,
    pub answer: Vec<String>,
}

impl Entry {
    /// Lines this entry occupies, including the gap that follows it.
    pub fn lines(&self) -> usize {
        self.question.len() + self.answer.len() + 1
    }
}

/// Greedy word wrap to `width` characters. The first line starts with
/// `prefix`; continuation lines are indented by the prefix's width. A word
/// longer than a whole line is kept intact on a line of its own.
///
/// The first word always shares the prefixed line, even when it overflows, so
/// a question never opens with a bare `Q: ` line.
pub fn wrap(text: &str, prefix: &str, width: usize) -> Vec<String> {
    let indent = " ".repeat(prefix.chars().count());
    let mut lines = Vec::new();
    let mut line = prefix.to_string();
    let mut bare = true;

    for word in text.split_whitespace() {
        if bare {
            line.push_str(word);
            bare = false;
        } else if line.chars().count() + 1 + word.chars().count() <= width {
            line.push(' ');
            line.push_str(word);
        } else {
            lines.push(std::mem::replace(&mut line, format!("{indent}{word}")));
        }
    }
    lines.push(line);
    lines
}

/// Characters per line for `font` across the padded screen width.
pub fn chars_per_line(font: &MonoFont) -> usize {
    let glyph = (font.character_size.width + font.character_spacing).max(1);
    let usable = WIDTH as u32 - PAD * 2;
    ((usable / glyph) as usize).max(10)
}

/// Text lines that fit under the header.
pub fn lines_per_page() -> usize {
    ((HEIGHT as u32 - HEADER_HEIGHT) / LINE_HEIGHT) as usize
}

pub struct PageSet {
    pages: Vec<Vec<Entry>>,
    current: usize,
}

impl PageSet {
    /// Wrap and pack `pairs` for the physical screen.
    pub fn for_screen(pairs: &[QaPair]) -> Self {
        Self::build(pairs, chars_per_line(BODY_FONT), lines_per_page())
    }

    /// Wrap every pair to `width` characters and pack them first-fit into
    /// pages of `capacity` lines. An entry that alone exceeds the capacity
    /// still gets a page of its own.
    pub fn build(pairs: &[QaPair], width: usize, capacity: usize) -> Self {
        let mut pages = Vec::new();
        let mut page: Vec<Entry> = Vec::new();
        let mut used = 0;

        for pair in pairs {
            let entry = Entry {
                question: wrap(&pair.question, "Q: ", width),
                answer: wrap(&pair.answer, "A: ", width),
            };
            let needed = entry.lines();
            if used + needed > capacity && !page.is_empty() {
                pages.push(std::mem::take(&mut page));
                used = 0;
            }
            page.push(entry);
            used += needed;
        }
        if !page.is_empty() {
            pages.push(page);
        }

        Self { pages, current: 0 }
    }

    pub fn next_page(&mut self) -> bool {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to `page`, clamped to the last page.
    pub fn set_page(&mut self, page: usize) {
        self.current = page.min(self.pages.len().saturating_sub(1));
    }

    pub fn current_page(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page(&self, index: usize) -> Option<&[Entry]> {
        self.pages.get(index).map(Vec::as_slice)
    }

    pub fn render(&self, frame: &mut Frame) {
        let header_style = MonoTextStyle::new(&FONT_8X13_BOLD, HEADER_FG);
        display::draw_header(frame, "Simple Questions", HEADER_HEIGHT, header_style);

        let body = |color| MonoTextStyle::new(BODY_FONT, color);

        let Some(entries) = self.page(self.current) else {
            display::draw_text(
                frame,
                "No questions loaded.",
                PAD as i32,
                (HEADER_HEIGHT + 8) as i32,
                body(ANSWER_FG),
            );
            return;
        };

        let counter = format!("{}/{}", self.current + 1, self.pages.len());
        let counter_w = display::text_width(BODY_FONT, &counter) as i32;
        display::draw_text(frame, &counter, WIDTH as i32 - counter_w - PAD as i32, 6, body(HEADER_FG));

        // centre the page vertically; the last entry has no trailing gap
        let total_lines: usize = entries.iter().map(Entry::lines).sum::<usize>() - 1;
        let content_h = (total_lines as u32 * LINE_HEIGHT) as i32;
        let available = (HEIGHT as u32 - HEADER_HEIGHT) as i32;
        let mut y = HEADER_HEIGHT as i32 + ((available - content_h) / 2).max(3);

        for (i, entry) in entries.iter().enumerate() {
            for line in &entry.question {
                display::draw_text(frame, line, PAD as i32, y, body(QUESTION_FG));
                y += LINE_HEIGHT as i32;
            }
            for line in &entry.answer {
                display::draw_text(frame, line, PAD as i32, y, body(ANSWER_FG));
                y += LINE_HEIGHT as i32;
            }
            if i + 1 < entries.len() {
                let sep_y = y + LINE_HEIGHT as i32 / 2;
                Line::new(
                    Point::new(PAD as i32, sep_y),
                    Point::new(WIDTH as i32 - PAD as i32, sep_y),
                )
                .into_styled(PrimitiveStyle::with_stroke(DIVIDER, 1))
                .draw(frame)
                .ok();
                y += LINE_HEIGHT as i32;
            }
        }
    }
}
