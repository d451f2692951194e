use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_8X13_BOLD, FONT_10X20};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, PrimitiveStyleBuilder};
use log::info;
use slb::display::{self, BACKGROUND, Frame, HEADER_FG};
use slb::input::Button;
use tokio::time::Instant;

use super::{Exit, Mode};
use crate::runtime::Context;

const HEADER_HEIGHT: u32 = 24;
/// Holding LEFT this long leaves the mode.
const HOLD_TO_EXIT: Duration = Duration::from_secs(1);

const IDLE: Rgb888 = Rgb888::new(80, 80, 80);
const PRESSED: Rgb888 = Rgb888::new(80, 220, 80);
const ARROW: Rgb888 = Rgb888::new(100, 200, 255);
const FACE: Rgb888 = Rgb888::new(255, 180, 50);
const UNLIT: Rgb888 = Rgb888::new(40, 40, 40);

const RADIUS: i32 = 20;
const PAD_CENTRE: Point = Point::new(84, 165);
const PAD_STEP: i32 = 46;
const FACE_X: i32 = 200;

fn pad_button(button: Button) -> Option<(Point, &'static str)> {
    let offset = match button {
        Button::Up => (Point::new(0, -PAD_STEP), "^"),
        Button::Down => (Point::new(0, PAD_STEP), "v"),
        Button::Left => (Point::new(-PAD_STEP, 0), "<"),
        Button::Right => (Point::new(PAD_STEP, 0), ">"),
        Button::A | Button::B => return None,
    };
    Some((PAD_CENTRE + offset.0, offset.1))
}

fn face_button(button: Button) -> Option<Point> {
    match button {
        Button::A => Some(Point::new(FACE_X, PAD_CENTRE.y - 24)),
        Button::B => Some(Point::new(FACE_X, PAD_CENTRE.y + 24)),
        _ => None,
    }
}

/// "UP + B" style label of the held buttons, or "-" when none are.
pub fn held_label(held: &BTreeSet<Button>) -> String {
    if held.is_empty() {
        return "-".to_string();
    }
    held.iter().map(|b| b.label()).collect::<Vec<_>>().join(" + ")
}

fn draw_button(frame: &mut Frame, centre: Point, fill: Rgb888, outline: Rgb888, label: &str, fg: Rgb888) {
    let style = PrimitiveStyleBuilder::new()
        .fill_color(fill)
        .stroke_color(outline)
        .stroke_width(2)
        .build();
    Circle::with_center(centre, (RADIUS * 2) as u32)
        .into_styled(style)
        .draw(frame)
        .ok();
    let font = &FONT_6X10;
    let w = display::text_width(font, label) as i32;
    display::draw_text(
        frame,
        label,
        centre.x - w / 2,
        centre.y - font.character_size.height as i32 / 2,
        MonoTextStyle::new(font, fg),
    );
}

pub fn render(frame: &mut Frame, held: &BTreeSet<Button>) {
    display::draw_header(
        frame,
        "Button Test",
        HEADER_HEIGHT,
        MonoTextStyle::new(&FONT_8X13_BOLD, HEADER_FG),
    );

    let color = if held.is_empty() { IDLE } else { PRESSED };
    display::draw_centered(frame, &held_label(held), 52, MonoTextStyle::new(&FONT_10X20, color));

    for button in Button::ALL {
        let lit = held.contains(&button);
        if let Some((centre, arrow)) = pad_button(button) {
            let fill = if lit { PRESSED } else { UNLIT };
            draw_button(frame, centre, fill, ARROW, arrow, HEADER_FG);
        } else if let Some(centre) = face_button(button) {
            let (fill, fg) = if lit { (FACE, BACKGROUND) } else { (UNLIT, HEADER_FG) };
            draw_button(frame, centre, fill, FACE, button.label(), fg);
        }
    }
}

/// Live view of every button line, read by level instead of by edge.
#[derive(Default)]
pub struct ButtonTestMode;

#[async_trait]
impl Mode for ButtonTestMode {
    fn title(&self) -> &str {
        "Button Test"
    }

    async fn run(&mut self, ctx: &mut Context) -> Result<Exit> {
        let mut shown: Option<BTreeSet<Button>> = None;
        let mut left_since: Option<Instant> = None;

        while ctx.tick().await {
            let held = ctx.input.held().context("failed to read buttons")?;

            if held.contains(&Button::Left) {
                let since = *left_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= HOLD_TO_EXIT {
                    return Ok(Exit::Back);
                }
            } else {
                left_since = None;
            }

            if shown.as_ref() != Some(&held) {
                info!("held: {}", held_label(&held));
                ctx.show(|frame| render(frame, &held))?;
                shown = Some(held);
            }
        }
        Ok(Exit::Shutdown)
    }
}
