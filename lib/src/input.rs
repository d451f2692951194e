//! Button sampling and debouncing.
//!
//! Buttons are wired active-low with pull-ups: the line reads high while
//! released and low while pressed. Lines are polled, not interrupt driven,
//! and a press is reported once on its falling edge.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Polling cadence shared by the menu and every mode (50 Hz).
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Minimum spacing between two accepted presses of the same button.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
}

impl Button {
    pub const ALL: [Button; 6] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::A => "A",
            Button::B => "B",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

#[derive(Debug, Error)]
#[error("failed to read {button} line: {reason}")]
pub struct InputError {
    pub button: Button,
    pub reason: String,
}

/// Reads the instantaneous level of a button line.
pub trait LineSampler {
    fn sample(&mut self, button: Button) -> Result<Level, InputError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Released,
    Pressed,
}

#[derive(Clone, Copy, Debug)]
pub struct ButtonState {
    pub level: Level,
    pub state: DebounceState,
    pub last_accepted: Option<Instant>,
}

impl Default for ButtonState {
    fn default() -> Self {
        Self {
            level: Level::High,
            state: DebounceState::Released,
            last_accepted: None,
        }
    }
}

/// Edge detector with a per-button guard window.
pub struct Debouncer {
    buttons: Vec<(Button, ButtonState)>,
    window: Duration,
}

impl Debouncer {
    pub fn new(buttons: &[Button], window: Duration) -> Self {
        Self {
            buttons: buttons
                .iter()
                .map(|b| (*b, ButtonState::default()))
                .collect(),
            window,
        }
    }

    /// Feed one sample for `button` taken at `now`. Returns true when the
    /// sample is an accepted press.
    pub fn update(&mut self, button: Button, level: Level, now: Instant) -> bool {
        let window = self.window;
        let Some((_, st)) = self.buttons.iter_mut().find(|(b, _)| *b == button) else {
            return false;
        };

        let previous = st.level;
        st.level = level;
        match (previous, level) {
            (Level::High, Level::Low) => {
                let clear = st
                    .last_accepted
                    .is_none_or(|t| now.saturating_duration_since(t) >= window);
                if clear {
                    st.last_accepted = Some(now);
                    st.state = DebounceState::Pressed;
                }
                clear
            }
            (_, Level::High) => {
                st.state = DebounceState::Released;
                false
            }
            (Level::Low, Level::Low) => false,
        }
    }

    /// Sample every tracked line once and return the accepted presses, in
    /// the order the buttons were registered.
    pub fn poll(
        &mut self,
        lines: &mut dyn LineSampler,
        now: Instant,
    ) -> Result<Vec<Button>, InputError> {
        let mut pressed = Vec::new();
        for i in 0..self.buttons.len() {
            let button = self.buttons[i].0;
            let level = lines.sample(button)?;
            if self.update(button, level, now) {
                pressed.push(button);
            }
        }
        Ok(pressed)
    }

    pub fn state(&self, button: Button) -> Option<ButtonState> {
        self.buttons
            .iter()
            .find(|(b, _)| *b == button)
            .map(|(_, st)| *st)
    }
}
