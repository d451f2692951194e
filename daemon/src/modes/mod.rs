//! Full-screen modes reachable from the main menu.
//!
//! A mode owns the input loop while it runs and hands it back with an
//! [`Exit`]. Modes are built once and reused, so whatever they keep in memory
//! survives between visits.

use anyhow::Result;
use async_trait::async_trait;

use crate::runtime::Context;

pub mod buttons;
pub mod camera;
pub mod questions;

pub use buttons::ButtonTestMode;
pub use camera::CameraMode;
pub use questions::QuestionsMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exit {
    /// Return to the menu.
    Back,
    /// Shutdown was requested while the mode ran.
    Shutdown,
}

#[async_trait]
pub trait Mode: Send {
    /// Label of the menu entry.
    fn title(&self) -> &str;

    async fn run(&mut self, ctx: &mut Context) -> Result<Exit>;
}
