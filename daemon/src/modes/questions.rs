use std::path::Path;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{info, warn};
use slb::input::Button;
use slb::pages::{PageSet, QaPair};
use slb::state::StateStore;

use super::{Exit, Mode};
use crate::runtime::Context;

const BUILTIN: [(&str, &str); 10] = [
    (
        "What is Python?",
        "High-level interpreted programming language known for readability.",
    ),
    (
        "What is GPIO?",
        "General Purpose Input/Output - programmable pins on the Pi.",
    ),
    (
        "What is SPI?",
        "Serial Peripheral Interface - fast 4-wire communication protocol.",
    ),
    (
        "What is I2C?",
        "Inter-Integrated Circuit - 2-wire protocol for short-distance comms.",
    ),
    (
        "What is RAM?",
        "Random Access Memory - fast volatile storage used while running.",
    ),
    (
        "What is a CPU?",
        "Central Processing Unit - executes program instructions.",
    ),
    (
        "What is SSH?",
        "Secure Shell - encrypted protocol for remote terminal access.",
    ),
    (
        "What is Linux?",
        "Open-source Unix-like OS kernel used by Raspberry Pi OS.",
    ),
    (
        "What is PWM?",
        "Pulse Width Modulation - simulates analog output via digital pin.",
    ),
    (
        "What is an OS?",
        "Operating System - manages hardware and runs applications.",
    ),
];

pub fn builtin_questions() -> Vec<QaPair> {
    BUILTIN.iter().map(|(q, a)| QaPair::new(*q, *a)).collect()
}

/// Questions from a JSON array of `{question, answer}` objects, falling back
/// to the built-in set when no file is configured or it can't be used.
pub async fn load_questions(path: Option<&Path>) -> Vec<QaPair> {
    let Some(path) = path else {
        return builtin_questions();
    };
    let parsed = tokio::fs::read(path)
        .await
        .map_err(anyhow::Error::from)
        .and_then(|bytes| serde_json::from_slice::<Vec<QaPair>>(&bytes).map_err(Into::into));
    match parsed {
        Ok(pairs) => {
            info!("loaded {} questions from {}", pairs.len(), path.display());
            pairs
        }
        Err(e) => {
            warn!(
                "couldn't load questions from {}, using built-ins: {e}",
                path.display()
            );
            builtin_questions()
        }
    }
}

pub struct QuestionsMode {
    pages: PageSet,
}

impl QuestionsMode {
    pub fn new(pairs: &[QaPair], saved_page: Option<usize>) -> Self {
        let mut pages = PageSet::for_screen(pairs);
        if let Some(page) = saved_page {
            pages.set_page(page);
        }
        Self { pages }
    }

    pub fn current_page(&self) -> usize {
        self.pages.current_page()
    }

    fn draw(&self, ctx: &mut Context) -> Result<()> {
        ctx.show(|frame| self.pages.render(frame))
    }

    async fn save(&self, store: &StateStore) {
        let page = self.pages.current_page();
        if let Err(e) = store.update(|s| s.questions_page = Some(page)).await {
            warn!("failed to save question page: {e}");
        }
    }
}

#[async_trait]
impl Mode for QuestionsMode {
    fn title(&self) -> &str {
        "Simple Questions"
    }

    async fn run(&mut self, ctx: &mut Context) -> Result<Exit> {
        self.draw(ctx)?;

        while ctx.tick().await {
            let presses = ctx.input.presses().context("failed to poll buttons")?;
            let mut moved = false;
            for button in presses {
                match button {
                    Button::Up => moved |= self.pages.prev_page(),
                    Button::Down | Button::A => moved |= self.pages.next_page(),
                    Button::Left => {
                        self.save(&ctx.store).await;
                        return Ok(Exit::Back);
                    }
                    _ => {}
                }
            }
            if moved {
                self.draw(ctx)?;
            }
        }

        self.save(&ctx.store).await;
        Ok(Exit::Shutdown)
    }
}
