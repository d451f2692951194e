//! The top-level menu loop and the context lent to modes.

use std::collections::BTreeSet;

use anyhow::{Context as _, Result};
use log::info;
use slb::display::{self, Frame, Surface};
use slb::input::{Button, Debouncer, InputError, Level, LineSampler, POLL_INTERVAL};
use slb::menu::Menu;
use slb::state::StateStore;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::modes::{Exit, Mode};

pub const MENU_TITLE: &str = "SLB";

/// Debounced button events plus raw level reads over one set of lines.
pub struct Input {
    lines: Box<dyn LineSampler + Send>,
    debouncer: Debouncer,
}

impl Input {
    pub fn new(lines: Box<dyn LineSampler + Send>, window: std::time::Duration) -> Self {
        Self {
            lines,
            debouncer: Debouncer::new(&Button::ALL, window),
        }
    }

    /// Accepted presses since the previous call.
    pub fn presses(&mut self) -> Result<Vec<Button>, InputError> {
        let now = Instant::now().into_std();
        self.debouncer.poll(self.lines.as_mut(), now)
    }

    /// Buttons held down right now. The debouncer still sees the samples so
    /// edge detection picks up where this leaves off.
    pub fn held(&mut self) -> Result<BTreeSet<Button>, InputError> {
        let now = Instant::now().into_std();
        let mut held = BTreeSet::new();
        for button in Button::ALL {
            let level = self.lines.sample(button)?;
            self.debouncer.update(button, level, now);
            if level == Level::Low {
                held.insert(button);
            }
        }
        Ok(held)
    }
}

/// Everything a mode may touch. There are no globals; the runtime owns this
/// and lends it out for the duration of one mode run.
pub struct Context {
    pub display: Box<dyn Surface + Send>,
    pub input: Input,
    pub store: StateStore,
    pub shutdown: CancellationToken,
    frame: Box<Frame>,
    ticker: Interval,
}

impl Context {
    pub fn new(
        display: Box<dyn Surface + Send>,
        input: Input,
        store: StateStore,
        shutdown: CancellationToken,
    ) -> Self {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            display,
            input,
            store,
            shutdown,
            frame: display::new_frame(),
            ticker,
        }
    }

    /// Wait for the next poll tick. Returns false once shutdown was requested.
    pub async fn tick(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = self.ticker.tick() => true,
        }
    }

    /// Draw into the shared frame and push it to the panel.
    pub fn show(&mut self, draw: impl FnOnce(&mut Frame)) -> Result<()> {
        draw(&mut self.frame);
        self.display
            .blit(&self.frame)
            .context("failed to push frame to display")
    }
}

pub struct Runtime {
    ctx: Context,
    menu: Menu<usize>,
    modes: Vec<Box<dyn Mode>>,
}

impl Runtime {
    pub fn new(ctx: Context, modes: Vec<Box<dyn Mode>>) -> Result<Self> {
        let entries = modes
            .iter()
            .enumerate()
            .map(|(i, mode)| (mode.title().to_string(), i))
            .collect();
        let menu = Menu::new(MENU_TITLE, entries).context("failed to build the main menu")?;
        Ok(Self { ctx, menu, modes })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run the menu until shutdown. Display and input failures end the loop
    /// with an error.
    pub async fn run(&mut self) -> Result<()> {
        self.draw_menu()?;
        info!("menu ready");

        while self.ctx.tick().await {
            let presses = self.ctx.input.presses().context("failed to poll buttons")?;
            let mut dirty = false;
            for button in presses {
                match button {
                    Button::Up => {
                        self.menu.up();
                        dirty = true;
                    }
                    Button::Down | Button::A => {
                        self.menu.down();
                        dirty = true;
                    }
                    Button::B => {
                        let (label, &index) = self.menu.select();
                        info!("entering {label}");
                        let exit = self.modes[index].run(&mut self.ctx).await?;
                        if exit == Exit::Shutdown {
                            return Ok(());
                        }
                        info!("back from {}", self.modes[index].title());
                        dirty = true;
                        // presses sampled before the mode ran are stale
                        break;
                    }
                    Button::Left | Button::Right => {}
                }
            }
            if dirty {
                self.draw_menu()?;
            }
        }
        Ok(())
    }

    fn draw_menu(&mut self) -> Result<()> {
        let menu = &self.menu;
        self.ctx.show(|frame| menu.render(frame))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::testing::context;
    use super::*;

    struct Probe {
        title: &'static str,
        runs: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Mode for Probe {
        fn title(&self) -> &str {
            self.title
        }

        async fn run(&mut self, _ctx: &mut Context) -> Result<Exit> {
            self.runs.lock().unwrap().push(self.title);
            Ok(Exit::Back)
        }
    }

    fn probes(runs: &Arc<Mutex<Vec<&'static str>>>) -> Vec<Box<dyn Mode>> {
        ["one", "two", "three"]
            .into_iter()
            .map(|title| {
                Box::new(Probe {
                    title,
                    runs: runs.clone(),
                }) as Box<dyn Mode>
            })
            .collect()
    }

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_dispatches_highlighted_mode() {
        let (_dir, store) = store();
        let (ctx, log) = context(
            |s| {
                s.press(Button::Down)
                    .press(Button::B)
                    .press(Button::A)
                    .press(Button::B)
                    .press(Button::Up)
                    .press(Button::Up)
                    .press(Button::B)
            },
            store,
        );
        let runs = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = Runtime::new(ctx, probes(&runs)).unwrap();
        runtime.run().await.unwrap();

        assert_eq!(*runs.lock().unwrap(), vec!["two", "three", "one"]);
        // initial draw, then one per navigation or return
        assert_eq!(log.count(), 1 + 7);
        assert!(runtime.context().shutdown.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounce_inside_window_is_one_step() {
        let (_dir, store) = store();
        let (ctx, _log) = context(
            |s| {
                s.hold(Button::Down, 1)
                    .idle(2)
                    .hold(Button::Down, 1)
                    .idle(12)
                    .press(Button::B)
            },
            store,
        );
        let runs = Arc::new(Mutex::new(Vec::new()));
        let mut runtime = Runtime::new(ctx, probes(&runs)).unwrap();
        runtime.run().await.unwrap();
        assert_eq!(*runs.lock().unwrap(), vec!["two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_modes_is_an_error() {
        let (_dir, store) = store();
        let (ctx, _log) = context(|s| s, store);
        assert!(Runtime::new(ctx, Vec::new()).is_err());
    }
}
