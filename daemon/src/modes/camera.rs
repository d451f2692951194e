use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_7X13, FONT_8X13_BOLD};
use embedded_graphics::pixelcolor::Rgb888;
use image::RgbImage;
use log::{error, info, warn};
use slb::display::{self, ERROR_FG, Frame, HEADER_FG, HEIGHT, MESSAGE_FG, WIDTH};
use slb::input::Button;
use slb::pages::wrap;
use slb::state::StateStore;
use tokio::time::Instant;

use super::{Exit, Mode};
use crate::camera::{self, Camera};
use crate::runtime::Context;
use crate::upload::{StartOutcome, UploadHandle, UploadProgress};

const TITLE: &str = "AI Camera";
const HEADER_HEIGHT: u32 = 22;
const STATUS_HEIGHT: u32 = 20;
const BAR_WIDTH: u32 = 120;
/// Redraw cadence while an upload is running.
const LIVE_REFRESH: Duration = Duration::from_millis(500);

const STATUS_BG: Rgb888 = Rgb888::new(0, 0, 0);
const BAR_TRACK: Rgb888 = Rgb888::new(45, 45, 45);
const BAR_FILL: Rgb888 = Rgb888::new(0, 150, 75);

enum View {
    Idle,
    Photo(RgbImage),
    Error(String),
}

pub struct CameraMode {
    camera: Camera,
    uploads: UploadHandle,
    view: View,
    notice: Option<String>,
    restored: bool,
}

impl CameraMode {
    pub fn new(camera: Camera, uploads: UploadHandle) -> Self {
        Self {
            camera,
            uploads,
            view: View::Idle,
            notice: None,
            restored: false,
        }
    }

    /// Bring back the last photo from an earlier session, if its file is
    /// still there.
    async fn restore(&mut self, store: &StateStore) {
        self.restored = true;
        let Some(last) = store.load().await.ai_camera_last_photo else {
            return;
        };
        let path = PathBuf::from(last);
        if !path.exists() {
            return;
        }
        match camera::load_photo(&path).await {
            Ok(image) => self.view = View::Photo(image),
            Err(e) => warn!("couldn't restore {}: {e}", path.display()),
        }
    }

    async fn capture(&mut self, ctx: &mut Context) -> Result<()> {
        ctx.show(|frame| display::render_message(frame, TITLE, "Capturing..."))?;
        match self.camera.capture().await {
            Ok(photo) => {
                let last = photo.path.to_string_lossy().into_owned();
                if let Err(e) = ctx
                    .store
                    .update(|s| s.ai_camera_last_photo = Some(last))
                    .await
                {
                    warn!("failed to save last photo: {e}");
                }
                self.view = View::Photo(photo.image);
                self.notice = None;
            }
            Err(e) => {
                error!("camera error: {e}");
                self.view = View::Error(e.to_string());
            }
        }
        Ok(())
    }

    async fn start_upload(&mut self) {
        self.notice = match self.uploads.start().await {
            StartOutcome::Started { total } => {
                info!("upload of {total} photo(s) started");
                None
            }
            StartOutcome::AlreadyRunning => None,
            StartOutcome::NothingPending => Some("Nothing to upload".to_string()),
            StartOutcome::Disabled => Some("Upload not configured".to_string()),
        };
    }

    async fn draw(&self, ctx: &mut Context) -> Result<UploadProgress> {
        let progress = self.uploads.snapshot().await;
        ctx.show(|frame| self.render(frame, &progress))?;
        Ok(progress)
    }

    fn render(&self, frame: &mut Frame, progress: &UploadProgress) {
        match &self.view {
            View::Idle => display::render_message(frame, TITLE, "A: capture  B: upload"),
            View::Photo(image) => camera::draw_photo(frame, image),
            View::Error(message) => render_error(frame, message),
        }
        render_status(frame, progress, self.notice.as_deref());
    }
}

fn render_error(frame: &mut Frame, message: &str) {
    display::draw_header(
        frame,
        TITLE,
        HEADER_HEIGHT,
        MonoTextStyle::new(&FONT_8X13_BOLD, HEADER_FG),
    );
    let top = HEADER_HEIGHT as i32;
    display::draw_text(
        frame,
        "Camera error:",
        6,
        top + 8,
        MonoTextStyle::new(&FONT_7X13, ERROR_FG),
    );
    let body = MonoTextStyle::new(&FONT_6X10, MESSAGE_FG);
    let width = (WIDTH - 12) / FONT_6X10.character_size.width as usize;
    for (i, line) in wrap(message, "", width).iter().enumerate() {
        display::draw_text(frame, line, 6, top + 26 + i as i32 * 12, body);
    }
}

/// Bottom strip: a progress bar while a job runs, the result of the last
/// job afterwards, or a one-off notice.
fn render_status(frame: &mut Frame, progress: &UploadProgress, notice: Option<&str>) {
    let text = if progress.in_progress {
        format!("Uploading {}/{}", progress.done + progress.failed, progress.total)
    } else if let Some(notice) = notice {
        notice.to_string()
    } else if progress.total > 0 {
        format!("Sent {}/{}, {} failed", progress.done, progress.total, progress.failed)
    } else {
        return;
    };

    let top = (HEIGHT as u32 - STATUS_HEIGHT) as i32;
    display::fill_rect(frame, 0, top, WIDTH as u32, STATUS_HEIGHT, STATUS_BG);
    let style = MonoTextStyle::new(&FONT_6X10, MESSAGE_FG);
    display::draw_text(frame, &text, 4, top + 5, style);

    if progress.in_progress {
        let x = (WIDTH as u32 - BAR_WIDTH - 4) as i32;
        display::fill_rect(frame, x, top + 5, BAR_WIDTH, 10, BAR_TRACK);
        display::fill_rect(frame, x, top + 5, progress.bar_fill(BAR_WIDTH), 10, BAR_FILL);
    }
}

#[async_trait]
impl Mode for CameraMode {
    fn title(&self) -> &str {
        TITLE
    }

    async fn run(&mut self, ctx: &mut Context) -> Result<Exit> {
        if !self.restored {
            self.restore(&ctx.store).await;
        }
        let mut shown = self.draw(ctx).await?;
        let mut last_draw = Instant::now();

        while ctx.tick().await {
            let presses = ctx.input.presses().context("failed to poll buttons")?;
            let mut dirty = false;
            for button in presses {
                match button {
                    Button::Left => return Ok(Exit::Back),
                    Button::A => {
                        self.capture(ctx).await?;
                        dirty = true;
                    }
                    Button::B => {
                        self.start_upload().await;
                        dirty = true;
                    }
                    _ => {}
                }
            }

            let live = shown.in_progress && last_draw.elapsed() >= LIVE_REFRESH;
            let finished = shown.in_progress && !self.uploads.snapshot().await.in_progress;
            if dirty || live || finished {
                shown = self.draw(ctx).await?;
                last_draw = Instant::now();
            }
        }
        Ok(Exit::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use tokio::sync::Semaphore;
    use tokio_util::task::TaskTracker;

    use super::*;
    use crate::config::Config;
    use crate::runtime::testing::context;
    use crate::upload::{UploadError, Uploader};

    struct Gate(Semaphore);

    #[async_trait]
    impl Uploader for Gate {
        async fn upload(&self, _name: &str, _body: Vec<u8>) -> Result<(), UploadError> {
            self.0.acquire().await.unwrap().forget();
            Ok(())
        }
    }

    struct Setup {
        dir: tempfile::TempDir,
        store: StateStore,
        config: Config,
    }

    fn setup() -> Setup {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let config = Config {
            camera_device: dir.path().join("video0"),
            photo_dir: dir.path().join("photos"),
            ..Config::default()
        };
        Setup { dir, store, config }
    }

    fn mode(s: &Setup, uploader: Option<Arc<dyn Uploader>>, tracker: &TaskTracker) -> CameraMode {
        let uploads = UploadHandle::new(
            uploader,
            s.store.clone(),
            s.config.photo_dir.clone(),
            BTreeSet::new(),
            tracker.clone(),
        );
        CameraMode::new(Camera::new(&s.config), uploads)
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_camera_shows_error() {
        let s = setup();
        let tracker = TaskTracker::new();
        let (mut ctx, log) = context(|sc| sc.press(Button::A).press(Button::Left), s.store.clone());
        let mut mode = mode(&s, None, &tracker);

        assert_eq!(mode.run(&mut ctx).await.unwrap(), Exit::Back);
        // idle, "Capturing...", error
        assert_eq!(log.count(), 3);
        assert!(log.last_contains((255, 80, 80)));
        assert!(matches!(mode.view, View::Error(ref m) if m.starts_with("No camera at")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_without_endpoint_shows_notice() {
        let s = setup();
        let tracker = TaskTracker::new();
        let (mut ctx, log) = context(|sc| sc.press(Button::B).press(Button::Left), s.store.clone());
        let mut mode = mode(&s, None, &tracker);

        assert_eq!(mode.run(&mut ctx).await.unwrap(), Exit::Back);
        assert_eq!(log.count(), 2);
        assert_eq!(mode.notice.as_deref(), Some("Upload not configured"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_redraws_while_running() {
        let s = setup();
        tokio::fs::create_dir_all(&s.config.photo_dir).await.unwrap();
        for name in ["a.jpg", "b.jpg"] {
            tokio::fs::write(s.config.photo_dir.join(name), b"x").await.unwrap();
        }
        let tracker = TaskTracker::new();
        let gate = Arc::new(Gate(Semaphore::new(0)));
        // start, then watch for two seconds
        let (mut ctx, log) = context(|sc| sc.press(Button::B).idle(100), s.store.clone());
        let mut mode = mode(&s, Some(gate.clone()), &tracker);

        assert_eq!(mode.run(&mut ctx).await.unwrap(), Exit::Shutdown);
        let progress = mode.uploads.snapshot().await;
        assert!(progress.in_progress);
        // the bar track is on screen and the view kept refreshing
        assert!(log.last_contains((45, 45, 45)));
        assert!(log.count() >= 4, "only {} frames", log.count());

        gate.0.add_permits(2);
        tracker.close();
        tracker.wait().await;
        assert_eq!(mode.uploads.snapshot().await.done, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_photo_restored_on_entry() {
        let s = setup();
        let path = s.dir.path().join("photo_old.jpg");
        RgbImage::from_pixel(64, 48, image::Rgb([200, 30, 30]))
            .save(&path)
            .unwrap();
        s.store
            .update(|st| st.ai_camera_last_photo = Some(path.to_string_lossy().into_owned()))
            .await
            .unwrap();

        let tracker = TaskTracker::new();
        let (mut ctx, _log) = context(|sc| sc.press(Button::Left), s.store.clone());
        let mut mode = mode(&s, None, &tracker);
        mode.run(&mut ctx).await.unwrap();
        assert!(matches!(mode.view, View::Photo(_)));
    }

    #[test]
    fn test_status_bar_fill() {
        let mut frame = display::new_frame();
        let progress = UploadProgress {
            in_progress: true,
            total: 2,
            done: 1,
            failed: 0,
        };
        render_status(&mut frame, &progress, None);
        let data = frame.data();
        let px = |x: usize, y: usize| {
            let i = (y * WIDTH + x) * 3;
            (data[i], data[i + 1], data[i + 2])
        };
        let x0 = WIDTH - BAR_WIDTH as usize - 4;
        let y = HEIGHT - STATUS_HEIGHT as usize + 8;
        assert_eq!(px(x0 + 10, y), (0, 150, 75));
        assert_eq!(px(x0 + 100, y), (45, 45, 45));
    }
}
