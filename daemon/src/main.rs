use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_7X13;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use log::{error, info, warn};
use slb::display::{self, HEIGHT, Surface};
use slb::state::StateStore;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use slb_daemon::camera::Camera;
use slb_daemon::config::Config;
use slb_daemon::hardware::{DisplaySession, GpioButtons};
use slb_daemon::modes::{ButtonTestMode, CameraMode, Mode, QuestionsMode, questions};
use slb_daemon::runtime::{Context, Input, Runtime};
use slb_daemon::upload::{HttpUploader, UploadHandle, Uploader};

#[derive(Parser)]
#[command(name = "slb-daemon", about = "Menu UI for the SLB 240x240 handheld")]
struct Args {
    /// Path to the TOML config file
    #[arg(default_value = "/etc/slb/config.toml")]
    config: PathBuf,

    /// Show one line of text on the display and exit
    #[arg(long, value_name = "TEXT")]
    print: Option<String>,
}

fn run_shutdown_listener(task_tracker: &TaskTracker, shutdown_token: CancellationToken) {
    task_tracker.spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!("couldn't install SIGTERM handler: {e}");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = term.recv() => info!("received SIGTERM"),
            _ = shutdown_token.cancelled() => return,
        }
        shutdown_token.cancel();
    });
}

fn print_line(session: &mut DisplaySession, text: &str) -> Result<()> {
    let mut frame = display::new_frame();
    frame.clear(Rgb888::BLACK).ok();
    display::draw_centered(
        &mut frame,
        text,
        HEIGHT as i32 / 2 - 8,
        MonoTextStyle::new(&FONT_7X13, Rgb888::WHITE),
    );
    session.blit(&frame).context("failed to show text")
}

async fn build_modes(
    config: &Config,
    store: &StateStore,
    task_tracker: &TaskTracker,
) -> Result<Vec<Box<dyn Mode>>> {
    let state = store.load().await;

    let pairs = questions::load_questions(config.questions_path.as_deref()).await;
    let questions = QuestionsMode::new(&pairs, state.questions_page);

    let uploader: Option<Arc<dyn Uploader>> = match config.upload_url()? {
        Some(url) => {
            info!("uploads go to {url}");
            Some(Arc::new(HttpUploader::new(
                url,
                config.upload_filename_header.clone(),
            )?))
        }
        None => {
            info!("no upload_url configured, uploads disabled");
            None
        }
    };
    let uploads = UploadHandle::new(
        uploader,
        store.clone(),
        config.photo_dir.clone(),
        state.ai_camera_sent,
        task_tracker.clone(),
    );
    let camera = CameraMode::new(Camera::new(config), uploads);

    let modes: Vec<Box<dyn Mode>> = vec![
        Box::new(questions),
        Box::new(camera),
        Box::new(ButtonTestMode),
    ];
    Ok(modes)
}

async fn run(args: Args) -> Result<()> {
    let loaded = Config::load(&args.config).await?;
    let found = loaded.is_some();
    let config = loaded.unwrap_or_default();
    slb::init_logging(config.log_filter()?);
    if !found {
        warn!("config file {} not found, using defaults", args.config.display());
    }

    let mut session = DisplaySession::open(&config)?;
    if let Some(text) = args.print {
        let result = print_line(&mut session, &text);
        session.close();
        return result;
    }

    let task_tracker = TaskTracker::new();
    let shutdown_token = CancellationToken::new();
    run_shutdown_listener(&task_tracker, shutdown_token.clone());

    let store = StateStore::new(config.state_path.clone());
    let modes = build_modes(&config, &store, &task_tracker).await?;
    let buttons = GpioButtons::open(&config.buttons).context("failed to open button lines")?;
    let input = Input::new(Box::new(buttons), config.debounce_window());
    let ctx = Context::new(Box::new(session), input, store, shutdown_token.clone());

    let mut runtime = Runtime::new(ctx, modes)?;
    let result = runtime.run().await;
    if let Err(e) = &result {
        error!("UI loop failed: {e:#}");
    }
    // releases the panel and the button lines
    drop(runtime);

    shutdown_token.cancel();
    task_tracker.close();
    info!("waiting for background tasks");
    task_tracker.wait().await;
    result
}

fn main() -> Result<()> {
    let args = Args::parse();
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(args))
}
