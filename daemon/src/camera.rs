//! Still capture through an external tool, and fitting photos to the screen.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use log::{debug, info};
use slb::display::{Frame, HEIGHT, WIDTH};
use thiserror::Error;
use tokio::process::Command;

use crate::config::Config;

pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No camera at {}", .0.display())]
    Unavailable(PathBuf),
    #[error("{0}")]
    Failed(String),
    #[error("capture timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't decode photo: {0}")]
    Decode(String),
}

pub struct Photo {
    pub path: PathBuf,
    pub image: RgbImage,
}

pub struct Camera {
    device: PathBuf,
    photo_dir: PathBuf,
    command: String,
    resolution: String,
    timeout: Duration,
}

impl Camera {
    pub fn new(config: &Config) -> Self {
        Self {
            device: config.camera_device.clone(),
            photo_dir: config.photo_dir.clone(),
            command: config.capture_command.clone(),
            resolution: config.capture_resolution.clone(),
            timeout: CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.device.exists()
    }

    /// Take one photo into the photo directory and return it fitted to the
    /// screen. The full-resolution file stays on disk.
    pub async fn capture(&self) -> Result<Photo, CaptureError> {
        if !self.is_available() {
            return Err(CaptureError::Unavailable(self.device.clone()));
        }
        tokio::fs::create_dir_all(&self.photo_dir).await?;

        let name = chrono::Local::now()
            .format("photo_%Y%m%d_%H%M%S.jpg")
            .to_string();
        let path = self.photo_dir.join(name);

        let mut cmd = Command::new(&self.command);
        cmd.arg("-d")
            .arg(&self.device)
            .args(["-r", &self.resolution])
            .args(["--no-banner", "--quiet"])
            // let auto-exposure settle
            .args(["--skip", "10"])
            .args(["--jpeg", "95"])
            .arg(&path)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        debug!("running {cmd:?}");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CaptureError::Timeout(self.timeout))??;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CaptureError::Failed(if stderr.is_empty() {
                format!("{} failed", self.command)
            } else {
                stderr
            }));
        }

        let image = load_photo(&path).await?;
        info!("captured {}", path.display());
        Ok(Photo { path, image })
    }
}

/// Decode a photo from disk and fit it to the screen.
pub async fn load_photo(path: &Path) -> Result<RgbImage, CaptureError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path).map_err(|e| CaptureError::Decode(e.to_string()))?;
        Ok::<_, CaptureError>(fit(img))
    })
    .await
    .map_err(|e| CaptureError::Decode(e.to_string()))?
}

/// Centre-crop to a square, then resize to the screen.
pub fn fit(img: DynamicImage) -> RgbImage {
    let (w, h) = (img.width(), img.height());
    let side = w.min(h);
    img.crop_imm((w - side) / 2, (h - side) / 2, side, side)
        .resize_exact(WIDTH as u32, HEIGHT as u32, FilterType::Lanczos3)
        .to_rgb8()
}

/// Copy `img` into the top-left of `frame`.
pub fn draw_photo(frame: &mut Frame, img: &RgbImage) {
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = px.0;
        frame.set_pixel(Point::new(x as i32, y as i32), Rgb888::new(r, g, b));
    }
}
