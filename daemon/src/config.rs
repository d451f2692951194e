use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use slb::input::Button;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid upload_url {url:?}: {reason}")]
    UploadUrl { url: String, reason: String },
    #[error("invalid log_level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub spi_device: String,
    pub spi_speed_hz: u32,
    pub dc_pin: u64,
    pub rst_pin: u64,
    pub madctl: u8,
    pub buttons: ButtonPins,
    pub debounce_ms: u64,
    pub log_level: String,
    pub state_path: PathBuf,
    pub photo_dir: PathBuf,
    pub camera_device: PathBuf,
    pub capture_command: String,
    pub capture_resolution: String,
    pub upload_url: Option<String>,
    pub upload_filename_header: String,
    pub questions_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spi_device: "/dev/spidev0.0".into(),
            spi_speed_hz: 4_000_000,
            dc_pin: 24,
            rst_pin: 25,
            madctl: slb::st7789::DEFAULT_MADCTL,
            buttons: ButtonPins::default(),
            debounce_ms: slb::input::DEBOUNCE_WINDOW.as_millis() as u64,
            log_level: "info".into(),
            state_path: "/home/pi/slb/state.json".into(),
            photo_dir: "/home/pi/slb/photos".into(),
            camera_device: "/dev/video0".into(),
            capture_command: "fswebcam".into(),
            capture_resolution: "3264x2448".into(),
            upload_url: None,
            upload_filename_header: "X-Filename".into(),
            questions_path: None,
        }
    }
}

/// BCM line numbers of the six buttons.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ButtonPins {
    pub up: u64,
    pub down: u64,
    pub left: u64,
    pub right: u64,
    pub a: u64,
    pub b: u64,
}

impl Default for ButtonPins {
    fn default() -> Self {
        Self {
            up: 17,
            down: 27,
            left: 22,
            right: 23,
            a: 5,
            b: 6,
        }
    }
}

impl ButtonPins {
    pub fn pin(&self, button: Button) -> u64 {
        match button {
            Button::Up => self.up,
            Button::Down => self.down,
            Button::Left => self.left,
            Button::Right => self.right,
            Button::A => self.a,
            Button::B => self.b,
        }
    }
}

impl Config {
    /// Load from `path`. `None` means there is no file at `path`; callers
    /// fall back to the defaults.
    pub async fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = Self::parse(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(Some(config))
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.log_filter()?;
        self.upload_url()?;
        Ok(())
    }

    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// The upload endpoint, or `None` when uploads are not configured. Only
    /// http and https URLs are accepted.
    pub fn upload_url(&self) -> Result<Option<url::Url>, ConfigError> {
        let Some(raw) = self.upload_url.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let url = url::Url::parse(raw).map_err(|e| ConfigError::UploadUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UploadUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(Some(url))
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
