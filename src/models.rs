use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

pub type Color = palette::rgb::LinSrgb<u8>;

/// Largest possible squared distance between two 8-bit RGB colors
pub const MAX_COLOR_DISTANCE: f64 = 195_075.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Rgb,
    Hs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Controller {
    #[validate(url)]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[validate(length(min = 1))]
    pub entity: String,
    pub color_mode: ColorMode,
    pub brightness: u8,
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    pub restore_on_stop: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_owned(),
            token: None,
            entity: "light.ldvsmart_indflex2m".to_owned(),
            color_mode: ColorMode::Rgb,
            brightness: 255,
            timeout_ms: 2000,
            restore_on_stop: false,
        }
    }
}

impl Controller {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncSettings {
    pub display: usize,
    #[validate(range(min = 1))]
    pub update_interval_ms: u64,
    /// Minimum squared RGB distance between two emitted colors
    #[validate(range(min = 0.0, max = 195075.0))]
    pub color_change_threshold: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            display: 0,
            update_interval_ms: 100,
            color_change_threshold: 32.0,
        }
    }
}

impl SyncSettings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Export {
    pub json: bool,
    pub json_path: PathBuf,
    #[validate(range(min = 1, max = 4096))]
    pub top_colors: usize,
    pub screenshot: bool,
    pub screenshot_path: PathBuf,
}

impl Default for Export {
    fn default() -> Self {
        Self {
            json: false,
            json_path: PathBuf::from("colorlog.json"),
            top_colors: 10,
            screenshot: false,
            screenshot_path: PathBuf::from("screenshot.png"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    Screen,
    File(PathBuf),
}

impl Default for CaptureSource {
    fn default() -> Self {
        Self::Screen
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capture {
    pub source: CaptureSource,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub controller: Controller,
    #[validate(nested)]
    pub sync: SyncSettings,
    #[validate(nested)]
    pub export: Export,
    pub capture: Capture,
}

impl Config {
    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let full = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&full)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        debug!(
            entity = %config.controller.entity,
            interval_ms = config.sync.update_interval_ms,
            "loaded"
        );

        Ok(config)
    }

    /// Override the access token from the configuration file, if `token` is set
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.controller.token = token;
        }

        self
    }

    /// Access token for the lighting controller, if one is configured
    pub fn token(&self) -> Option<&str> {
        self.controller
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
    }

    pub fn masked_token(&self) -> String {
        self.token().map(mask_token).unwrap_or_default()
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        let mut masked = self.clone();
        masked.controller.token = self.token().map(mask_token);
        toml::to_string_pretty(&masked)
    }
}

/// Hide most of an access token so it can be logged
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();

    if chars.len() <= 8 {
        return "********".to_owned();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
