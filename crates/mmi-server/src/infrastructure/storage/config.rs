//! TOML-based configuration for the MMI service.
//!
//! The service reads one file, by default `/etc/mmi/server.toml`, whose path
//! can be overridden on the command line.  A missing file is not an error:
//! every field has a default, so the service runs with no configuration.
//!
//! ```toml
//! [server]
//! socket_path = "/run/mmi/mmi.sock"
//! log_level = "debug"
//!
//! [pointer]
//! speed = 7
//! natural_scroll = true
//!
//! [handlers]
//! max_interceptors = 8
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  Whole sections
//! carry `#[serde(default)]` so a file containing only `[pointer]` is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::transform::{PrimaryButton, RightClickType};
use crate::transform::PointerSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub handlers: HandlerLimits,
    #[serde(default)]
    pub anr: AnrConfig,
    #[serde(default)]
    pub plugin: PluginConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Listening socket clients connect to.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Session socket sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    /// Send/receive buffer for sessions of system services.
    #[serde(default = "default_native_buffer_size")]
    pub native_buffer_size: usize,
    /// Send/receive buffer for every other session.
    #[serde(default = "default_buffer_size")]
    pub default_buffer_size: usize,
    /// Reads performed per readiness wake-up before yielding.
    #[serde(default = "default_max_recv_limit")]
    pub max_recv_limit: usize,
}

/// Pointer behaviour preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointerConfig {
    /// Mouse pointer speed, 1 (slowest) to 11.
    #[serde(default = "default_speed")]
    pub speed: i32,
    /// Touchpad pointer speed, 1 (slowest) to 11.
    #[serde(default = "default_speed")]
    pub touchpad_speed: i32,
    #[serde(default)]
    pub primary_button: PrimaryButton,
    #[serde(default)]
    pub touchpad_right_click: RightClickType,
    /// Rows scrolled per wheel notch.
    #[serde(default = "default_scroll_rows")]
    pub scroll_rows: i32,
    /// Invert two-finger touchpad scrolling.
    #[serde(default)]
    pub natural_scroll: bool,
    /// Idle time after the last scroll sample before the gesture ends.
    #[serde(default = "default_axis_end_timeout_ms")]
    pub axis_end_timeout_ms: u64,
}

/// Upper bounds on registered handlers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandlerLimits {
    #[serde(default = "default_max_handlers")]
    pub max_interceptors: usize,
    #[serde(default = "default_max_handlers")]
    pub max_monitors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnrConfig {
    /// Time a client has to acknowledge an event before it is flagged.
    #[serde(default = "default_ui_timeout_ms")]
    pub ui_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PluginConfig {
    /// Name of the touchscreen knuckle classifier; absent means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knuckle_classifier: Option<String>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/mmi/mmi.sock")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_native_buffer_size() -> usize {
    64 * 1024
}
fn default_buffer_size() -> usize {
    32 * 1024
}
fn default_max_recv_limit() -> usize {
    5
}
fn default_speed() -> i32 {
    5
}
fn default_scroll_rows() -> i32 {
    3
}
fn default_axis_end_timeout_ms() -> u64 {
    100
}
fn default_max_handlers() -> usize {
    16
}
fn default_ui_timeout_ms() -> u64 {
    5000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_level: default_log_level(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            native_buffer_size: default_native_buffer_size(),
            default_buffer_size: default_buffer_size(),
            max_recv_limit: default_max_recv_limit(),
        }
    }
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            touchpad_speed: default_speed(),
            primary_button: PrimaryButton::default(),
            touchpad_right_click: RightClickType::default(),
            scroll_rows: default_scroll_rows(),
            natural_scroll: false,
            axis_end_timeout_ms: default_axis_end_timeout_ms(),
        }
    }
}

impl PointerConfig {
    /// Settings handed to the transform processors.  Speeds are clamped to 1..=11.
    pub fn to_settings(&self) -> PointerSettings {
        PointerSettings {
            mouse_speed: self.speed.clamp(1, 11),
            touchpad_speed: self.touchpad_speed.clamp(1, 11),
            primary_button: self.primary_button,
            right_click: self.touchpad_right_click,
            scroll_rows: self.scroll_rows,
            natural_scroll: self.natural_scroll,
            axis_end_timeout: Duration::from_millis(self.axis_end_timeout_ms),
        }
    }
}

impl Default for HandlerLimits {
    fn default() -> Self {
        Self {
            max_interceptors: default_max_handlers(),
            max_monitors: default_max_handlers(),
        }
    }
}

impl Default for AnrConfig {
    fn default() -> Self {
        Self {
            ui_timeout_ms: default_ui_timeout_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Path used when no `--config` argument is given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/mmi/server.toml")
}

/// Loads `ServerConfig` from `path`, returning `ServerConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path` as pretty TOML, creating parent directories.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
