//! Configuration types for the agentrix client.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Dimensions, Error, Theme};

/// Client configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Server connection settings
    pub server: ServerSettings,
    /// Terminal widget settings
    pub terminal: TerminalSettings,
    /// Output reconciliation settings
    pub reconciler: ReconcilerSettings,
    /// Idle tracking settings
    pub activity: ActivitySettings,
    /// Render adapter settings
    pub render: RenderSettings,
    /// Input forwarding settings
    pub input: InputSettings,
    /// Attachment manager settings
    pub manager: ManagerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl ClientConfig {
    /// Default config location: `<config dir>/agentrix/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agentrix").join("config.yaml"))
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the built-in defaults; an explicitly
    /// named file must exist.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        let base = self.server.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must be an http(s) URL, got '{}'",
                self.server.base_url
            )));
        }

        if self.terminal.rows == 0 || self.terminal.cols == 0 {
            return Err(Error::Config("terminal dimensions must be > 0".to_string()));
        }

        let ratio = self.reconciler.printable_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::Config(
                "reconciler.printable_ratio must be in (0, 1]".to_string(),
            ));
        }

        if self.activity.poll_interval_ms == 0 {
            return Err(Error::Config(
                "activity.poll_interval_ms must be > 0".to_string(),
            ));
        }

        if self.manager.max_attachments == 0 {
            return Err(Error::Config(
                "manager.max_attachments must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// HTTP base URL of the dashboard server
    pub base_url: String,
    /// Timeout for REST calls in milliseconds
    pub request_timeout_ms: u64,
    /// Timeout for the socket handshake in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3414".to_string(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl ServerSettings {
    /// REST timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Handshake timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Terminal widget settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerminalSettings {
    /// Rows of the off-screen emulator
    pub rows: u16,
    /// Columns of the off-screen emulator
    pub cols: u16,
    /// Scrollback buffer lines
    pub scrollback_lines: usize,
    /// Colors reapplied after every reset
    pub theme: Theme,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 80,
            scrollback_lines: 10_000,
            theme: Theme::default(),
        }
    }
}

impl TerminalSettings {
    /// Configured size as dimensions.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.rows, self.cols)
    }
}

/// How output is handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Every snapshot and delta is paintable immediately
    #[default]
    Direct,
    /// Output is buffered until readiness and leading control noise is dropped
    Gated,
}

impl std::str::FromStr for ReconcileMode {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(ReconcileMode::Direct),
            "gated" => Ok(ReconcileMode::Gated),
            other => Err(Error::InvalidInput(format!("Unknown mode: {other}"))),
        }
    }
}

/// Output reconciliation settings.
///
/// The two thresholds drive the visible-glyph heuristic used in gated mode.
/// They are tuned for shells that emit a burst of cursor/mode sequences
/// before the first prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Reconciliation mode
    pub mode: ReconcileMode,
    /// Cumulative printable bytes that mark the stream as visible
    pub min_printable_bytes: usize,
    /// Printable share of a single delta that marks the stream as visible
    pub printable_ratio: f64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            mode: ReconcileMode::Direct,
            min_printable_bytes: 2,
            printable_ratio: 0.3,
        }
    }
}

/// Idle tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActivitySettings {
    /// Slack between acknowledgement time and later reported activity
    pub ack_tolerance_ms: i64,
    /// Interval between session-list polls
    pub poll_interval_ms: u64,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            ack_tolerance_ms: 1_500,
            poll_interval_ms: 5_000,
        }
    }
}

impl ActivitySettings {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Render adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// Delay before the second (settled) resize emission
    pub resize_settle_ms: u64,
    /// Frame tick used for the first resize emission
    pub frame_tick_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resize_settle_ms: 200,
            frame_tick_ms: 16,
        }
    }
}

/// Input forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct InputSettings {
    /// Send keystrokes as raw binary frames instead of JSON `input` frames
    pub binary_frames: bool,
}

/// Attachment manager settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagerSettings {
    /// Maximum number of concurrent attachments
    pub max_attachments: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self { max_attachments: 8 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`
    pub level: String,
    /// Log file; when unset, logs go to stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
