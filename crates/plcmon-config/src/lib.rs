//! Configuration for the plcmon monitor.
//!
//! A single TOML file holds the backend launch settings, monitor tuning,
//! and the persisted UI preferences. This crate loads it (defaults → file
//! → `PLCMON_` environment), validates it into `plcmon_core` runtime types,
//! and backs the core `Preferences` contract with the `[ui]` section.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use plcmon_core::{
    CoreError, DeviceAddress, DisplayFormat, EditPosition, MockSettings, MonitorConfig,
    Preferences, WordOrder,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for CoreError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Backend service launch settings.
    #[serde(default)]
    pub server: MockSettings,

    #[serde(default)]
    pub monitor: MonitorSection,

    /// Persisted preferences.
    #[serde(default)]
    pub ui: UiSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSection {
    /// First monitored word, e.g. `"D100"`.
    #[serde(default = "default_target")]
    pub target: String,

    /// Poll / push period as a humantime string (`"500ms"`, `"1s"`).
    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default = "default_rows")]
    pub rows: usize,

    #[serde(default)]
    pub word_order: WordOrder,

    /// Use backend push events when available. `false` always polls.
    #[serde(default = "default_true")]
    pub events: bool,

    #[serde(default = "default_select_retries")]
    pub select_retries: u32,

    #[serde(default = "default_select_backoff")]
    pub select_backoff: String,

    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            target: default_target(),
            interval: default_interval(),
            rows: default_rows(),
            word_order: WordOrder::default(),
            events: true,
            select_retries: default_select_retries(),
            select_backoff: default_select_backoff(),
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_target() -> String {
    "D0".into()
}
fn default_interval() -> String {
    "500ms".into()
}
fn default_rows() -> usize {
    30
}
fn default_true() -> bool {
    true
}
fn default_select_retries() -> u32 {
    10
}
fn default_select_backoff() -> String {
    "50ms".into()
}
fn default_log_capacity() -> usize {
    200
}

/// Persisted UI preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UiSection {
    #[serde(default)]
    pub display_format: DisplayFormat,

    /// Start the backend service and monitoring on launch.
    #[serde(default)]
    pub auto_start: bool,

    #[serde(default)]
    pub edit_position: Option<EditPosition>,
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Translate the `[monitor]` section into engine tuning.
    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let m = &self.monitor;
        let interval = parse_interval("monitor.interval", &m.interval)?;
        if m.rows == 0 {
            return Err(ConfigError::Validation {
                field: "monitor.rows".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(MonitorConfig {
            poll_interval: interval,
            monitor_interval: interval,
            row_count: m.rows,
            select_retry_attempts: m.select_retries,
            select_retry_backoff: parse_interval("monitor.select_backoff", &m.select_backoff)?,
            word_order: m.word_order,
            session_log_capacity: m.log_capacity,
            force_polling: !m.events,
        })
    }

    /// The configured monitor target.
    pub fn target(&self) -> Result<DeviceAddress, ConfigError> {
        DeviceAddress::parse(&self.monitor.target).ok_or_else(|| ConfigError::Validation {
            field: "monitor.target".into(),
            reason: format!("'{}' is not a device address", self.monitor.target),
        })
    }
}

fn parse_interval(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    let interval = humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })?;
    if interval.is_zero() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(interval)
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "plcmon", "plcmon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("plcmon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from `path` + environment. A missing file yields defaults.
///
/// Environment keys use `__` between section and field, e.g.
/// `PLCMON_SERVER__TCP_PORT=5010`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PLCMON_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load the file alone, without environment overrides.
fn load_file_only(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(config)
}

/// Load config from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

// ── Preferences backed by the config file ───────────────────────────

/// Preferences stored in the `[ui]` section.
///
/// Reads come from memory. Every write re-reads the file, replaces the
/// `[ui]` section, and saves it, so environment overrides never leak into
/// the file.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    ui: Mutex<UiSection>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>, ui: UiSection) -> Self {
        Self {
            path: path.into(),
            ui: Mutex::new(ui),
        }
    }

    /// Load the `[ui]` section from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let ui = load_file_only(&path)?.ui;
        Ok(Self::new(path, ui))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut UiSection)) -> Result<(), CoreError> {
        let snapshot = {
            let mut ui = self
                .ui
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&mut ui);
            ui.clone()
        };
        let mut config = load_file_only(&self.path)?;
        config.ui = snapshot;
        save_config_to(&self.path, &config)?;
        debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&UiSection) -> T) -> T {
        let ui = self
            .ui
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&ui)
    }
}

impl Preferences for FilePreferences {
    fn display_format(&self) -> Option<DisplayFormat> {
        Some(self.read(|ui| ui.display_format))
    }

    fn set_display_format(&self, format: DisplayFormat) -> Result<(), CoreError> {
        self.update(|ui| ui.display_format = format)
    }

    fn auto_start(&self) -> bool {
        self.read(|ui| ui.auto_start)
    }

    fn set_auto_start(&self, enabled: bool) -> Result<(), CoreError> {
        self.update(|ui| ui.auto_start = enabled)
    }

    fn edit_position(&self) -> Option<EditPosition> {
        self.read(|ui| ui.edit_position)
    }

    fn set_edit_position(&self, position: EditPosition) -> Result<(), CoreError> {
        self.update(|ui| ui.edit_position = Some(position))
    }
}
