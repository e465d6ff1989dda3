//! Configuration loading for the read-aloud demo.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Any missing or invalid entries fall back to
//! sensible defaults so the demo can still run.

use crate::geometry::PageSize;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// High-level configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_highlight_padding")]
    pub highlight_padding: f32,
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            library_dir: default_library_dir(),
            tick_interval_ms: default_tick_interval_ms(),
            highlight_padding: default_highlight_padding(),
            recent_capacity: default_recent_capacity(),
            viewport: ViewportConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Container the page image is fitted into.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ViewportConfig {
    #[serde(default = "default_viewport_width")]
    pub width: f32,
    #[serde(default = "default_viewport_height")]
    pub height: f32,
}

impl ViewportConfig {
    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        ViewportConfig {
            width: default_viewport_width(),
            height: default_viewport_height(),
        }
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> ReaderConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return ReaderConfig::default();
        }
    };

    match toml::from_str::<ReaderConfig>(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            ReaderConfig::default()
        }
    }
}

fn default_library_dir() -> PathBuf {
    PathBuf::from("library")
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_highlight_padding() -> f32 {
    5.0
}

fn default_recent_capacity() -> usize {
    10
}

fn default_viewport_width() -> f32 {
    1024.0
}

fn default_viewport_height() -> f32 {
    768.0
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.toml"));
        assert_eq!(cfg.tick_interval_ms, 100);
        assert_eq!(cfg.highlight_padding, 5.0);
        assert_eq!(cfg.recent_capacity, 10);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "tick_interval_ms = 50\nlog_level = \"debug\"\n\n[viewport]\nwidth = 800.0\n",
        )
        .unwrap();

        let cfg = load_config(&path);
        assert_eq!(cfg.tick_interval_ms, 50);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.viewport.width, 800.0);
        assert_eq!(cfg.viewport.height, 768.0);
        assert_eq!(cfg.library_dir, PathBuf::from("library"));
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tick_interval_ms = \"soon\"").unwrap();

        let cfg = load_config(&path);
        assert_eq!(cfg.tick_interval_ms, 100);
    }
}
