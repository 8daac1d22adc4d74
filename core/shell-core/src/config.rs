//! Runtime configuration loading and saving.
//!
//! Handles:
//! - Profiler tuning (enabled, sample limit, slow threshold)
//! - Boot freshness window
//! - Tray page size and optional retention cap
//! - Storage namespace for persisted session records
//!
//! Missing or malformed files resolve to defaults; out-of-range values are
//! clamped by [`ShellConfig::normalized`].

use std::path::Path;

use fs_err as fs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, ShellError};

pub const DEFAULT_NAMESPACE: &str = "nexus.workspace";

pub const DEFAULT_SAMPLE_LIMIT: usize = 20;
pub const MIN_SAMPLE_LIMIT: usize = 6;
pub const MAX_SAMPLE_LIMIT: usize = 10_000;
pub const DEFAULT_SLOW_THRESHOLD_MS: f64 = 18.0;
pub const MIN_SLOW_THRESHOLD_MS: f64 = 8.0;

/// Sessions touched within this window resume instead of cold booting.
pub const DEFAULT_RESUME_WINDOW_SECS: i64 = 30 * 60;
pub const MAX_RESUME_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

pub const DEFAULT_TRAY_PAGE_SIZE: usize = 8;

static NAMESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("namespace pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfilerConfig {
    pub enabled: bool,
    pub sample_limit: usize,
    pub slow_threshold_ms: f64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
        }
    }
}

impl ProfilerConfig {
    pub fn normalized(mut self) -> Self {
        self.sample_limit = self.sample_limit.clamp(MIN_SAMPLE_LIMIT, MAX_SAMPLE_LIMIT);
        if !self.slow_threshold_ms.is_finite() || self.slow_threshold_ms < MIN_SLOW_THRESHOLD_MS {
            self.slow_threshold_ms = MIN_SLOW_THRESHOLD_MS;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootConfig {
    pub resume_window_secs: i64,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            resume_window_secs: DEFAULT_RESUME_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrayConfig {
    pub page_size: usize,
    /// Hard retention cap. `None` keeps every notification until cleared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retained: Option<usize>,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_TRAY_PAGE_SIZE,
            max_retained: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShellConfig {
    pub namespace: String,
    pub profiling: ProfilerConfig,
    pub boot: BootConfig,
    pub tray: TrayConfig,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            profiling: ProfilerConfig::default(),
            boot: BootConfig::default(),
            tray: TrayConfig::default(),
        }
    }
}

impl ShellConfig {
    /// Clamps out-of-range values and replaces an invalid namespace.
    pub fn normalized(mut self) -> Self {
        if let Err(err) = validate_namespace(&self.namespace) {
            warn!(error = %err, "Falling back to default namespace");
            self.namespace = DEFAULT_NAMESPACE.to_string();
        }
        self.profiling = self.profiling.normalized();
        self.boot.resume_window_secs = self.boot.resume_window_secs.clamp(0, MAX_RESUME_WINDOW_SECS);
        self.tray.page_size = self.tray.page_size.max(1);
        self.tray.max_retained = self.tray.max_retained.map(|cap| cap.max(1));
        self
    }
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    if NAMESPACE_PATTERN.is_match(namespace) {
        Ok(())
    } else {
        Err(ShellError::InvalidConfig {
            field: "namespace".to_string(),
            reason: format!("{namespace:?} must match [A-Za-z0-9_.-]+"),
        })
    }
}

/// Loads the shell configuration, returning defaults if the file is missing or malformed.
pub fn load_shell_config(path: &Path) -> ShellConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ShellConfig::default(),
        Err(err) => {
            warn!(error = %err, "Failed to read shell config, using defaults");
            return ShellConfig::default();
        }
    };

    match serde_json::from_str::<ShellConfig>(&content) {
        Ok(config) => config.normalized(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Malformed shell config, using defaults");
            ShellConfig::default()
        }
    }
}

/// Saves the shell configuration to disk, creating the parent directory.
pub fn save_shell_config(path: &Path, config: &ShellConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| ShellError::io("Failed to create config directory", err))?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|err| ShellError::json("Failed to serialize shell config", err))?;
    fs::write(path, content).map_err(|err| ShellError::io("Failed to write shell config", err))
}
