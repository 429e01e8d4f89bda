//! Configuration file management
//!
//! Loads an optional TOML tuning file. Every key has a built-in default,
//! so running without a config file gives the stock behaviour.
//! Default config path: /etc/vmk-helper/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CLICK_DEBOUNCE_MS, DEFAULT_CPU_AFFINITY, DEFAULT_NICE, DEFAULT_SEAT, INTER_KEY_DELAY_US,
    MAX_BACKSPACE_COUNT, MONITOR_POLL_INTERVAL_MS, VIRTUAL_KEYBOARD_NAME,
};

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Virtual keyboard settings
    pub injector: InjectorConfig,
    /// Pointer monitor settings
    pub monitor: MonitorConfig,
    /// Command socket settings
    pub server: ServerConfig,
    /// Scheduling settings
    pub tuning: TuningConfig,
}

/// Virtual keyboard settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Name advertised by the uinput device
    pub device_name: String,
    /// Delay after each press/release pair (microseconds)
    pub inter_key_delay_us: u64,
    /// Upper clamp for one request (1-10)
    pub max_count: i64,
}

/// Pointer monitor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Start the click monitor thread
    pub enabled: bool,
    /// libinput seat name
    pub seat: String,
    /// Minimum interval between two accepted clicks (ms)
    pub debounce_ms: u64,
    /// Sleep between polls when idle (ms, 1-100)
    pub poll_interval_ms: u64,
    /// Enable tap-to-click on touchpads as they appear
    pub configure_tap: bool,
}

/// Command socket settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Per-connection read timeout in ms (0 = wait forever)
    pub read_timeout_ms: u64,
}

/// Scheduling settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Nice value for the process
    pub nice: i32,
    /// CPUs to pin the process to (empty = leave affinity alone)
    pub cpu_affinity: Vec<usize>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            device_name: VIRTUAL_KEYBOARD_NAME.to_string(),
            inter_key_delay_us: INTER_KEY_DELAY_US,
            max_count: MAX_BACKSPACE_COUNT,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seat: DEFAULT_SEAT.to_string(),
            debounce_ms: CLICK_DEBOUNCE_MS,
            poll_interval_ms: MONITOR_POLL_INTERVAL_MS,
            configure_tap: true,
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            nice: DEFAULT_NICE,
            cpu_affinity: DEFAULT_CPU_AFFINITY.to_vec(),
        }
    }
}

impl InjectorConfig {
    pub fn inter_key_delay(&self) -> Duration {
        Duration::from_micros(self.inter_key_delay_us)
    }
}

impl MonitorConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ServerConfig {
    /// Read timeout, None when disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        if self.read_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.read_timeout_ms))
        }
    }
}

impl Config {
    /// System-wide config file path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/vmk-helper/config.toml";

    /// Get the path that would be used for loading config
    ///
    /// `explicit` is the `--config` argument, which wins over everything.
    /// Returns None if using built-in defaults
    pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        // 1. VMK_HELPER_CONFIG environment variable
        if let Ok(path) = std::env::var("VMK_HELPER_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/vmk-helper/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("vmk-helper").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config: /etc/vmk-helper/config.toml
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. --config argument
    /// 2. VMK_HELPER_CONFIG environment variable
    /// 3. ~/.config/vmk-helper/config.toml (user config)
    /// 4. /etc/vmk-helper/config.toml (system config)
    /// 5. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> Self {
        if let Some(path) = Self::config_path(explicit) {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and sanitize TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.sanitize();
        Ok(config)
    }

    /// Clamp values into the ranges the rest of the program relies on
    fn sanitize(&mut self) {
        self.injector.max_count = self.injector.max_count.clamp(1, MAX_BACKSPACE_COUNT);
        self.monitor.poll_interval_ms = self.monitor.poll_interval_ms.clamp(1, 100);
        self.monitor.debounce_ms = self.monitor.debounce_ms.max(1);
        if self.injector.device_name.is_empty() {
            self.injector.device_name = VIRTUAL_KEYBOARD_NAME.to_string();
        }
        if self.monitor.seat.is_empty() {
            self.monitor.seat = DEFAULT_SEAT.to_string();
        }
    }
}
