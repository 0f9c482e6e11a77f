// Detector configuration, loaded from an optional JSON file
// Missing fields fall back to the defaults in audio_constants

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::samples_for_duration;
use crate::audio_constants::{
    DEFAULT_SAMPLE_RATE, DEFAULT_SENSITIVITY, DEFAULT_WINDOW_DURATION_MS, LOOP_EXIT_TIMEOUT_MS,
};

/// Directory name used under the platform data dir
const APP_DIR_NAME: &str = "chimewatch";

/// File name of the default reference library
const LIBRARY_FILE_NAME: &str = "references.json";

/// File name of the default alert contact list
const CONTACTS_FILE_NAME: &str = "contacts.json";

/// Errors from loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read or written
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid configuration JSON
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value parsed but cannot drive detection
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Runtime configuration for detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Length of each analysis window in milliseconds
    pub window_duration_ms: u64,
    /// Sample rate for host-fed capture (`PushCaptureBackend`); file capture uses the file's rate
    pub sample_rate: u32,
    /// Initial sensitivity threshold, in [0, 1]
    pub sensitivity: f64,
    /// Where the reference library is stored; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_path: Option<PathBuf>,
    /// Where the alert contact list is stored; platform data dir when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts_path: Option<PathBuf>,
    /// How long start/stop wait for a previous loop thread to exit
    pub exit_timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_duration_ms: DEFAULT_WINDOW_DURATION_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sensitivity: DEFAULT_SENSITIVITY,
            library_path: None,
            contacts_path: None,
            exit_timeout_ms: LOOP_EXIT_TIMEOUT_MS,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from `path`
    ///
    /// A missing file yields the defaults. Sensitivity outside [0, 1] is
    /// clamped rather than rejected; a window that holds no samples is an
    /// error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            crate::debug!("[config] No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&content)?;

        let clamped = clamp_sensitivity(config.sensitivity);
        if clamped != config.sensitivity {
            crate::warn!(
                "[config] Sensitivity {} out of range, clamped to {}",
                config.sensitivity,
                clamped
            );
            config.sensitivity = clamped;
        }
        config.validate()?;

        crate::debug!("[config] Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to `path` (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Check that the window and sample rate describe at least one sample
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sampleRate must be greater than zero".into()));
        }
        if samples_for_duration(self.window_duration(), self.sample_rate) == 0 {
            return Err(ConfigError::Invalid(format!(
                "windowDurationMs {} holds no samples at {} Hz",
                self.window_duration_ms, self.sample_rate
            )));
        }
        Ok(())
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_duration_ms)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    /// Configured library path, or the platform default
    pub fn library_path(&self) -> PathBuf {
        self.library_path
            .clone()
            .unwrap_or_else(default_library_path)
    }

    /// Configured contact list path, or the platform default
    pub fn contacts_path(&self) -> PathBuf {
        self.contacts_path
            .clone()
            .unwrap_or_else(default_contacts_path)
    }
}

/// Clamp a sensitivity value into [0, 1]
///
/// NaN maps to the default.
pub fn clamp_sensitivity(value: f64) -> f64 {
    if value.is_nan() {
        DEFAULT_SENSITIVITY
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Default config file: `<config_dir>/chimewatch/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("config.json")
}

/// Default library file: `<data_dir>/chimewatch/references.json`
pub fn default_library_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(LIBRARY_FILE_NAME)
}

/// Default contact list file: `<data_dir>/chimewatch/contacts.json`
pub fn default_contacts_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONTACTS_FILE_NAME)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
