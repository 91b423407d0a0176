//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Paths to all chatlog data files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Capture configuration (`data/config.json`).
    pub config_file: PathBuf,
    /// Key-value persistence store (`data/storage.json`).
    pub storage_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            config_file: root.join("config.json"),
            storage_file: root.join("storage.json"),
            root,
        })
    }
}

/// DOM selectors the capture core resolves through the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    #[serde(default = "default_input_selector")]
    pub input: String,
    #[serde(default = "default_form_selector")]
    pub form: String,
    #[serde(default = "default_output_selector")]
    pub output: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            input: default_input_selector(),
            form: default_form_selector(),
            output: default_output_selector(),
        }
    }
}

/// Persisted capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Silence after the last response fragment before a turn is finalized.
    #[serde(default = "default_quiescence_ms")]
    pub quiescence_ms: u64,
    /// Interval between attempts to locate surfaces that are not mounted yet.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Labels the host page repeats without content; dropped during aggregation.
    #[serde(default = "default_noise_tokens")]
    pub noise_tokens: Vec<String>,
    #[serde(default)]
    pub selectors: Selectors,
}

fn default_port() -> u16 {
    3017
}
fn default_quiescence_ms() -> u64 {
    700
}
fn default_retry_interval_ms() -> u64 {
    1000
}
fn default_noise_tokens() -> Vec<String> {
    vec!["4o".into()]
}
fn default_input_selector() -> String {
    "#prompt-textarea".into()
}
fn default_form_selector() -> String {
    r#"form[data-type="unified-composer"]"#.into()
}
fn default_output_selector() -> String {
    "main".into()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            quiescence_ms: default_quiescence_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            noise_tokens: default_noise_tokens(),
            selectors: Selectors::default(),
        }
    }
}

impl CaptureConfig {
    /// Load config from a JSON file, or return defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Load from the data directory and apply environment overrides.
    pub fn from_env(paths: &DataPaths) -> Result<Self> {
        let mut config = Self::load(&paths.config_file);
        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid PORT: {}", port)))?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the capture core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.quiescence_ms == 0 {
            return Err(Error::Config("quiescence_ms must be positive".into()));
        }
        if self.retry_interval_ms == 0 {
            return Err(Error::Config("retry_interval_ms must be positive".into()));
        }
        if self.selectors.input.is_empty() || self.selectors.output.is_empty() {
            return Err(Error::Config("input and output selectors are required".into()));
        }
        Ok(())
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
