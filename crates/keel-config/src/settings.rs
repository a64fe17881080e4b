use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `keel.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeelConfig {
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Frame pacing for the host loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Stop after this many ticks. `None` runs until something asks to quit.
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            max_frames: None,
        }
    }
}

impl FrameConfig {
    /// Wall-clock time budget for a single frame at `target_fps`.
    pub fn frame_budget(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.target_fps.max(1)))
    }
}

/// Output format of the stderr log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging subsystem settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when neither `KEEL_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write a daily-rotated log file.
    #[serde(default)]
    pub file: bool,
    /// Directory for log files. `KEEL_LOG_DIR` takes precedence.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::Plain,
            file: false,
            dir: None,
            retention_days: default_retention_days(),
        }
    }
}

fn default_target_fps() -> u32 {
    60
}

fn default_retention_days() -> u64 {
    7
}

const MAX_TARGET_FPS: u32 = 1000;
const MAX_RETENTION_DAYS: u64 = 3650;

impl KeelConfig {
    /// Parse and validate configuration TOML.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse keel config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read keel config at {}", path.display()))?;

        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid keel config at {}", path.display()))
    }

    /// Load from `path` if given, otherwise use defaults.
    ///
    /// A named file that does not exist is an error. Callers that treat a
    /// config file as optional check for it before passing the path.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.frame.target_fps == 0 || self.frame.target_fps > MAX_TARGET_FPS {
            bail!(
                "frame.target_fps must be between 1 and {}, got {}",
                MAX_TARGET_FPS,
                self.frame.target_fps
            );
        }
        if self.frame.max_frames == Some(0) {
            bail!("frame.max_frames must be positive when set");
        }
        if let Some(filter) = &self.logging.filter {
            if filter.trim().is_empty() {
                bail!("logging.filter must not be empty when set");
            }
        }
        if self.logging.retention_days > MAX_RETENTION_DAYS {
            bail!(
                "logging.retention_days must be at most {}, got {}",
                MAX_RETENTION_DAYS,
                self.logging.retention_days
            );
        }
        if let Some(dir) = &self.logging.dir {
            if dir.as_os_str().is_empty() {
                bail!("logging.dir must not be empty when set");
            }
        }
        Ok(())
    }
}
