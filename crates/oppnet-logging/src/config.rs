//! Log settings for simulation runs
//!
//! A run logs to stderr, to a JSONL file, or both. Interactive runs keep
//! stderr readable; batch runs over long traces write everything to a file
//! next to their results and stay silent on the terminal.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Prefix of log files written by simulation runs
pub const LOG_FILE_PREFIX: &str = "oppnet-sim";

/// Where and how a run logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Format of stderr output (None = nothing on stderr)
    pub console: Option<ConsoleFormat>,
    /// JSONL file output
    pub file: Option<FileConfig>,
}

impl Default for LogConfig {
    /// Warnings only, human-readable on stderr
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            console: Some(ConsoleFormat::Pretty),
            file: None,
        }
    }
}

impl LogConfig {
    /// Decision-level output on stderr
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// File-only output for long trace replays
    ///
    /// Every run truncates `<dir>/oppnet-sim.log`.
    pub fn batch(directory: PathBuf) -> Self {
        Self {
            level: "info".to_string(),
            console: None,
            file: Some(FileConfig {
                directory,
                rotation: RotationStrategy::Never,
            }),
        }
    }

    /// Compact warnings for test binaries
    pub fn testing() -> Self {
        Self {
            console: Some(ConsoleFormat::Compact),
            ..Self::default()
        }
    }
}

/// Rendering of events on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// Multi-line, colored
    Pretty,
    /// One line per event, no colors
    Compact,
    /// One JSON object per line
    Json,
}

/// JSONL file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./runs"),
            rotation: RotationStrategy::Never,
        }
    }
}

/// When the log file is rolled over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// One file per run
    #[default]
    Never,
    /// A new file every hour of wall-clock time
    Hourly,
}
