//! Logging configuration for huddle clients
//!
//! A huddle process is either a one-shot CLI command, a long-running
//! `huddle watch`, or a test. Each has a preset here. The sync engine logs
//! every snapshot, push and debounce decision, so its level is set apart
//! from the rest with [`LogConfig::sync_level`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log target of the sync engine crate.
pub const SYNC_TARGET: &str = "huddle_sync";

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for everything not otherwise listed (`RUST_LOG` overrides all of it)
    pub default_level: String,

    /// Level for the sync engine; `None` follows `default_level`
    pub sync_level: Option<String>,

    pub console: ConsoleConfig,

    pub file: Option<FileConfig>,

    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            sync_level: None,
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// One-shot CLI commands: warnings only, readable on a terminal.
    ///
    /// Command output owns stdout, so logs stay quiet unless something
    /// went wrong (a failed save, a store that stopped sending updates).
    pub fn cli() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            jsonl: JsonlConfig {
                include_location: false,
                ..JsonlConfig::default()
            },
            ..Default::default()
        }
    }

    /// Working on huddle itself: debug everywhere, sync loop at trace.
    pub fn development() -> Self {
        Self {
            default_level: "debug".to_string(),
            sync_level: Some("trace".to_string()),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Long-running `huddle watch`: the terminal shows the party, so logs go
    /// to JSONL files, with every push and snapshot recorded.
    pub fn watch(log_dir: PathBuf) -> Self {
        Self {
            default_level: "info".to_string(),
            sync_level: Some("debug".to_string()),
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
                ansi: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig::default(),
        }
    }

    /// Tests: warnings as JSONL, so several clients in one test can be told
    /// apart by their `sync_client` span.
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: false,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// The env-filter directive built from the levels.
    pub fn filter_directive(&self) -> String {
        match &self.sync_level {
            Some(level) => format!("{},{}={}", self.default_level, SYNC_TARGET, level),
            None => self.default_level.clone(),
        }
    }
}

/// Console output configuration
///
/// Console output goes to stderr so command output on stdout stays clean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }
}

/// Rolling JSONL log files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// Files are named `<prefix>.<date>.jsonl`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Oldest files beyond this count are deleted
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "huddle".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    /// One file per game day
    #[default]
    Daily,
    Hourly,
    /// Single file
    Never,
}

/// Which fields JSONL lines carry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Put event fields (`save_id`, `seq`, ...) at the top level
    pub flatten_events: bool,
    /// Include the full span list
    pub include_spans: bool,
    /// Include the innermost span, which names the sync client
    pub include_current_span: bool,
    pub include_thread_info: bool,
    /// Include source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: false,
            include_current_span: true,
            include_thread_info: false,
            include_location: true,
        }
    }
}
