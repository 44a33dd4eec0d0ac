//! Structured logging setup for Huddle clients
//!
//! Every sync client runs its event loop inside a `sync_client` span that
//! carries the client name, so with several clients in one process (tests,
//! demos) each line can be traced back to the client that wrote it.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines, including the current span (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **Env Filter**: `RUST_LOG` overrides the configured levels; the sync
//!   engine (`huddle_sync`) can have its own level
//!
//! # Quick Start
//!
//! ```ignore
//! use huddle_logging::{HuddleSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to stderr)
//! let _guard = HuddleSubscriberBuilder::new().init()?;
//!
//! // A CLI command: warnings only, pretty, sync engine a bit louder
//! let _guard = HuddleSubscriberBuilder::new()
//!     .with_config(LogConfig::cli())
//!     .with_sync_level("info")
//!     .init()?;
//! ```

pub mod config;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy, SYNC_TARGET};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors that can occur while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Failed to open log file: {0}")]
    File(#[from] tracing_appender::rolling::InitError),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and initializing the logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct HuddleSubscriberBuilder {
    config: LogConfig,
}

impl HuddleSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set the sync engine's level separately from the default
    pub fn with_sync_level(mut self, level: impl Into<String>) -> Self {
        self.config.sync_level = Some(level.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch console output between pretty and JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LogError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => {
                let directive = self.config.filter_directive();
                EnvFilter::try_new(&directive).map_err(|_| LogError::Filter(directive))
            }
        }
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard that must be kept alive for the duration of the
    /// program when file output is enabled.
    pub fn init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = self.env_filter()?;

        let (file_writer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(file_config)?);
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let console = &self.config.console;
        let pretty_console = (console.enabled && console.pretty)
            .then(|| layers::pretty_layer(std::io::stderr, console.ansi));
        let jsonl_console = (console.enabled && !console.pretty)
            .then(|| layers::jsonl_layer(std::io::stderr, &self.config.jsonl));
        let file_layer = file_writer.map(|writer| layers::jsonl_layer(writer, &self.config.jsonl));

        Registry::default()
            .with(env_filter)
            .with(pretty_console)
            .with(jsonl_console)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }
}

impl Default for HuddleSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn file_appender(config: &FileConfig) -> Result<RollingFileAppender, LogError> {
    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    Ok(builder.build(&config.directory)?)
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Result<Option<WorkerGuard>, LogError> {
    HuddleSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from several tests; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = HuddleSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
