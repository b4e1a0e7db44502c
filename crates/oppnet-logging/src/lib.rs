//! Structured logging for oppnet simulation runs
//!
//! # Features
//!
//! - **Console Output**: Pretty, compact or JSON lines on stderr
//! - **Run Files**: JSONL written through a non-blocking tracing-appender writer
//! - **Node Context Injection**: Attribute spans to the node whose engine is running
//!
//! # Quick Start
//!
//! ```ignore
//! use oppnet_logging::{LogConfig, OppnetSubscriberBuilder};
//!
//! // Warnings on stderr
//! OppnetSubscriberBuilder::new().init()?;
//!
//! // Every routing decision, written next to the run results
//! let _guard = OppnetSubscriberBuilder::new()
//!     .with_config(LogConfig::batch("runs/42".into()))
//!     .with_level("debug")
//!     .init()?;
//! ```
//!
//! # Node Context
//!
//! ```ignore
//! use oppnet_logging::NodeContextGuard;
//!
//! let _guard = NodeContextGuard::new(&host, run_id);
//! let _span = tracing::info_span!("tick").entered();
//! tracing::debug!("Transferred message");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod layers;

pub use config::{ConsoleFormat, FileConfig, LOG_FILE_PREFIX, LogConfig, RotationStrategy};
pub use context::{NodeContextData, NodeContextGuard};
pub use error::LoggingError;
pub use layers::{NodeContextExtension, NodeContextLayer};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::MakeWriter,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

/// Registry with filtering and node context applied, below the output layers
type Base = Layered<NodeContextLayer, Layered<EnvFilter, Registry>>;

type OutputLayer = Box<dyn Layer<Base> + Send + Sync + 'static>;

/// Builder for configuring and initializing the oppnet logging subscriber
pub struct OppnetSubscriberBuilder {
    config: LogConfig,
}

impl OppnetSubscriberBuilder {
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

    /// Set the filter used when `RUST_LOG` is unset
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the stderr format, or silence stderr with None
    pub fn with_console(mut self, format: Option<ConsoleFormat>) -> Self {
        self.config.console = format;
        self
    }

    /// Also write JSONL to a file
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output on drop and must be kept alive
    /// until the run finishes.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let mut outputs: Vec<OutputLayer> = Vec::new();
        let mut guard = None;

        match self.config.console {
            Some(ConsoleFormat::Pretty) => outputs.push(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            Some(ConsoleFormat::Compact) => outputs.push(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .boxed(),
            ),
            Some(ConsoleFormat::Json) => outputs.push(jsonl_layer(std::io::stderr)),
            None => {}
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            outputs.push(jsonl_layer(writer));
        }

        Registry::default()
            .with(env_filter)
            .with(NodeContextLayer::new())
            .with(outputs)
            .try_init()?;

        Ok(guard)
    }
}

impl Default for OppnetSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flattened JSON events carrying the span list, so node ids survive
fn jsonl_layer<W>(writer: W) -> OutputLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .flatten_event(true)
        .with_writer(writer)
        .boxed()
}

/// Non-blocking writer for file output
///
/// `Never` truncates a single `oppnet-sim.log`; `Hourly` appends to rolled
/// files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory).map_err(|source| LoggingError::Io {
                path: config.directory.clone(),
                source,
            })?;
            let path = config.directory.join(format!("{LOG_FILE_PREFIX}.log"));
            let file = File::create(&path).map_err(|source| LoggingError::Io { path, source })?;
            Ok(tracing_appender::non_blocking(file))
        }
        RotationStrategy::Hourly => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::HOURLY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(&config.directory)?;
            Ok(tracing_appender::non_blocking(appender))
        }
    }
}

fn init_quietly(config: LogConfig) {
    if let Err(err) = OppnetSubscriberBuilder::new().with_config(config).init() {
        tracing::debug!(error = %err, "Keeping existing subscriber");
    }
}

/// Initialize logging with default settings (warnings on stderr)
///
/// Keeps any subscriber that is already installed.
pub fn init_default() {
    init_quietly(LogConfig::default());
}

/// Initialize logging with decision-level output
pub fn init_verbose() {
    init_quietly(LogConfig::verbose());
}

/// Initialize logging for tests (compact warnings)
pub fn init_testing() {
    init_quietly(LogConfig::testing());
}
