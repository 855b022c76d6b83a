//! The `slotlens-tracing` crate provides the tracing subscriber setup used by the slotlens
//! binary.
//!
//! Library crates only emit events through the `tracing` macros; nothing in them installs a
//! subscriber. The binary decides where events go by building a [`SlotlensTracer`]:
//!
//! ```no_run
//! use slotlens_tracing::{LayerInfo, LogFormat, SlotlensTracer, Tracer};
//!
//! let stdout = LayerInfo::new(LogFormat::Terminal, "info".to_string(), String::new(), None);
//! let _guard = SlotlensTracer::new().with_stdout(stdout).init();
//! ```

// re-export tracing crates.
pub use tracing;
pub use tracing_subscriber;

pub use formatter::LogFormat;
pub use layers::{FileInfo, FileWorkerGuard};

mod formatter;
mod layers;

use crate::layers::Layers;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Directive, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracer for application logging.
///
/// Manages the configuration and initialization of logging layers, including standard output,
/// an optional journald layer, and an optional rolling log file.
#[derive(Debug, Clone)]
pub struct SlotlensTracer {
    stdout: LayerInfo,
    journald: Option<String>,
    file: Option<(LayerInfo, FileInfo)>,
}

impl SlotlensTracer {
    /// Constructs a new `SlotlensTracer` with default settings: terminal output at `info`, no
    /// journald, no log file.
    pub fn new() -> Self {
        Self { stdout: LayerInfo::default(), journald: None, file: None }
    }

    /// Sets the configuration for the stdout layer.
    pub fn with_stdout(mut self, config: LayerInfo) -> Self {
        self.stdout = config;
        self
    }

    /// Enables the journald layer with the given filter.
    pub fn with_journald(mut self, filter: String) -> Self {
        self.journald = Some(filter);
        self
    }

    /// Enables the rolling log file layer.
    pub fn with_file(mut self, config: LayerInfo, file_info: FileInfo) -> Self {
        self.file = Some((config, file_info));
        self
    }
}

impl Default for SlotlensTracer {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of one logging layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    format: LogFormat,
    default_directive: String,
    filters: String,
    color: Option<String>,
}

impl LayerInfo {
    /// Constructs a new `LayerInfo`.
    ///
    /// * `format` - the output format
    /// * `default_directive` - the directive applied when `RUST_LOG` is unset, e.g. `info`
    /// * `filters` - additional comma separated filter directives
    /// * `color` - `always`, `auto`, or `never`; `None` disables ANSI colors
    pub fn new(
        format: LogFormat,
        default_directive: String,
        filters: String,
        color: Option<String>,
    ) -> Self {
        Self { format, default_directive, filters, color }
    }
}

impl Default for LayerInfo {
    fn default() -> Self {
        Self {
            format: LogFormat::Terminal,
            default_directive: LevelFilter::INFO.to_string(),
            filters: String::new(),
            color: Some("always".to_string()),
        }
    }
}

/// Installs a configured set of layers as the global subscriber.
pub trait Tracer {
    /// Initialize the logging configuration.
    ///
    /// Returns the file worker guard when a log file is configured. Dropping the guard flushes
    /// and stops the background writer.
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>>;
}

impl Tracer for SlotlensTracer {
    fn init(self) -> eyre::Result<Option<FileWorkerGuard>> {
        let mut layers = Layers::new();

        layers.stdout(
            self.stdout.format,
            self.stdout.default_directive.parse::<Directive>()?,
            &self.stdout.filters,
            self.stdout.color,
        )?;

        if let Some(filter) = self.journald {
            layers.journald(&filter)?;
        }

        let file_guard = if let Some((config, file_info)) = self.file {
            Some(layers.file(config.format, &config.filters, file_info)?)
        } else {
            None
        };

        // The error is returned if the global default subscriber is already set,
        // so it's safe to ignore it
        let _ = tracing_subscriber::registry().with(layers.into_inner()).try_init();
        Ok(file_guard)
    }
}
