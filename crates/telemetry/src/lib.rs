use std::fs::File;

use tracing::info_span;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter, writer::BoxMakeWriter},
    prelude::*,
};

mod writer;

pub use self::writer::LogWriter;

const DEFAULT_FILTER: &str = "info";

pub struct TelemetryConfig {
    enabled: bool,
    default_filter: String,
    console_writer: Option<BoxMakeWriter>,
    file_writer: Option<BoxMakeWriter>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_filter: DEFAULT_FILTER.to_string(),
            console_writer: None,
            file_writer: None,
        }
    }
}

impl TelemetryConfig {
    /// Disabled telemetry installs no log layers at all.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Directives used when `RUST_LOG` is unset or invalid.
    pub fn with_default_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_console_writer<W>(mut self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.console_writer = Some(BoxMakeWriter::new(writer));
        self
    }

    pub fn with_file_writer(mut self, file: File) -> Self {
        self.file_writer = Some(BoxMakeWriter::new(LogWriter::new(file)));
        self
    }
}

pub fn install(config: TelemetryConfig) {
    let TelemetryConfig {
        enabled,
        default_filter,
        console_writer,
        file_writer,
    } = config;

    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(filter_layer)
        .with(console_writer.filter(|_| enabled).map(|writer| {
            fmt::layer()
                .compact()
                .with_ansi(true)
                .without_time()
                .with_target(false)
                .with_writer(writer)
        }))
        .with(file_writer.filter(|_| enabled).map(|writer| {
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer)
        }))
        .init();
}

pub fn install_error_handler() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .install();
}

/// Runs `f` inside the span every other span of a command hangs off.
pub fn with_root_span<T>(name: &str, description: &str, f: impl FnOnce() -> T) -> T {
    info_span!("mempipe", command = name, description = description).in_scope(f)
}
