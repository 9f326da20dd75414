//! Telemetry for the blend execution engine.
//!
//! Structured logging (`tracing`) plus a handful of process-local counters that the
//! scheduler/executor/relinker update at their seams. There is no exporter here — a host
//! application wires `metrics::snapshot()` into whatever collector it uses.

pub mod logging;
pub mod metrics;
pub mod tracing_setup;

use logging::LoggingConfig;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Initialize telemetry with the default (INFO) log level and `LoggingConfig::development()`.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize telemetry with a specific default log level; `RUST_LOG` overrides it. Uses
/// `LoggingConfig::development()` for the formatting layer.
pub fn init_with_level(level: Level) {
    init_with_config(level, LoggingConfig::default());
}

/// Initialize telemetry with a specific default log level and formatting layer config;
/// `RUST_LOG` overrides `level`.
pub fn init_with_config(level: Level, config: LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        Box::new(fmt_layer.json())
    } else {
        Box::new(fmt_layer)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::info!("blend-telemetry initialized");
}
