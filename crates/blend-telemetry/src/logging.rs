//! Logging presentation knobs, kept separate from `tracing_setup` so a host binary can pick a
//! style without touching the `EnvFilter` wiring.

/// Controls how the `tracing` formatting layer renders.
pub struct LoggingConfig {
    pub json: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    /// Human-readable, compact — for a developer's terminal.
    pub fn development() -> Self {
        Self {
            json: false,
            with_file: true,
            with_line_number: true,
        }
    }

    /// JSON lines — for a log collector.
    pub fn production() -> Self {
        Self {
            json: true,
            with_file: true,
            with_line_number: true,
        }
    }
}
