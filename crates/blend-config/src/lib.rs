//! Layered configuration for the blend execution engine.
//!
//! Precedence, lowest to highest: compiled-in defaults < `BLEND_*` environment variables <
//! an optional TOML file passed explicitly by the caller. Each layer only overrides the fields
//! it actually sets; anything absent falls through to the layer below it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced while assembling an [`EngineConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CFG-001 invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("CFG-002 failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CFG-003 failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Tunables for the scheduler and executor. See `blend_core` for how each field is consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed `globalTime` increment the executor advances by each step.
    pub time_step: f64,

    /// Stride, in schedule-time units, used by the scheduler's gap-compression sweep.
    pub gap_compression_stride: i64,

    /// Duration assigned to a task by `build_tasks` when the correspondence supplies none.
    pub default_task_length: i64,

    /// When `true`, the scheduler clamps a gap-compressed GROW bucket so it can never start
    /// before the end of the MORPH bucket. The reference engine does not do this (`false`).
    pub strict_bucket_separation: bool,

    /// Frame history retention policy; see `blend_core::snapshot::FrameHistory`.
    pub frame_history: FrameHistoryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            gap_compression_stride: 50,
            default_task_length: 100,
            strict_bucket_separation: false,
            frame_history: FrameHistoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameHistoryConfig {
    /// `0` keeps every snapshot; any other value keeps only the most recent N.
    pub keep_last: usize,
}

impl Default for FrameHistoryConfig {
    fn default() -> Self {
        Self { keep_last: 0 }
    }
}

impl EngineConfig {
    /// Defaults, overridden by any recognized `BLEND_*` environment variable, overridden by
    /// `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        if let Some(path) = path {
            cfg.apply_file(path)?;
        }
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("BLEND_TIME_STEP") {
            self.time_step = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "BLEND_TIME_STEP".into(),
                reason: format!("{v:?} is not a float"),
            })?;
        }
        if let Ok(v) = std::env::var("BLEND_GAP_COMPRESSION_STRIDE") {
            self.gap_compression_stride = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "BLEND_GAP_COMPRESSION_STRIDE".into(),
                reason: format!("{v:?} is not an integer"),
            })?;
        }
        if let Ok(v) = std::env::var("BLEND_DEFAULT_TASK_LENGTH") {
            self.default_task_length = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "BLEND_DEFAULT_TASK_LENGTH".into(),
                reason: format!("{v:?} is not an integer"),
            })?;
        }
        if let Ok(v) = std::env::var("BLEND_STRICT_BUCKET_SEPARATION") {
            self.strict_bucket_separation = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("BLEND_FRAME_HISTORY_KEEP_LAST") {
            self.frame_history.keep_last = v.parse().map_err(|_| ConfigError::InvalidValue {
                field: "BLEND_FRAME_HISTORY_KEEP_LAST".into(),
                reason: format!("{v:?} is not an integer"),
            })?;
        }
        Ok(())
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_cfg: PartialEngineConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        file_cfg.merge_into(self);
        tracing::debug!(path = %path.display(), "loaded engine config overrides from file");
        Ok(())
    }
}

/// Mirrors `EngineConfig` but every field is optional, so a TOML file only needs to mention the
/// fields it wants to override.
#[derive(Debug, Default, Deserialize)]
struct PartialEngineConfig {
    time_step: Option<f64>,
    gap_compression_stride: Option<i64>,
    default_task_length: Option<i64>,
    strict_bucket_separation: Option<bool>,
    frame_history: Option<FrameHistoryConfig>,
}

impl PartialEngineConfig {
    fn merge_into(self, cfg: &mut EngineConfig) {
        if let Some(v) = self.time_step {
            cfg.time_step = v;
        }
        if let Some(v) = self.gap_compression_stride {
            cfg.gap_compression_stride = v;
        }
        if let Some(v) = self.default_task_length {
            cfg.default_task_length = v;
        }
        if let Some(v) = self.strict_bucket_separation {
            cfg.strict_bucket_separation = v;
        }
        if let Some(v) = self.frame_history {
            cfg.frame_history = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_engine() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.time_step, 0.01);
        assert_eq!(cfg.gap_compression_stride, 50);
        assert!(!cfg.strict_bucket_separation);
        assert_eq!(cfg.frame_history.keep_last, 0);
    }

    #[test]
    fn file_overrides_only_the_fields_it_sets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blend.toml");
        std::fs::write(&path, "time_step = 0.02\n").unwrap();

        let cfg = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.time_step, 0.02);
        // untouched field keeps its default
        assert_eq!(cfg.gap_compression_stride, 50);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blend.toml");
        std::fs::write(&path, "time_step = [not valid\n").unwrap();

        let err = EngineConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
