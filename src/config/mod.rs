//! Configuration for the AEGIS-Claw guard pipeline.
//!
//! [`AegisClawConfig`] collects every threshold and tunable used by the
//! detection-and-decision pipeline into one immutable record, so they can be
//! adjusted per environment without touching engine code.
//!
//! ## Configuration hierarchy
//!
//! 1. Compiled defaults (match the upstream Python reference exactly)
//! 2. An optional overrides file (YAML or TOML, partial — unset fields keep
//!    their default)
//! 3. Environment variables (`AEGIS_CLAW_*`) — only `log_level` and
//!    `max_input_length` are recognized, matching the source system
//!
//! ## Example
//!
//! ```rust
//! use aegis_claw::config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new().with_env().build().unwrap();
//! assert_eq!(config.max_input_length, 50_000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

/// Errors that can occur while building an [`AegisClawConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read an overrides file.
    #[error("failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse an overrides file.
    #[error("failed to parse {format} config: {source}")]
    ParseError {
        /// Format that failed to parse (YAML or TOML).
        format: String,
        /// Underlying parse error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Unsupported or unrecognised configuration file extension.
    #[error("unsupported config file format: {message}")]
    UnsupportedFormat {
        /// Description of the problem.
        message: String,
    },

    /// Configuration validation failed.
    #[error("config validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {key}: {message}")]
    EnvParse {
        /// Environment variable key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// A partial configuration document accepted by
/// [`ConfigBuilder::with_overrides_file`]. Every field is optional so a
/// deployment only needs to list the thresholds it wants to change.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    log_level: Option<String>,
    max_input_length: Option<usize>,
    safety_threshold: Option<f32>,
    anomaly_threshold: Option<f32>,
    anomaly_special_char_ratio: Option<f32>,
    anomaly_zero_width_min: Option<usize>,
    confidence_critical: Option<f32>,
    confidence_high: Option<f32>,
    confidence_medium: Option<f32>,
    confidence_low: Option<f32>,
    multi_match_bonus: Option<f32>,
    multi_match_max_bonus: Option<f32>,
    approve_confidence: Option<f32>,
    block_confidence: Option<f32>,
    modify_confidence: Option<f32>,
    escalate_confidence: Option<f32>,
    reask_confidence: Option<f32>,
    rate_limit_enabled: Option<bool>,
    rate_limit_max_requests: Option<u32>,
    rate_limit_window_seconds: Option<u64>,
    rate_limit_block_seconds: Option<u64>,
}

/// Immutable configuration for the guard pipeline.
///
/// Defaults mirror the upstream reference implementation field-for-field;
/// see `spec.md` §6 for the canonical table.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AegisClawConfig {
    /// Minimum log level the embedding application should honor. This crate
    /// does not install a subscriber; it only documents the recommended
    /// filter.
    pub log_level: String,

    /// Requests longer than this (in `char`s) are blocked outright.
    #[validate(range(min = 1))]
    pub max_input_length: usize,

    /// Safety Classifier: category score at/above this is unsafe.
    #[validate(range(min = 0.0, max = 1.0))]
    pub safety_threshold: f32,

    /// Jailbreak Detector Layer 3: combined score at/above this anomaly-flags.
    #[validate(range(min = 0.0, max = 1.0))]
    pub anomaly_threshold: f32,
    /// Non-alphanumeric/non-whitespace ratio above which the special-char
    /// signal contributes to the anomaly score.
    #[validate(range(min = 0.0, max = 1.0))]
    pub anomaly_special_char_ratio: f32,
    /// Minimum zero-width code point count to trigger the zero-width signal.
    pub anomaly_zero_width_min: usize,

    /// Risk Scorer: base confidence for a CRITICAL primary match.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_critical: f32,
    /// Risk Scorer: base confidence for a HIGH primary match.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_high: f32,
    /// Risk Scorer: base confidence for a MEDIUM primary match.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_medium: f32,
    /// Risk Scorer: base confidence for a LOW primary match.
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_low: f32,
    /// Per-extra-match confidence bonus.
    pub multi_match_bonus: f32,
    /// Cap on the cumulative multi-match bonus.
    pub multi_match_max_bonus: f32,

    /// Decision Router: confidence for an APPROVE result.
    #[validate(range(min = 0.0, max = 1.0))]
    pub approve_confidence: f32,
    /// Decision Router: confidence for a BLOCK result.
    #[validate(range(min = 0.0, max = 1.0))]
    pub block_confidence: f32,
    /// Decision Router: confidence for a MODIFY result.
    #[validate(range(min = 0.0, max = 1.0))]
    pub modify_confidence: f32,
    /// Decision Router: confidence for an ESCALATE result.
    #[validate(range(min = 0.0, max = 1.0))]
    pub escalate_confidence: f32,
    /// Decision Router: confidence for a REASK result.
    #[validate(range(min = 0.0, max = 1.0))]
    pub reask_confidence: f32,

    /// Whether the sliding-window rate limiter is active.
    pub rate_limit_enabled: bool,
    /// Maximum requests per session within `rate_limit_window_seconds`.
    pub rate_limit_max_requests: u32,
    /// Sliding window duration, in seconds.
    pub rate_limit_window_seconds: u64,
    /// How long a session that exceeds its budget stays blocked, in seconds.
    pub rate_limit_block_seconds: u64,
}

impl Default for AegisClawConfig {
    fn default() -> Self {
        Self {
            log_level: "WARNING".to_string(),
            max_input_length: 50_000,

            safety_threshold: 0.5,

            anomaly_threshold: 0.5,
            anomaly_special_char_ratio: 0.4,
            anomaly_zero_width_min: 2,

            confidence_critical: 0.95,
            confidence_high: 0.85,
            confidence_medium: 0.70,
            confidence_low: 0.50,
            multi_match_bonus: 0.02,
            multi_match_max_bonus: 0.10,

            approve_confidence: 0.95,
            block_confidence: 0.90,
            modify_confidence: 0.85,
            escalate_confidence: 0.70,
            reask_confidence: 0.70,

            rate_limit_enabled: false,
            rate_limit_max_requests: 60,
            rate_limit_window_seconds: 60,
            rate_limit_block_seconds: 300,
        }
    }
}

/// Builder for constructing an [`AegisClawConfig`] from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base: AegisClawConfig,
    use_env: bool,
}

impl ConfigBuilder {
    /// Create a new builder seeded with compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: AegisClawConfig::default(),
            use_env: false,
        }
    }

    /// Start from an explicit base configuration instead of defaults.
    #[must_use]
    pub fn with_base(mut self, base: AegisClawConfig) -> Self {
        self.base = base;
        self
    }

    /// Apply a partial overrides file (YAML or TOML, sniffed by extension).
    ///
    /// Unset fields in the file keep whatever value the builder already
    /// carries (defaults, or a prior `with_base`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn with_overrides_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let overrides: ConfigOverrides = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                    format: "YAML".to_string(),
                    source: Box::new(e),
                })?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                format: "TOML".to_string(),
                source: Box::new(e),
            })?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    message: "file extension must be .yaml, .yml, or .toml".to_string(),
                });
            }
        };

        apply_overrides(&mut self.base, overrides);
        Ok(self)
    }

    /// Enable loading overrides from environment variables.
    ///
    /// Recognizes `AEGIS_CLAW_LOG_LEVEL` and `AEGIS_CLAW_MAX_INPUT_LENGTH`,
    /// the two env vars the source system documents. A `.env` file in the
    /// working directory is loaded first, if present.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    /// Build the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails or an environment
    /// variable cannot be parsed.
    pub fn build(mut self) -> Result<AegisClawConfig, ConfigError> {
        if self.use_env {
            dotenvy::dotenv().ok();

            if let Ok(level) = std::env::var("AEGIS_CLAW_LOG_LEVEL") {
                self.base.log_level = level;
            }

            if let Ok(max_len) = std::env::var("AEGIS_CLAW_MAX_INPUT_LENGTH") {
                self.base.max_input_length =
                    max_len.parse().map_err(|_| ConfigError::EnvParse {
                        key: "AEGIS_CLAW_MAX_INPUT_LENGTH".to_string(),
                        message: "must be a positive integer".to_string(),
                    })?;
            }
        }

        self.base.validate()?;
        Ok(self.base)
    }
}

fn apply_overrides(base: &mut AegisClawConfig, o: ConfigOverrides) {
    macro_rules! take {
        ($field:ident) => {
            if let Some(v) = o.$field {
                base.$field = v;
            }
        };
    }
    take!(log_level);
    take!(max_input_length);
    take!(safety_threshold);
    take!(anomaly_threshold);
    take!(anomaly_special_char_ratio);
    take!(anomaly_zero_width_min);
    take!(confidence_critical);
    take!(confidence_high);
    take!(confidence_medium);
    take!(confidence_low);
    take!(multi_match_bonus);
    take!(multi_match_max_bonus);
    take!(approve_confidence);
    take!(block_confidence);
    take!(modify_confidence);
    take!(escalate_confidence);
    take!(reask_confidence);
    take!(rate_limit_enabled);
    take!(rate_limit_max_requests);
    take!(rate_limit_window_seconds);
    take!(rate_limit_block_seconds);
}
