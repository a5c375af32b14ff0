//! Monitor configuration — all tuning knobs as operator-editable TOML
//!
//! Every threshold factor and policy constant that was tuned empirically is
//! a field here. Each section implements `Default` with values matching the
//! original tuning, so behavior is unchanged when no config file is present.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "VIBROMON_CONFIG";

/// Default config file name searched in the working directory.
pub const CONFIG_FILE: &str = "vibromon.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Root configuration for one sensor deployment.
///
/// Load with [`MonitorConfig::load`], which searches:
/// 1. `$VIBROMON_CONFIG`
/// 2. `./vibromon.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub serial: SerialConfig,
    pub collector: CollectorConfig,
    pub baseline: BaselineConfig,
    pub thresholds: ThresholdConfig,
    pub detector: DetectorConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            match Self::load_from_file(Path::new(&path)) {
                Ok(config) => {
                    info!(path = %path, "Loaded monitor config from {CONFIG_ENV_VAR}");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                }
            }
        }

        let local = Path::new(CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {CONFIG_FILE} found — using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work, before they reach the
    /// pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn ordered(
            field: &'static str,
            warning: f64,
            critical: f64,
        ) -> Result<(), ConfigError> {
            if !(warning > 0.0 && critical > warning) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!(
                        "need 0 < warning < critical, got {warning} / {critical}"
                    ),
                });
            }
            Ok(())
        }

        let t = &self.thresholds;
        ordered("thresholds.rms_factor", t.warning_rms_factor, t.critical_rms_factor)?;
        ordered("thresholds.peak_factor", t.warning_peak_factor, t.critical_peak_factor)?;
        ordered("thresholds.crest_factor", t.warning_crest_factor, t.critical_crest_factor)?;

        if t.temp_sigma <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "thresholds.temp_sigma",
                message: format!("must be positive, got {}", t.temp_sigma),
            });
        }

        let d = &self.detector;
        if !(d.hysteresis_ratio > 0.0 && d.hysteresis_ratio <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "detector.hysteresis_ratio",
                message: format!("must be in (0, 1], got {}", d.hysteresis_ratio),
            });
        }
        if d.min_consecutive == 0 {
            return Err(ConfigError::Invalid {
                field: "detector.min_consecutive",
                message: "must be at least 1".to_string(),
            });
        }
        if !(1..=100).contains(&d.percentile_warning)
            || !(1..=100).contains(&d.percentile_critical)
            || d.percentile_warning >= d.percentile_critical
        {
            return Err(ConfigError::Invalid {
                field: "detector.percentiles",
                message: format!(
                    "need 1 ≤ warning < critical ≤ 100, got {} / {}",
                    d.percentile_warning, d.percentile_critical
                ),
            });
        }

        if self.baseline.min_samples < 2 {
            return Err(ConfigError::Invalid {
                field: "baseline.min_samples",
                message: "must be at least 2".to_string(),
            });
        }

        if self.collector.collection_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "collector.collection_interval_ms",
                message: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}

/// Physical link settings (RS-485 adapter, Modbus RTU).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    /// Modbus bus address of the sensor
    pub device_id: u8,
    /// Per-request response deadline
    pub response_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            device_id: 0x50,
            response_timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Ring capacity of the sample buffer
    pub buffer_capacity: usize,
    /// Target cycle cadence
    pub collection_interval_ms: u64,
    /// Consecutive failed cycles before the session is declared lost
    pub max_consecutive_errors: u32,
    /// Transport attempts per register block within one cycle
    pub read_retries: u32,
    /// Cap for the doubling failure backoff
    pub max_backoff_ms: u64,
    /// Bounded wait when joining the worker on stop
    pub stop_timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            collection_interval_ms: 100,
            max_consecutive_errors: 5,
            read_retries: 2,
            max_backoff_ms: 5000,
            stop_timeout_ms: 5000,
        }
    }
}

impl CollectorConfig {
    pub fn collection_interval(&self) -> Duration {
        Duration::from_millis(self.collection_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Baseline acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Minimum window length for a valid baseline
    pub min_samples: usize,
    /// Maximum axes allowed to show zero variance
    pub max_zero_std_axes: usize,
    /// Standard deviation at or below this counts as zero variance
    pub zero_std_epsilon: f64,
    /// High-frequency energy cutoff for acceleration features
    pub hf_min_freq_hz: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            min_samples: 30,
            max_zero_std_axes: 6,
            zero_std_epsilon: 1e-12,
            hf_min_freq_hz: 2000.0,
        }
    }
}

/// Threshold derivation factors applied to baseline features.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub warning_rms_factor: f64,
    pub critical_rms_factor: f64,
    pub warning_peak_factor: f64,
    pub critical_peak_factor: f64,
    pub warning_crest_factor: f64,
    pub critical_crest_factor: f64,
    /// k in `warning = mean + k·σ` for slowly varying axes
    pub temp_sigma: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning_rms_factor: 2.0,
            critical_rms_factor: 3.0,
            warning_peak_factor: 2.0,
            critical_peak_factor: 3.0,
            warning_crest_factor: 1.5,
            critical_crest_factor: 2.0,
            temp_sigma: 2.0,
        }
    }
}

/// State machine and evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Fraction of a threshold below which a raised state still holds
    pub hysteresis_ratio: f64,
    /// Consecutive over-threshold readings required for promotion
    pub min_consecutive: u32,
    /// High-frequency energy cutoff for evaluation-time metrics
    pub hf_min_freq_hz: f64,
    /// Bounded in-memory evaluation history
    pub history_limit: usize,
    /// Percentile pair for the fallback threshold policy
    pub percentile_warning: usize,
    pub percentile_critical: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hysteresis_ratio: 0.9,
            min_consecutive: 3,
            hf_min_freq_hz: 2000.0,
            history_limit: 100,
            percentile_warning: 95,
            percentile_critical: 99,
        }
    }
}
