use crate::ml::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Model bundle configuration
    pub model: ModelConfig,

    /// Side-effect dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Doctor ranking weights
    #[serde(default)]
    pub recommender: RecommenderConfig,

    /// Advisory rendering
    #[serde(default)]
    pub advisory: AdvisoryConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("TRIAGE_CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: TRIAGE_)
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Configuration built only from the embedded defaults
    pub fn embedded() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

/// Where the classifier comes from at startup
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    /// Load a previously trained artifact
    #[default]
    Artifact,
    /// Train from the catalogue on boot
    Train,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub source: ModelSource,

    /// Trained artifact location
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Catalogue override; the embedded catalogue is used when absent
    #[serde(default)]
    pub catalogue_path: Option<PathBuf>,

    #[serde(default)]
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Outbound queue capacity, split evenly across the workers
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Number of background workers
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Max retry attempts per message
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff (milliseconds), doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            worker_threads: default_worker_threads(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommenderConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Points per step of specialty relevance
    #[serde(default = "default_rank_step")]
    pub rank_step: u32,

    #[serde(default = "default_experience_cap")]
    pub experience_cap: u32,

    #[serde(default = "default_high_risk_specialist_bonus")]
    pub high_risk_specialist_bonus: u32,

    #[serde(default = "default_low_risk_generalist_bonus")]
    pub low_risk_generalist_bonus: u32,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            rank_step: default_rank_step(),
            experience_cap: default_experience_cap(),
            high_risk_specialist_bonus: default_high_risk_specialist_bonus(),
            low_risk_generalist_bonus: default_low_risk_generalist_bonus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvisoryConfig {
    #[serde(default = "default_max_items_per_section")]
    pub max_items_per_section: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            max_items_per_section: default_max_items_per_section(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "symptom-triage".to_string()
}

fn default_true() -> bool {
    true
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/triage-model.bin")
}

fn default_queue_size() -> usize {
    1024
}

fn default_worker_threads() -> usize {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_max_results() -> usize {
    3
}

fn default_rank_step() -> u32 {
    20
}

fn default_experience_cap() -> u32 {
    30
}

fn default_high_risk_specialist_bonus() -> u32 {
    30
}

fn default_low_risk_generalist_bonus() -> u32 {
    20
}

fn default_max_items_per_section() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_http_port(), 8080);
        assert_eq!(default_log_level(), "info");
        assert!(default_true());
        assert_eq!(RecommenderConfig::default().max_results, 3);
        assert_eq!(AdvisoryConfig::default().max_items_per_section, 4);
    }

    #[test]
    fn test_embedded_config_parses() {
        let config = Config::embedded().unwrap();
        assert_eq!(config.model.source, ModelSource::Artifact);
        assert_eq!(config.model.training.n_trees, 100);
        assert_eq!(config.recommender, RecommenderConfig::default());
        assert_eq!(config.dispatch.max_retries, 3);
    }
}
