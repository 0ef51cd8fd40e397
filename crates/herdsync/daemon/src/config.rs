//! Configuration for herdsync-daemon

use herdsync_notify::channels::KANNADA_TEMPLATE;
use herdsync_types::REQUIRED_FEATURES;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Read API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Twin store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Classifier artifact
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-run pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Periodic sweep
    #[serde(default)]
    pub sync: SyncConfig,

    /// Notification channels
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            enable_cors: true,
        }
    }
}

/// Twin store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory store, optionally seeded from a JSON array of twin documents
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed_file: Option<PathBuf>,
    },

    /// Remote digital-twins REST endpoint
    Http {
        #[serde(default = "default_endpoint")]
        endpoint: String,

        #[serde(default = "default_api_version")]
        api_version: String,

        /// Name of the environment variable holding the bearer token
        #[serde(default = "default_token_env")]
        token_env: String,

        #[serde(default = "default_request_timeout_ms")]
        request_timeout_ms: u64,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { seed_file: None }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Attributes every twin must carry, in reporting order
    #[serde(default = "default_required_features")]
    pub required_features: Vec<String>,

    /// Attribute the predicted label is written to
    #[serde(default = "default_target_field")]
    pub target_field: String,

    /// Label that does not raise a notification (case-insensitive)
    #[serde(default = "default_normal_label")]
    pub normal_label: String,

    /// Timeout for each individual store call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_transient_retries: u32,

    #[serde(default = "default_max_retries")]
    pub max_conflict_retries: u32,

    /// How long a run waits for another run on the same twin
    #[serde(default = "default_lease_timeout_ms")]
    pub lease_timeout_ms: u64,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_features: default_required_features(),
            target_field: default_target_field(),
            normal_label: default_normal_label(),
            call_timeout_ms: default_call_timeout_ms(),
            max_transient_retries: default_max_retries(),
            max_conflict_retries: default_max_retries(),
            lease_timeout_ms: default_lease_timeout_ms(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }
}

/// Backoff configuration for retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial backoff delay (milliseconds)
    pub initial_delay_ms: u64,

    /// Maximum backoff delay (milliseconds)
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Add jitter to delays
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Twins visited on every sweep
    #[serde(default = "default_twin_ids")]
    pub twin_ids: Vec<String>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum runs in flight across distinct twins
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_runs: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            twin_ids: default_twin_ids(),
            interval_secs: default_interval_secs(),
            max_concurrent_runs: default_max_concurrent(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Abnormal labels reported with `info` severity instead of `alert`
    #[serde(default = "default_info_labels")]
    pub info_labels: Vec<String>,

    #[serde(default = "default_channel_timeout_ms")]
    pub channel_timeout_ms: u64,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub translated: TranslatedConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            info_labels: default_info_labels(),
            channel_timeout_ms: default_channel_timeout_ms(),
            voice: VoiceConfig::default(),
            translated: TranslatedConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

/// Spoken alerts via an external program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_voice_program")]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_voice_program(),
            args: Vec::new(),
        }
    }
}

/// Translated text alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Must contain `{label}`
    #[serde(default = "default_translated_template")]
    pub template: String,

    /// JSON-lines file; alerts are logged when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl Default for TranslatedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            template: default_translated_template(),
            output_path: None,
        }
    }
}

/// Push webhook
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://Cow-DigitalTwinModel.api.wcus.digitaltwins.azure.net".to_string()
}

fn default_api_version() -> String {
    herdsync_store::DEFAULT_API_VERSION.to_string()
}

fn default_token_env() -> String {
    "HERDSYNC_STORE_TOKEN".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("cow_health_model.json")
}

fn default_required_features() -> Vec<String> {
    REQUIRED_FEATURES.iter().map(|s| s.to_string()).collect()
}

fn default_target_field() -> String {
    "predictionLabel".to_string()
}

fn default_normal_label() -> String {
    "normal".to_string()
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_lease_timeout_ms() -> u64 {
    30_000
}

fn default_twin_ids() -> Vec<String> {
    vec!["co-01".to_string()]
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    8
}

fn default_info_labels() -> Vec<String> {
    vec!["estrus".to_string()]
}

fn default_channel_timeout_ms() -> u64 {
    10_000
}

fn default_voice_program() -> String {
    "espeak".to_string()
}

fn default_translated_template() -> String {
    KANNADA_TEMPLATE.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `HERDSYNC_*` environment variables (`__` separates sections).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        // Add environment variables with HERDSYNC_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("HERDSYNC")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sync.twin_ids")
                .with_list_parse_key("notify.info_labels")
                .with_list_parse_key("pipeline.required_features")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings that would make every run fail.
    pub fn validate(&self) -> Result<(), String> {
        if self.pipeline.target_field.trim().is_empty() {
            return Err("pipeline.target_field must not be empty".to_string());
        }
        if self.pipeline.call_timeout_ms == 0 || self.pipeline.lease_timeout_ms == 0 {
            return Err("pipeline timeouts must be greater than zero".to_string());
        }
        if self.pipeline.backoff.multiplier < 1.0 {
            return Err("pipeline.backoff.multiplier must be at least 1.0".to_string());
        }
        if self.sync.max_concurrent_runs == 0 {
            return Err("sync.max_concurrent_runs must be greater than zero".to_string());
        }
        if self.sync.interval_secs == 0 {
            return Err("sync.interval_secs must be greater than zero".to_string());
        }
        if self.notify.webhook.enabled && self.notify.webhook.url.is_none() {
            return Err("notify.webhook.url is required when the webhook is enabled".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8000);
        assert!(matches!(config.store, StoreConfig::Memory { seed_file: None }));
        assert_eq!(config.pipeline.required_features.len(), 11);
        assert_eq!(config.pipeline.target_field, "predictionLabel");
        assert_eq!(config.sync.twin_ids, vec!["co-01"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_transient_retries, 3);
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.lease_timeout(), Duration::from_secs(30));
        assert!(config.backoff.jitter);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("herdsync-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[store]
kind = "http"
endpoint = "https://twins.example.net"

[sync]
twin_ids = ["co-01", "co-02"]
interval_secs = 15

[notify.webhook]
enabled = true
url = "https://hooks.example.net/alerts"
"#
        )
        .unwrap();

        let config = DaemonConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        match &config.store {
            StoreConfig::Http {
                endpoint,
                token_env,
                ..
            } => {
                assert_eq!(endpoint, "https://twins.example.net");
                assert_eq!(token_env, "HERDSYNC_STORE_TOKEN");
            }
            other => panic!("unexpected store config: {:?}", other),
        }
        assert_eq!(config.sync.twin_ids, vec!["co-01", "co-02"]);
        assert_eq!(config.sync.interval_secs, 15);
        // untouched sections keep their defaults
        assert_eq!(config.pipeline.max_conflict_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = DaemonConfig::default();
        config.notify.webhook.enabled = true;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.sync.max_concurrent_runs = 0;
        assert!(config.validate().is_err());
    }
}
