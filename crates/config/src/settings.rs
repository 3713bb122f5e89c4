//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    clarification, confidence, context, corrections, critical, endpoints, retry_queue, timeouts,
};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    /// Confirmation gate thresholds and correction tracking
    #[serde(default)]
    pub gate: GateConfig,

    /// Conversation context store limits
    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub clarification: ClarificationConfig,

    #[serde(default)]
    pub retry_queue: RetryQueueConfig,

    /// Domain action executor
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Optional semantic classifier/extractor
    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Concurrent conversations held in memory
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle conversations are dropped after this many seconds
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
}

fn default_max_sessions() -> usize {
    1000
}
fn default_session_timeout() -> u64 {
    3600
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_request_timeout(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

/// Confirmation gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,

    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f64,

    /// Thresholds applied once the user corrects us often
    #[serde(default = "default_tightened_high")]
    pub tightened_high_confidence: f64,

    #[serde(default = "default_tightened_medium")]
    pub tightened_medium_confidence: f64,

    /// Amounts above this always need explicit confirmation
    #[serde(default = "default_critical_amount")]
    pub critical_amount: f64,

    #[serde(default = "default_correction_window_days")]
    pub correction_window_days: i64,

    /// More corrections than this inside the window tightens thresholds
    #[serde(default = "default_correction_trigger")]
    pub correction_trigger: usize,

    #[serde(default = "default_max_corrections")]
    pub max_corrections: usize,

    #[serde(default = "default_mapping_min_count")]
    pub mapping_min_count: u32,
}

fn default_high_confidence() -> f64 {
    confidence::HIGH
}
fn default_medium_confidence() -> f64 {
    confidence::MEDIUM
}
fn default_tightened_high() -> f64 {
    confidence::TIGHTENED_HIGH
}
fn default_tightened_medium() -> f64 {
    confidence::TIGHTENED_MEDIUM
}
fn default_critical_amount() -> f64 {
    critical::AMOUNT_THRESHOLD
}
fn default_correction_window_days() -> i64 {
    corrections::WINDOW_DAYS
}
fn default_correction_trigger() -> usize {
    corrections::TIGHTEN_AFTER
}
fn default_max_corrections() -> usize {
    corrections::MAX_HISTORY
}
fn default_mapping_min_count() -> u32 {
    corrections::MAPPING_MIN_COUNT
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            high_confidence: default_high_confidence(),
            medium_confidence: default_medium_confidence(),
            tightened_high_confidence: default_tightened_high(),
            tightened_medium_confidence: default_tightened_medium(),
            critical_amount: default_critical_amount(),
            correction_window_days: default_correction_window_days(),
            correction_trigger: default_correction_trigger(),
            max_corrections: default_max_corrections(),
            mapping_min_count: default_mapping_min_count(),
        }
    }
}

/// Conversation context store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Entities remembered per type
    #[serde(default = "default_per_type_capacity")]
    pub per_type_capacity: usize,

    /// Same value re-mentioned within this window is not re-added
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: i64,

    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_per_type_capacity() -> usize {
    context::PER_TYPE_CAPACITY
}
fn default_dedup_window() -> i64 {
    context::DEDUP_WINDOW_SECS
}
fn default_max_turns() -> usize {
    context::MAX_TURNS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            per_type_capacity: default_per_type_capacity(),
            dedup_window_secs: default_dedup_window(),
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    clarification::HISTORY_LIMIT
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

/// Retry queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryQueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Failed attempts before an entry is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,

    /// Key under which the queue is persisted
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Background processing interval; 0 disables the background task
    #[serde(default = "default_process_interval")]
    pub process_interval_secs: u64,
}

fn default_queue_capacity() -> usize {
    retry_queue::CAPACITY
}
fn default_max_retries() -> u8 {
    retry_queue::MAX_RETRIES
}
fn default_storage_key() -> String {
    retry_queue::STORAGE_KEY.to_string()
}
fn default_process_interval() -> u64 {
    retry_queue::PROCESS_INTERVAL_SECS
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            storage_key: default_storage_key(),
            process_interval_secs: default_process_interval(),
        }
    }
}

/// Domain action executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_endpoint")]
    pub endpoint: String,

    /// Polled by the connectivity probe
    #[serde(default = "default_executor_health")]
    pub health_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout
    #[serde(default = "default_executor_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_connectivity_timeout")]
    pub connectivity_timeout_ms: u64,
}

fn default_executor_endpoint() -> String {
    std::env::var("FARMHAND_EXECUTOR_URL")
        .unwrap_or_else(|_| endpoints::EXECUTOR_DEFAULT.to_string())
}
fn default_executor_health() -> String {
    endpoints::EXECUTOR_HEALTH_DEFAULT.to_string()
}
fn default_executor_timeout() -> u64 {
    timeouts::EXECUTOR_MS
}
fn default_connectivity_timeout() -> u64 {
    timeouts::CONNECTIVITY_MS
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_executor_endpoint(),
            health_url: default_executor_health(),
            api_key: None,
            timeout_ms: default_executor_timeout(),
            connectivity_timeout_ms: default_connectivity_timeout(),
        }
    }
}

/// Semantic (LLM) helper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Disabled means rule-based only
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_semantic_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_semantic_model")]
    pub model: String,

    #[serde(default = "default_semantic_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_semantic_retries")]
    pub max_retries: u32,
}

fn default_semantic_endpoint() -> String {
    std::env::var("OLLAMA_URL").unwrap_or_else(|_| endpoints::OLLAMA_DEFAULT.to_string())
}
fn default_semantic_model() -> String {
    "qwen2.5:3b-instruct".to_string()
}
fn default_semantic_timeout() -> u64 {
    timeouts::SEMANTIC_MS
}
fn default_semantic_retries() -> u32 {
    1
}

impl SemanticConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_semantic_endpoint(),
            model: default_semantic_model(),
            timeout_ms: default_semantic_timeout(),
            max_retries: default_semantic_retries(),
        }
    }
}

/// Storage backend for the key-value store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Lost on restart; tests and local experiments only
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    std::env::var("FARMHAND_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_gate()?;
        self.validate_limits()?;
        self.validate_timeouts()?;

        if self.environment.is_production() && self.persistence.backend == StorageBackend::Memory {
            return Err(ConfigError::InvalidValue {
                field: "persistence.backend".to_string(),
                message: "In-memory storage loses the retry queue on restart".to_string(),
            });
        }

        Ok(())
    }

    fn validate_gate(&self) -> Result<(), ConfigError> {
        let gate = &self.gate;

        for (field, value) in [
            ("gate.high_confidence", gate.high_confidence),
            ("gate.medium_confidence", gate.medium_confidence),
            ("gate.tightened_high_confidence", gate.tightened_high_confidence),
            ("gate.tightened_medium_confidence", gate.tightened_medium_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("Must be between 0.0 and 1.0, got {}", value),
                });
            }
        }

        if gate.medium_confidence >= gate.high_confidence {
            return Err(ConfigError::InvalidValue {
                field: "gate.medium_confidence".to_string(),
                message: format!(
                    "Must be below gate.high_confidence ({})",
                    gate.high_confidence
                ),
            });
        }

        // Tightening only ever raises thresholds
        if gate.tightened_high_confidence < gate.high_confidence
            || gate.tightened_medium_confidence < gate.medium_confidence
        {
            return Err(ConfigError::InvalidValue {
                field: "gate.tightened_high_confidence".to_string(),
                message: "Tightened thresholds must not be lower than the base thresholds"
                    .to_string(),
            });
        }

        if gate.critical_amount <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "gate.critical_amount".to_string(),
                message: "Must be positive".to_string(),
            });
        }

        if gate.correction_window_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "gate.correction_window_days".to_string(),
                message: "Must be at least one day".to_string(),
            });
        }

        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        let checks = [
            ("context.per_type_capacity", self.context.per_type_capacity),
            ("context.max_turns", self.context.max_turns),
            ("clarification.history_limit", self.clarification.history_limit),
            ("retry_queue.capacity", self.retry_queue.capacity),
            ("gate.max_corrections", self.gate.max_corrections),
            ("server.max_sessions", self.server.max_sessions),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Must be greater than zero".to_string(),
                });
            }
        }

        if self.retry_queue.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry_queue.max_retries".to_string(),
                message: "Must allow at least one attempt".to_string(),
            });
        }

        if self.retry_queue.storage_key.trim().is_empty() {
            return Err(ConfigError::MissingField("retry_queue.storage_key".to_string()));
        }

        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        if self.executor.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "executor.timeout_ms".to_string(),
                message: "A per-call timeout is mandatory".to_string(),
            });
        }

        if self.semantic.enabled && self.semantic.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "semantic.timeout_ms".to_string(),
                message: "A per-call timeout is mandatory".to_string(),
            });
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port must be non-zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Load settings from `config/default.*`, `config/{env}.*` and the
/// environment.
///
/// Priority: env vars > config/{env} > config/default > defaults.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("FARMHAND")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

/// Load settings from a single explicit file (YAML, TOML or JSON)
pub fn load_settings_from_file(path: impl AsRef<Path>) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config = Config::builder()
        .add_source(File::from(path))
        .build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;
    tracing::debug!(path = %path.display(), "Loaded settings from file");

    Ok(settings)
}
