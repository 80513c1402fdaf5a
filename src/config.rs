//! Application configuration.
//!
//! Settings come from an optional JSON file, then environment variables
//! (a `.env` file is loaded by the binary before this runs), then CLI flags.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable holding the model API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model endpoint
    #[serde(default)]
    pub llm: LlmConfig,

    /// Where slots and appointments live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation loop
    #[serde(default)]
    pub agent: AgentSettings,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Browser sessions
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Never written to disk; read from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// Which store the tools run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Availability sheet on disk
    #[default]
    Csv,
    /// Appointment documents in SQLite
    Document,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Csv => write!(f, "csv"),
            Backend::Document => write!(f, "document"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Availability sheet
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,

    /// Document store file; required for the document backend
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Appointment collection
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Conversation checkpoints; in memory when unset
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,
}

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Thread used by the terminal chat
    #[serde(default = "default_thread_id")]
    pub thread_id: String,

    /// Node executions allowed per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout in seconds
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,

    /// Maximum live sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout() -> u64 {
    60
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("doctor_availability.csv")
}

fn default_collection() -> String {
    "appointments".to_string()
}

fn default_thread_id() -> String {
    "10".to_string()
}

fn default_max_steps() -> u32 {
    25
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_true() -> bool {
    true
}

fn default_session_timeout() -> u64 {
    3600 // 1 hour
}

fn default_max_sessions() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            agent: AgentSettings::default(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            api_key: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            csv_path: default_csv_path(),
            database_path: None,
            collection: default_collection(),
            checkpoint_path: None,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            thread_id: default_thread_id(),
            max_steps: default_max_steps(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_session_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from any variable lookup.
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup(API_KEY_ENV) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(path) = lookup("CLINIC_CSV_PATH") {
            self.storage.csv_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("CLINIC_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(name) = lookup("CLINIC_COLLECTION") {
            self.storage.collection = name;
        }
        if let Some(path) = lookup("CLINIC_CHECKPOINT_DB") {
            self.storage.checkpoint_path = Some(PathBuf::from(path));
        }
    }

    /// The model API key, which must be present for anything that talks to the model.
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.llm
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired(API_KEY_ENV.to_string()))
    }

    /// The document store path, required by the document backend and seeding.
    pub fn database_path(&self) -> Result<&Path, ConfigError> {
        self.storage
            .database_path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired("CLINIC_DB_PATH".to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Note: port 0 is valid - it means "let the OS assign a port"

        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "llm.base_url".to_string(),
                reason: "Base URL must not be empty".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "llm.temperature".to_string(),
                reason: "Temperature must be between 0.0 and 2.0".to_string(),
            });
        }

        if self.agent.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "agent.max_steps".to_string(),
                reason: "At least one step is required".to_string(),
            });
        }

        if self.storage.collection.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "storage.collection".to_string(),
                reason: "Collection name must not be empty".to_string(),
            });
        }

        if self.storage.backend == Backend::Document {
            self.database_path()?;
        }

        if self.session.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.timeout_seconds".to_string(),
                reason: "Timeout must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Get the server address string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Create a configuration for testing.
    pub fn for_testing() -> Self {
        Self {
            llm: LlmConfig {
                api_key: Some("test-key".to_string()),
                ..Default::default()
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // OS will assign a port
                cors_enabled: true,
            },
            session: SessionConfig {
                timeout_seconds: 60,
                max_sessions: 10,
            },
            ..Default::default()
        }
    }
}
