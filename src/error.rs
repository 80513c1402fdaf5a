//! Error types for clinic-assistant.
//!
//! This module defines all error types used throughout the system.
//! Tool-level failures the model should see are plain strings; these
//! types cover everything that can go wrong underneath them.

use thiserror::Error;

/// Main error type for clinic-assistant operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Tool errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// LLM errors
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Agent errors
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for clinic-assistant.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the slot file and the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid value in row {row}, column '{column}': {value}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors related to tool dispatch.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Errors talking to the language model endpoint.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model returned no choices")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request(err.to_string())
    }
}

/// Errors raised while running the agent graph.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Step limit of {0} reached without a final answer")]
    StepLimit(u32),

    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl From<StoreError> for AgentError {
    fn from(err: StoreError) -> Self {
        AgentError::Checkpoint(err.to_string())
    }
}

/// Errors related to the Gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Agent error: {0}")]
    AgentError(String),
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        GatewayError::SessionError(err.to_string())
    }
}

impl From<AgentError> for GatewayError {
    fn from(err: AgentError) -> Self {
        GatewayError::AgentError(err.to_string())
    }
}

/// Errors related to Sessions.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,
}

/// Errors related to Configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}
