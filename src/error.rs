//! Error types for the farm advisory orchestrator

use thiserror::Error;

use crate::models::AdvisorKind;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AdvisoryError>;

#[derive(Error, Debug)]
pub enum AdvisoryError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Orchestration error: {0}")]
    OrchestrationError(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Voice service error: {0}")]
    VoiceError(String),

    #[error("API key not configured: {0}")]
    MissingApiKey(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of a single advisor during a multi-advisor turn.
///
/// Deliberately separate from [`AdvisoryError`]: the orchestrator substitutes
/// a localized apology for these instead of failing the turn, and keeping the
/// substitution at the call site makes the partial-failure contract testable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdvisorError {
    #[error("{0:?} advisor is not initialized")]
    NotInitialized(AdvisorKind),

    #[error("{kind:?} advisor failed: {detail}")]
    Internal { kind: AdvisorKind, detail: String },
}

impl AdvisorError {
    pub fn kind(&self) -> AdvisorKind {
        match self {
            AdvisorError::NotInitialized(kind) => *kind,
            AdvisorError::Internal { kind, .. } => *kind,
        }
    }
}
