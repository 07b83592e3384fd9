//! Error types for the tutorflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each stage of the pipeline has its own error enum; the controller converts
//! every one of them into a structured reply, so none of these ever reach a
//! caller as a raw fault.

use thiserror::Error;

/// The top-level error type for tutorflow operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the classification/extraction model collaborator.
///
/// Strategies treat every variant the same way: the tier failed and the next
/// one runs.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of a tool collaborator, normalized by the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Connection error, timeout, or 5xx — still failing after the retry.
    #[error("Tool '{tool_id}' unavailable after {attempts} attempt(s): {cause}")]
    Transient {
        tool_id: String,
        attempts: u32,
        cause: String,
    },

    /// 4xx from the tool: the request did not match the tool's contract.
    #[error("Tool '{tool_id}' rejected the request (status {status}): {body}")]
    Rejected {
        tool_id: String,
        status: u16,
        body: String,
    },

    /// The tool answered 2xx but reported `success: false`.
    #[error("Tool '{tool_id}' reported a failure: {message}")]
    ToolFailed { tool_id: String, message: String },

    #[error("Tool '{tool_id}' returned an unreadable response: {cause}")]
    Malformed { tool_id: String, cause: String },

    #[error("Tool not configured: {0}")]
    NotConfigured(String),
}

impl DispatchError {
    /// The identifier of the tool that failed.
    pub fn tool_id(&self) -> &str {
        match self {
            Self::Transient { tool_id, .. }
            | Self::Rejected { tool_id, .. }
            | Self::ToolFailed { tool_id, .. }
            | Self::Malformed { tool_id, .. } => tool_id,
            Self::NotConfigured(tool_id) => tool_id,
        }
    }
}

/// Terminal parameter-extraction failure: required fields that stayed
/// missing or invalid after fallback defaults were applied.
#[derive(Debug, Clone, Error)]
#[error("Missing or invalid parameters for '{tool_id}': {}", missing.join(", "))]
pub struct ExtractionError {
    pub tool_id: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History storage error: {0}")]
    Storage(String),
}
