//! Error types for the Dispatch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Dispatch operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Vault errors ---
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

// --- Bounded context errors ---

/// Failures of a model-service call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the knowledge store, memory ledger and history files.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Invalid vault path: {0}")]
    InvalidPath(String),

    #[error("Storage error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Corrupt record at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

impl VaultError {
    /// Wrap an `std::io::Error` with the path it happened on.
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "Overloaded".into(),
        });
        assert!(err.to_string().contains("529"));
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn vault_error_carries_path() {
        let err = VaultError::io(
            "Jobs/offer.md",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        );
        let text = Error::from(err).to_string();
        assert!(text.contains("Jobs/offer.md"));
        assert!(text.contains("read-only"));
    }

    #[test]
    fn unknown_tool_is_typed() {
        let err = ToolError::NotFound("delete_vault".into());
        assert_eq!(err.to_string(), "Tool not found: delete_vault");
    }
}
