//! Error types for the Luxera core
//!
//! This module provides structured error handling using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, LuxeraError>;

/// Errors that can occur in the lighting-design core
#[derive(Error, Debug)]
pub enum LuxeraError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Input violated a precondition (unknown id, bad range, impossible placement)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Import pipeline stage failed with structured details
    #[error("Import error in stage {stage}: {message}")]
    Import { stage: String, message: String },

    /// Import PolicyGate marked geometry extreme without override
    #[error("Policy blocked: {message}")]
    PolicyBlocked { message: String },

    /// Agent-sourced operation needs human approval
    #[error("Operation {op_name} requires approval")]
    ApprovalRequired { op_name: String },

    /// Replay detected a broken audit hash chain
    #[error("Hash mismatch at event {index}: expected {expected}, found {found}")]
    HashMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// Backend computation failed
    #[error("Runner error: {message}")]
    Runner { message: String },

    /// An opening cannot be placed on its host wall
    #[error("Opening {opening_id} does not fit host wall")]
    OpeningDoesNotFit { opening_id: String },

    /// A wall surface has no usable local frame
    #[error("Invalid wall basis for surface {surface_id}")]
    InvalidWallBasis { surface_id: String },

    /// A transaction is already active, or none is
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Project file not found
    #[error("Project file not found: {path}")]
    ProjectNotFound { path: PathBuf },

    /// Job was cancelled cooperatively
    #[error("Job cancelled: {job_id}")]
    Cancelled { job_id: String },

    /// Tool not registered, or called outside the tool surface
    #[error("Tool error: {message}")]
    Tool { message: String },
}

impl LuxeraError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LuxeraError::Validation {
            message: message.into(),
        }
    }

    /// Create an import-stage error
    pub fn import(stage: impl Into<String>, message: impl Into<String>) -> Self {
        LuxeraError::Import {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a runner error
    pub fn runner(message: impl Into<String>) -> Self {
        LuxeraError::Runner {
            message: message.into(),
        }
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        LuxeraError::Transaction {
            message: message.into(),
        }
    }

    /// Create a tool error
    pub fn tool(message: impl Into<String>) -> Self {
        LuxeraError::Tool {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = LuxeraError::validation("unknown room: r9");
        assert!(err.to_string().contains("unknown room: r9"));
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }

    #[test]
    fn test_approval_required_display() {
        let err = LuxeraError::ApprovalRequired {
            op_name: "create_room".to_string(),
        };
        assert!(err.to_string().contains("create_room"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: LuxeraError = io_err.into();
        assert!(matches!(err, LuxeraError::Io(_)));
    }

    #[test]
    fn test_hash_mismatch_fields() {
        let err = LuxeraError::HashMismatch {
            index: 3,
            expected: "abc".to_string(),
            found: "def".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("abc"));
        assert!(s.contains("def"));
    }

    #[test]
    fn test_opening_does_not_fit_display() {
        let err = LuxeraError::OpeningDoesNotFit {
            opening_id: "op1".to_string(),
        };
        assert!(err.to_string().contains("op1"));
    }
}
