//! Error taxonomy returned to callers.
//!
//! Every failure of the pipeline is converted into a [`DeployError`] at the
//! orchestrator boundary and carries one of the stable [`ErrorCode`]s; nothing
//! escapes as an opaque panic.

use serde::Serialize;

/// Stable error codes surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed mode selection, missing companion field, or an empty
    /// resulting file set.
    ValidationError,
    /// Referenced existing project or stored source is unavailable
    /// (changes mode only).
    NotFound,
    /// Pre- or post-bundle byte budget exceeded.
    SizeLimit,
    /// Entry detection, specifier resolution, remote fetch, or toolchain
    /// compilation failure.
    BundleFailed,
    /// Upload to the control plane failed after a successful bundle.
    DeployFailed,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::SizeLimit => "SIZE_LIMIT",
            ErrorCode::BundleFailed => "BUNDLE_FAILED",
            ErrorCode::DeployFailed => "DEPLOY_FAILED",
        };
        write!(f, "{}", code)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound {
        message: String,
        suggestion: Option<String>,
    },

    #[error("{message}")]
    SizeLimit { message: String },

    #[error("{message}")]
    BundleFailed { message: String },

    #[error("{message}")]
    DeployFailed { message: String },
}

impl DeployError {
    pub fn validation(message: impl Into<String>) -> Self {
        DeployError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, suggestion: Option<String>) -> Self {
        DeployError::NotFound {
            message: message.into(),
            suggestion,
        }
    }

    pub fn size_limit(message: impl Into<String>) -> Self {
        DeployError::SizeLimit {
            message: message.into(),
        }
    }

    pub fn bundle_failed(message: impl Into<String>) -> Self {
        DeployError::BundleFailed {
            message: message.into(),
        }
    }

    pub fn deploy_failed(message: impl Into<String>) -> Self {
        DeployError::DeployFailed {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DeployError::Validation { .. } => ErrorCode::ValidationError,
            DeployError::NotFound { .. } => ErrorCode::NotFound,
            DeployError::SizeLimit { .. } => ErrorCode::SizeLimit,
            DeployError::BundleFailed { .. } => ErrorCode::BundleFailed,
            DeployError::DeployFailed { .. } => ErrorCode::DeployFailed,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            DeployError::NotFound { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    /// Machine-readable shape for the serverless response body.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            suggestion: self.suggestion().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_serialize_screaming_snake() {
        let code = serde_json::to_string(&ErrorCode::ValidationError).unwrap();
        assert_eq!(code, "\"VALIDATION_ERROR\"");
        assert_eq!(ErrorCode::SizeLimit.to_string(), "SIZE_LIMIT");
    }

    #[test]
    fn test_report_carries_suggestion() {
        let err = DeployError::not_found(
            "project 'p-1' has no stored source",
            Some("Pass the full file set with `files` instead".to_string()),
        );
        let report = err.report();
        assert_eq!(report.code, ErrorCode::NotFound);
        assert!(report.suggestion.unwrap().contains("files"));
    }
}
