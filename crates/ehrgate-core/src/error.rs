use thiserror::Error;

/// Core error types for ehrgate model parsing and validation
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid sensitivity level: {0}")]
    InvalidSensitivity(String),

    #[error("Invalid clearance level: {0}")]
    InvalidClearance(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid record data: {message}")]
    InvalidRecord { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidDataType error
    pub fn invalid_data_type(value: impl Into<String>) -> Self {
        Self::InvalidDataType(value.into())
    }

    /// Create a new InvalidRole error
    pub fn invalid_role(value: impl Into<String>) -> Self {
        Self::InvalidRole(value.into())
    }

    /// Create a new InvalidSensitivity error
    pub fn invalid_sensitivity(value: impl Into<String>) -> Self {
        Self::InvalidSensitivity(value.into())
    }

    /// Create a new InvalidClearance error
    pub fn invalid_clearance(value: impl Into<String>) -> Self {
        Self::InvalidClearance(value.into())
    }

    /// Create a new InvalidPermission error
    pub fn invalid_permission(value: impl Into<String>) -> Self {
        Self::InvalidPermission(value.into())
    }

    /// Create a new InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp(value.into())
    }

    /// Create a new InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidDataType(_)
            | Self::InvalidRole(_)
            | Self::InvalidSensitivity(_)
            | Self::InvalidClearance(_)
            | Self::InvalidPermission(_)
            | Self::InvalidTimestamp(_)
            | Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_data_type("xray");
        assert_eq!(err.to_string(), "Invalid data type: xray");
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_invalid_record_error() {
        let err = CoreError::invalid_record("hospitalID must be a string");
        assert_eq!(
            err.to_string(),
            "Invalid record data: hospitalID must be a string"
        );
    }

    #[test]
    fn test_json_error_category() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::Serialization);
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
    }
}
