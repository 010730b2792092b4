//! Storage error types for the ledger abstraction layer.
//!
//! This module defines all error types that can occur during store operations.

use std::fmt;

use ehrgate_core::CoreError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested entry was not found.
    #[error("Not found: {object_type} {id}")]
    NotFound {
        /// The kind of object that was not found.
        object_type: String,
        /// Human-readable identity of the missing object.
        id: String,
    },

    /// Attempted to create an entry that already exists.
    #[error("Already exists: {object_type} {id}")]
    AlreadyExists {
        /// The kind of object that already exists.
        object_type: String,
        /// Human-readable identity of the existing object.
        id: String,
    },

    /// A composite key component was rejected by the codec.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// A key read by the transaction changed before it committed.
    #[error("Read conflict on key {key:?}")]
    Conflict {
        /// The key whose committed value changed.
        key: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if the transaction lost a read conflict and may be retried.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidKey { .. } => ErrorCategory::Validation,
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Entry not found.
    NotFound,
    /// Entry already exists, or a concurrent commit won.
    Conflict,
    /// Key validation error.
    Validation,
    /// Encoding/decoding error.
    Serialization,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("record", "ehr/p1");
        assert_eq!(err.to_string(), "Not found: record ehr/p1");

        let err = StorageError::already_exists("record", "lab/p2");
        assert_eq!(err.to_string(), "Already exists: record lab/p2");

        let err = StorageError::invalid_key("separator in attribute");
        assert_eq!(err.to_string(), "Invalid key: separator in attribute");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("policy", "p1/doctor/ehr");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());

        let err = StorageError::already_exists("record", "ehr/p1");
        assert!(err.is_already_exists());

        let err = StorageError::conflict("k");
        assert!(err.is_conflict());
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("record", "x").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::invalid_key("x").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::from(CoreError::invalid_record("x")).category(),
            ErrorCategory::Serialization
        );
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
    }
}
