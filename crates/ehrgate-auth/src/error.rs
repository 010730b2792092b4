//! Access decision error types.
//!
//! [`AuthError`] is the single error surfaced by every gateway operation.
//! Each variant is terminal: the invocation's write-set is discarded.

use std::fmt;

use ehrgate_core::{CoreError, Role};
use ehrgate_storage::StorageError;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No live delegation policy grants the requested permission.
    NoMatchingPolicy,
    /// The record belongs to a different hospital than the caller.
    CrossHospital,
    /// The record is `high` sensitivity and the caller lacks `high` clearance.
    InsufficientClearance,
    /// The caller's role may not invoke the operation.
    RoleNotPermitted(Role),
    /// A patient addressed a record that is not their own.
    NotOwner,
    /// The operation is restricted to another channel.
    WrongChannel {
        /// Channel the operation requires.
        expected: String,
    },
    /// A required identity attribute is missing or malformed.
    InvalidIdentity {
        /// Attribute name.
        attribute: String,
    },
    /// The role cannot be the target of a delegation.
    NotDelegable(Role),
}

impl DenyReason {
    /// Stable code for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMatchingPolicy => "no-matching-policy",
            Self::CrossHospital => "cross-hospital",
            Self::InsufficientClearance => "insufficient-clearance",
            Self::RoleNotPermitted(_) => "role-not-permitted",
            Self::NotOwner => "not-owner",
            Self::WrongChannel { .. } => "wrong-channel",
            Self::InvalidIdentity { .. } => "invalid-identity",
            Self::NotDelegable(_) => "not-delegable",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingPolicy => write!(f, "no matching policy"),
            Self::CrossHospital => write!(f, "cross-hospital"),
            Self::InsufficientClearance => write!(f, "insufficient clearance"),
            Self::RoleNotPermitted(role) => write!(f, "role {role} not permitted"),
            Self::NotOwner => write!(f, "not the record owner"),
            Self::WrongChannel { expected } => write!(f, "only allowed on {expected}"),
            Self::InvalidIdentity { attribute } => {
                write!(f, "missing or invalid identity attribute {attribute}")
            }
            Self::NotDelegable(role) => write!(f, "access cannot be delegated to {role}"),
        }
    }
}

/// Errors that can occur while mediating a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The caller may not perform the request.
    #[error("Access denied: {reason}")]
    AccessDenied {
        /// Why access was refused.
        reason: DenyReason,
    },

    /// The addressed record or policy does not exist.
    #[error("Not found: {object_type} {id}")]
    NotFound {
        /// The kind of object that was not found.
        object_type: String,
        /// Identity of the missing object.
        id: String,
    },

    /// The record or policy to create already exists.
    #[error("Already exists: {object_type} {id}")]
    AlreadyExists {
        /// The kind of object that already exists.
        object_type: String,
        /// Identity of the existing object.
        id: String,
    },

    /// The request is malformed.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// The ledger or stored state is inconsistent.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(reason: DenyReason) -> Self {
        Self::AccessDenied { reason }
    }

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

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns the deny reason if access was refused.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::AccessDenied { reason } => Some(reason),
            _ => None,
        }
    }

    /// Returns the error kind for callers and logging.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { object_type, id } => Self::NotFound { object_type, id },
            StorageError::AlreadyExists { object_type, id } => {
                Self::AlreadyExists { object_type, id }
            }
            StorageError::InvalidKey { message } => Self::InvalidInput { message },
            StorageError::Serialization { message } => Self::internal(format!(
                "stored value could not be decoded: {message}"
            )),
            other @ (StorageError::Conflict { .. } | StorageError::Internal { .. }) => {
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::JsonError(e) => Self::internal(e.to_string()),
            other => Self::invalid_input(other.to_string()),
        }
    }
}

/// The five error kinds every operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    AlreadyExists,
    InvalidInput,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied => write!(f, "access_denied"),
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
