//! # ehrgate-auth
//!
//! Attribute-based access decisions for ehrgate.
//!
//! ## Modules
//!
//! - [`identity`] - Caller attribute extraction and subject binding
//! - [`policy`] - Delegation policy index and the access decision engine
//! - [`audit`] - Channel-scoped, hash-chained audit trail
//! - [`error`] - The error surfaced by every gateway operation

pub mod audit;
pub mod error;
pub mod identity;
pub mod policy;

pub use audit::{AUDIT_HEAD_OBJECT_TYPE, AUDIT_OBJECT_TYPE, AuditLog, ChainHead, GENESIS_HASH};
pub use error::{AuthError, DenyReason, ErrorKind};
pub use identity::{IdentityConfig, IdentityContext, SubjectBinding};
pub use policy::{AccessDecisionEngine, POLICY_OBJECT_TYPE, PolicyIndex};

/// Type alias for access decision results.
pub type AuthResult<T> = Result<T, AuthError>;
