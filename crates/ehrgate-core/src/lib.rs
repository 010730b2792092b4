pub mod audit;
pub mod error;
pub mod model;
pub mod policy;
pub mod record;
pub mod time;

pub use audit::{AuditAction, AuditEntry};
pub use error::{CoreError, ErrorCategory, Result};
pub use model::{Clearance, DataType, Permission, PermissionSet, Role, Sensitivity};
pub use policy::Policy;
pub use record::{Record, payload_object};
pub use time::{format_timestamp, parse_timestamp};
