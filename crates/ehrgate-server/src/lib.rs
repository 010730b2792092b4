//! # ehrgate-server
//!
//! The access-controlled gateway over the medical record ledger.
//!
//! [`Gateway`] exposes one method per public operation, grouped by role
//! (admin, patient, doctor and nurse, insurer, audit). Each method receives
//! the invocation's collaborator handles as an
//! [`Invocation`](ehrgate_storage::Invocation). [`Gateway::invoke`] accepts
//! the string-argument form used by ledger clients.
//!
//! ## Example
//!
//! ```ignore
//! use ehrgate_db_memory::{InMemoryLedger, StaticIdentity, TransactionOptions};
//! use ehrgate_server::{Gateway, GatewayConfig};
//! use ehrgate_storage::Invocation;
//!
//! let gateway = Gateway::new(GatewayConfig::default())?;
//! let ledger = InMemoryLedger::new();
//! let admin = StaticIdentity::new("admin-1")
//!     .with_attribute("role", "admin")
//!     .with_hospital("H1");
//!
//! let tx = ledger.begin(TransactionOptions::new("audit-channel", 1_700_000_000));
//! gateway.invoke(Invocation::new(&tx, &tx, &admin), "createPatient", &[
//!     "p1".to_string(),
//!     r#"{"name": "Ada"}"#.to_string(),
//! ])?;
//! tx.commit()?;
//! ```

pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod observability;

pub use config::{ChannelConfig, ConfigError, GatewayConfig, LoggingConfig, RecordDefaults};
pub use dispatch::{FUNCTIONS, Operation};
pub use gateway::Gateway;
