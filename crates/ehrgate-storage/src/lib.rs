//! # ehrgate-storage
//!
//! Ledger abstraction layer for ehrgate.
//!
//! This crate defines the collaborator traits the decision layer runs against
//! (ledger store, transaction context, caller identity), the composite key
//! codec, scoped range scans and the record store. It contains no ledger
//! implementation; backends live in separate crates.
//!
//! ## Example
//!
//! ```ignore
//! use ehrgate_core::DataType;
//! use ehrgate_storage::{LedgerStore, RecordStore, StorageResult};
//!
//! fn hospital_of(store: &dyn LedgerStore, patient_id: &str) -> StorageResult<String> {
//!     let record = RecordStore::new(store).get(DataType::Ehr, patient_id)?;
//!     Ok(record.hospital_id)
//! }
//! ```

mod error;
pub mod keys;
pub mod records;
mod scan;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use keys::{KEY_SEPARATOR, decode_key, encode_key, encode_prefix};
pub use records::{RECORD_OBJECT_TYPE, RecordScan, RecordStore};
pub use scan::ScanGuard;
pub use traits::{
    IdentityProvider, Invocation, KeyValue, LedgerStore, StateIterator, TransactionContext,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;
