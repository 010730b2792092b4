//! In-memory ledger backend for ehrgate.
//!
//! This crate implements the collaborator traits from `ehrgate-storage` with
//! an ordered in-memory world state. Each invocation runs in a
//! [`LedgerTransaction`] that reads a snapshot, buffers its writes and either
//! commits them atomically or discards them.
//!
//! # Example
//!
//! ```ignore
//! use ehrgate_db_memory::{InMemoryLedger, StaticIdentity, TransactionOptions};
//! use ehrgate_storage::Invocation;
//!
//! let ledger = InMemoryLedger::new();
//! let tx = ledger.begin(TransactionOptions::new("hospital-channel", 1_700_000_000));
//! let admin = StaticIdentity::new("admin-1").with_attribute("role", "admin");
//! let inv = Invocation::new(&tx, &tx, &admin);
//! // ... run an operation against `inv`, then:
//! tx.commit()?;
//! ```

mod identity;
pub mod storage;
pub mod transaction;

pub use ehrgate_storage::{LedgerStore, StorageError, TransactionContext};

pub use identity::StaticIdentity;
pub use storage::{InMemoryLedger, LedgerStats, WorldState};
pub use transaction::{
    CommitSummary, DEFAULT_CHANNEL, LedgerTransaction, TransactionOptions, TransactionState,
};
