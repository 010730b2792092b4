//! Collaborator traits for the ledger abstraction layer.
//!
//! The ledger, the identity provider and the transaction context are external
//! to the decision layer. These traits are the boundary; implementations are
//! provided by backend crates (e.g. `ehrgate-db-memory`).

use crate::StorageResult;

/// A raw key/value pair yielded by a range scan.
pub type KeyValue = (String, Vec<u8>);

/// Key/value primitives of the ledger, scoped to one invocation.
///
/// Writes go to the invocation's write-set and become visible only once the
/// ledger commits it. Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use ehrgate_storage::{LedgerStore, StorageError};
///
/// fn load(store: &dyn LedgerStore, key: &str) -> Result<Vec<u8>, StorageError> {
///     store
///         .get_state(key)?
///         .ok_or_else(|| StorageError::not_found("state", key))
/// }
/// ```
pub trait LedgerStore: Send + Sync {
    /// Reads the committed value at `key`.
    ///
    /// Returns `None` if the key is absent.
    fn get_state(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Adds a full overwrite of `key` to the write-set.
    fn put_state(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Adds a deletion of `key` to the write-set. Deleting an absent key is
    /// not an error at this level.
    fn delete_state(&self, key: &str) -> StorageResult<()>;

    /// Opens a range scan over every key starting with `prefix`, in key
    /// order, over the snapshot at scan time.
    ///
    /// The returned handle must be closed; wrap it in
    /// [`ScanGuard`](crate::ScanGuard) so that happens on every exit path.
    fn scan_prefix(&self, prefix: &str) -> StorageResult<Box<dyn StateIterator + '_>>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// An open range scan.
pub trait StateIterator: Iterator<Item = StorageResult<KeyValue>> {
    /// Releases the underlying scan resources. Must be idempotent.
    fn close(&mut self) -> StorageResult<()>;
}

/// Per-invocation transaction metadata supplied by the ledger.
pub trait TransactionContext: Send + Sync {
    /// Logical partition the invocation was submitted on.
    fn channel_id(&self) -> &str;

    /// Unique, ledger-assigned transaction id.
    fn tx_id(&self) -> &str;

    /// Transaction time in unix seconds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Internal` if the ledger did not supply one.
    fn timestamp(&self) -> StorageResult<i64>;
}

/// Verified caller identity supplied by the ledger's identity layer.
pub trait IdentityProvider: Send + Sync {
    /// Reads a certificate attribute such as `role` or `hospitalID`.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Opaque subject identifier of the caller.
    fn caller_id(&self) -> String;
}

/// The three collaborator handles of one invocation, passed explicitly to
/// every operation.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub store: &'a dyn LedgerStore,
    pub tx: &'a dyn TransactionContext,
    pub identity: &'a dyn IdentityProvider,
}

impl<'a> Invocation<'a> {
    pub fn new(
        store: &'a dyn LedgerStore,
        tx: &'a dyn TransactionContext,
        identity: &'a dyn IdentityProvider,
    ) -> Self {
        Self {
            store,
            tx,
            identity,
        }
    }
}
