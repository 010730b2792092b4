use crate::storage::{InMemoryLedger, SnapshotScan, WorldState};
use ehrgate_storage::{LedgerStore, StateIterator, StorageError, StorageResult, TransactionContext};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Default channel for transactions that do not name one.
pub const DEFAULT_CHANNEL: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Parameters of a new ledger transaction.
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    pub channel: String,
    /// Transaction time in unix seconds; `None` models a ledger that failed
    /// to supply one.
    pub timestamp: Option<i64>,
    /// Explicit transaction id; a v4 UUID is generated when absent.
    pub tx_id: Option<String>,
}

impl TransactionOptions {
    pub fn new(channel: impl Into<String>, timestamp: i64) -> Self {
        Self {
            channel: channel.into(),
            timestamp: Some(timestamp),
            tx_id: None,
        }
    }

    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            timestamp: None,
            tx_id: None,
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub tx_id: String,
    pub channel: String,
    pub keys_written: usize,
}

/// One invocation's view of the ledger.
///
/// Reads see the snapshot taken at [`InMemoryLedger::begin`]; writes are
/// buffered and are not visible to reads in the same transaction. Dropping
/// the transaction without calling [`commit`](Self::commit) discards the
/// write-set.
#[derive(Debug)]
pub struct LedgerTransaction<'l> {
    ledger: &'l InMemoryLedger,
    id: String,
    channel: String,
    timestamp: Option<i64>,
    snapshot: Arc<WorldState>,
    /// Snapshot value of every key read with `get_state`
    read_set: Mutex<BTreeMap<String, Option<Vec<u8>>>>,
    write_set: Mutex<BTreeMap<String, Option<Vec<u8>>>>,
    state: TransactionState,
}

impl<'l> LedgerTransaction<'l> {
    pub(crate) fn new(
        ledger: &'l InMemoryLedger,
        snapshot: Arc<WorldState>,
        options: TransactionOptions,
    ) -> Self {
        let id = options
            .tx_id
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        tracing::trace!(tx_id = %id, channel = %options.channel, "Transaction started");
        Self {
            ledger,
            id,
            channel: options.channel,
            timestamp: options.timestamp,
            snapshot,
            read_set: Mutex::new(BTreeMap::new()),
            write_set: Mutex::new(BTreeMap::new()),
            state: TransactionState::Active,
        }
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Number of keys currently in the write-set.
    pub fn pending_writes(&self) -> usize {
        self.write_set.lock().len()
    }

    /// Applies the write-set atomically and ends the transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a key this transaction read was
    /// changed by another commit since the snapshot; the write-set is then
    /// discarded.
    pub fn commit(mut self) -> StorageResult<CommitSummary> {
        let read_set = std::mem::take(&mut *self.read_set.lock());
        let write_set = std::mem::take(&mut *self.write_set.lock());
        let keys_written = write_set.len();
        if let Err(e) = self.ledger.apply(&read_set, write_set) {
            self.state = TransactionState::RolledBack;
            self.ledger.record_rollback();
            tracing::info!(tx_id = %self.id, error = %e, "Transaction rejected at commit");
            return Err(e);
        }
        self.state = TransactionState::Committed;
        tracing::debug!(tx_id = %self.id, channel = %self.channel, keys_written, "Transaction committed");
        Ok(CommitSummary {
            tx_id: self.id.clone(),
            channel: self.channel.clone(),
            keys_written,
        })
    }

    /// Discards the write-set and ends the transaction.
    pub fn rollback(mut self) {
        self.mark_rolled_back();
    }

    fn mark_rolled_back(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        let discarded = std::mem::take(&mut *self.write_set.lock()).len();
        self.state = TransactionState::RolledBack;
        self.ledger.record_rollback();
        tracing::debug!(tx_id = %self.id, discarded, "Transaction rolled back");
    }
}

impl Drop for LedgerTransaction<'_> {
    fn drop(&mut self) {
        self.mark_rolled_back();
    }
}

impl LedgerStore for LedgerTransaction<'_> {
    fn get_state(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value = self.snapshot.get(key).cloned();
        self.read_set
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| value.clone());
        Ok(value)
    }

    fn put_state(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        self.write_set.lock().insert(key.to_string(), Some(value));
        Ok(())
    }

    fn delete_state(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        self.write_set.lock().insert(key.to_string(), None);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Box<dyn StateIterator + '_>> {
        Ok(Box::new(SnapshotScan::open(
            Arc::clone(&self.snapshot),
            prefix,
            Arc::clone(&self.ledger.open_scans),
        )))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl TransactionContext for LedgerTransaction<'_> {
    fn channel_id(&self) -> &str {
        &self.channel
    }

    fn tx_id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> StorageResult<i64> {
        self.timestamp
            .ok_or_else(|| StorageError::internal("transaction timestamp unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(entries: &[(&str, &str)]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("ch", 1));
        for (k, v) in entries {
            tx.put_state(k, v.as_bytes().to_vec()).unwrap();
        }
        tx.commit().unwrap();
        ledger
    }

    #[test]
    fn test_writes_are_invisible_until_commit() {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("ch", 1));
        tx.put_state("k", b"v".to_vec()).unwrap();

        assert_eq!(tx.get_state("k").unwrap(), None);
        assert_eq!(ledger.committed_value("k"), None);
        assert_eq!(tx.pending_writes(), 1);

        let summary = tx.commit().unwrap();
        assert_eq!(summary.keys_written, 1);
        assert_eq!(ledger.committed_value("k"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_drop_without_commit_discards_writes() {
        let ledger = ledger_with(&[("a", "1")]);
        {
            let tx = ledger.begin(TransactionOptions::new("ch", 2));
            tx.put_state("b", b"2".to_vec()).unwrap();
            tx.delete_state("a").unwrap();
        }
        assert_eq!(ledger.committed_value("a"), Some(b"1".to_vec()));
        assert_eq!(ledger.committed_value("b"), None);

        let stats = ledger.stats();
        assert_eq!(stats.committed_transactions, 1);
        assert_eq!(stats.rolled_back_transactions, 1);
    }

    #[test]
    fn test_snapshot_isolation_between_transactions() {
        let ledger = ledger_with(&[("a", "1")]);
        let reader = ledger.begin(TransactionOptions::new("ch", 2));

        let writer = ledger.begin(TransactionOptions::new("ch", 2));
        writer.put_state("a", b"2".to_vec()).unwrap();
        writer.commit().unwrap();

        assert_eq!(reader.get_state("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(ledger.committed_value("a"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_stale_read_conflicts_at_commit() {
        let ledger = ledger_with(&[("head", "1")]);
        let first = ledger.begin(TransactionOptions::new("ch", 2));
        let second = ledger.begin(TransactionOptions::new("ch", 2));

        assert_eq!(first.get_state("head").unwrap(), Some(b"1".to_vec()));
        first.put_state("head", b"2".to_vec()).unwrap();
        assert_eq!(second.get_state("head").unwrap(), Some(b"1".to_vec()));
        second.put_state("head", b"3".to_vec()).unwrap();
        second.put_state("other", b"x".to_vec()).unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(ledger.committed_value("head"), Some(b"2".to_vec()));
        assert_eq!(ledger.committed_value("other"), None);
        let stats = ledger.stats();
        assert_eq!(stats.conflicted_transactions, 1);
        assert_eq!(stats.rolled_back_transactions, 1);
        assert_eq!(stats.committed_transactions, 2);
    }

    #[test]
    fn test_blind_writes_do_not_conflict() {
        let ledger = ledger_with(&[("a", "1")]);
        let first = ledger.begin(TransactionOptions::new("ch", 2));
        let second = ledger.begin(TransactionOptions::new("ch", 2));
        first.put_state("a", b"2".to_vec()).unwrap();
        second.put_state("a", b"3".to_vec()).unwrap();
        first.commit().unwrap();
        second.commit().unwrap();
        assert_eq!(ledger.committed_value("a"), Some(b"3".to_vec()));
    }

    #[test]
    fn test_delete_then_commit_removes_key() {
        let ledger = ledger_with(&[("a", "1"), ("b", "2")]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        tx.delete_state("a").unwrap();
        tx.commit().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.stats().keys_deleted, 1);
    }

    #[test]
    fn test_scan_reads_snapshot_and_tracks_handles() {
        let ledger = ledger_with(&[("p/1", "a"), ("p/2", "b"), ("q/1", "c")]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        tx.put_state("p/3", b"pending".to_vec()).unwrap();

        let mut scan = tx.scan_prefix("p/").unwrap();
        assert_eq!(ledger.open_scans(), 1);
        let keys: Vec<String> = scan.by_ref().map(|kv| kv.unwrap().0).collect();
        assert_eq!(keys, vec!["p/1".to_string(), "p/2".to_string()]);
        scan.close().unwrap();
        assert_eq!(ledger.open_scans(), 0);
    }

    #[test]
    fn test_transaction_context() {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("audit-channel", 1_700_000_000).with_tx_id("tx-1"));
        assert_eq!(tx.channel_id(), "audit-channel");
        assert_eq!(tx.tx_id(), "tx-1");
        assert_eq!(tx.timestamp().unwrap(), 1_700_000_000);
        assert_eq!(tx.state(), TransactionState::Active);

        let generated = ledger.begin(TransactionOptions::default());
        assert_eq!(generated.tx_id().len(), 32);
        assert!(generated.timestamp().is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("ch", 1));
        assert!(tx.put_state("", b"x".to_vec()).is_err());
        assert!(tx.delete_state("").is_err());
    }
}
