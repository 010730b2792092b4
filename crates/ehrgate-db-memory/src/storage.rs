use crate::transaction::{LedgerTransaction, TransactionOptions};
use arc_swap::ArcSwap;
use ehrgate_storage::{KeyValue, StateIterator, StorageError, StorageResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Committed world state: key -> value, ordered by key.
pub type WorldState = BTreeMap<String, Vec<u8>>;

/// In-memory ledger with snapshot reads and serialized atomic commits.
///
/// This backend provides:
/// - Copy-on-commit world state behind `ArcSwap`, so every transaction reads
///   a stable snapshot without holding a lock
/// - Buffered write-sets applied all-or-nothing at commit
/// - Read-set validation at commit: a transaction whose point reads changed
///   since its snapshot is rejected with `StorageError::Conflict`
/// - Lazy prefix scans over the snapshot, with open-handle accounting
#[derive(Debug)]
pub struct InMemoryLedger {
    /// Current committed state
    pub(crate) state: ArcSwap<WorldState>,
    /// Serializes commits
    pub(crate) commit_lock: Mutex<()>,
    /// Number of scan handles currently open
    pub(crate) open_scans: Arc<AtomicUsize>,
    pub(crate) stats: Mutex<LedgerStats>,
}

/// Commit counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub committed_transactions: u64,
    /// Explicit rollbacks, dropped transactions and rejected commits
    pub rolled_back_transactions: u64,
    /// Commits rejected by read-set validation; also counted as rolled back
    pub conflicted_transactions: u64,
    pub keys_written: u64,
    pub keys_deleted: u64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(WorldState::new()),
            commit_lock: Mutex::new(()),
            open_scans: Arc::new(AtomicUsize::new(0)),
            stats: Mutex::new(LedgerStats::default()),
        }
    }

    /// Starts a transaction reading the current committed snapshot.
    pub fn begin(&self, options: TransactionOptions) -> LedgerTransaction<'_> {
        LedgerTransaction::new(self, self.state.load_full(), options)
    }

    /// Reads a committed value directly, bypassing any transaction.
    pub fn committed_value(&self, key: &str) -> Option<Vec<u8>> {
        self.state.load().get(key).cloned()
    }

    /// Overwrites a committed value directly. Intended for fixtures that
    /// simulate tampering or pre-seeded state.
    pub fn force_put(&self, key: &str, value: Vec<u8>) {
        let _guard = self.commit_lock.lock();
        let mut next = WorldState::clone(&self.state.load());
        next.insert(key.to_string(), value);
        self.state.store(Arc::new(next));
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.state.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of range scans currently open across all transactions.
    pub fn open_scans(&self) -> usize {
        self.open_scans.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> LedgerStats {
        self.stats.lock().clone()
    }

    /// Validates the read-set and applies the write-set atomically on top of
    /// the latest committed state.
    pub(crate) fn apply(
        &self,
        read_set: &BTreeMap<String, Option<Vec<u8>>>,
        write_set: BTreeMap<String, Option<Vec<u8>>>,
    ) -> StorageResult<()> {
        let _guard = self.commit_lock.lock();
        let current = self.state.load_full();
        if let Some((key, _)) = read_set
            .iter()
            .find(|(key, seen)| current.get(key.as_str()) != seen.as_ref())
        {
            self.stats.lock().conflicted_transactions += 1;
            return Err(StorageError::conflict(key.clone()));
        }

        let mut next = WorldState::clone(&current);
        let mut written = 0u64;
        let mut deleted = 0u64;
        for (key, value) in write_set {
            match value {
                Some(bytes) => {
                    next.insert(key, bytes);
                    written += 1;
                }
                None => {
                    next.remove(&key);
                    deleted += 1;
                }
            }
        }
        self.state.store(Arc::new(next));

        let mut stats = self.stats.lock();
        stats.committed_transactions += 1;
        stats.keys_written += written;
        stats.keys_deleted += deleted;
        Ok(())
    }

    pub(crate) fn record_rollback(&self) {
        self.stats.lock().rolled_back_transactions += 1;
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy prefix scan over a world-state snapshot.
///
/// Each step resumes strictly after the last key yielded, so the scan holds
/// only the snapshot `Arc` and a cursor.
pub(crate) struct SnapshotScan {
    snapshot: Arc<WorldState>,
    prefix: String,
    cursor: Option<String>,
    open_scans: Arc<AtomicUsize>,
    closed: bool,
}

impl SnapshotScan {
    pub(crate) fn open(snapshot: Arc<WorldState>, prefix: &str, open_scans: Arc<AtomicUsize>) -> Self {
        open_scans.fetch_add(1, Ordering::SeqCst);
        Self {
            snapshot,
            prefix: prefix.to_string(),
            cursor: None,
            open_scans,
            closed: false,
        }
    }
}

impl Iterator for SnapshotScan {
    type Item = StorageResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        let lower = match &self.cursor {
            Some(last) => Bound::Excluded(last.clone()),
            None => Bound::Included(self.prefix.clone()),
        };
        let (key, value) = self
            .snapshot
            .range((lower, Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, v)| (k.clone(), v.clone()))?;
        self.cursor = Some(key.clone());
        Some(Ok((key, value)))
    }
}

impl StateIterator for SnapshotScan {
    fn close(&mut self) -> StorageResult<()> {
        if !self.closed {
            self.closed = true;
            self.open_scans.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for SnapshotScan {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(prefix = ?self.prefix, "Range scan dropped without close");
            let _ = self.close();
        }
    }
}
