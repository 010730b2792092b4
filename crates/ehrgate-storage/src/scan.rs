//! Scoped ownership of range scans.

use crate::traits::{KeyValue, LedgerStore, StateIterator};
use crate::StorageResult;

/// Owns an open range scan and closes it when dropped.
///
/// Dropping covers early returns and `?` propagation, so callers only close
/// explicitly when they want to observe a close failure.
pub struct ScanGuard<'a> {
    inner: Box<dyn StateIterator + 'a>,
    closed: bool,
}

impl<'a> ScanGuard<'a> {
    /// Opens a prefix scan on `store`.
    pub fn open(store: &'a dyn LedgerStore, prefix: &str) -> StorageResult<Self> {
        let inner = store.scan_prefix(prefix)?;
        tracing::trace!(backend = store.backend_name(), "Opened range scan");
        Ok(Self {
            inner,
            closed: false,
        })
    }

    /// Closes the scan, surfacing any close failure.
    pub fn close(mut self) -> StorageResult<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl Iterator for ScanGuard<'_> {
    type Item = StorageResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.inner.next()
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.inner.close() {
            tracing::error!(error = %e, "Failed to close range scan");
        }
    }
}
