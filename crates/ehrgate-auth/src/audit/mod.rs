//! Channel-scoped, tamper-evident audit trail.
//!
//! Entries are written only when the invocation runs on the audit channel,
//! one per transaction, keyed by transaction id:
//!
//! ```text
//! audit / txId      -> AuditEntry
//! auditHead         -> ChainHead { sequence, hash }
//! ```
//!
//! Each entry carries the hash of its predecessor, so rewriting or dropping
//! an entry is detected by [`AuditLog::verify_chain`].

mod chain;

pub use chain::{ChainBreak, ChainHead, GENESIS_HASH, entry_hash, verify_entries};

use std::cell::Cell;

use ehrgate_core::{AuditAction, AuditEntry, Role};
use ehrgate_storage::{
    LedgerStore, ScanGuard, TransactionContext, decode_key, encode_key, encode_prefix,
};
use serde_json::Value;

use crate::error::{AuthError, DenyReason};
use crate::identity::IdentityContext;
use crate::AuthResult;

/// Object-type tag of audit entry keys.
pub const AUDIT_OBJECT_TYPE: &str = "audit";

/// Object-type tag of the chain head key.
pub const AUDIT_HEAD_OBJECT_TYPE: &str = "auditHead";

/// Audit recorder and reader for one invocation.
pub struct AuditLog<'a> {
    store: &'a dyn LedgerStore,
    tx: &'a dyn TransactionContext,
    audit_channel: &'a str,
    recorded: Cell<bool>,
}

impl<'a> AuditLog<'a> {
    pub fn new(
        store: &'a dyn LedgerStore,
        tx: &'a dyn TransactionContext,
        audit_channel: &'a str,
    ) -> Self {
        Self {
            store,
            tx,
            audit_channel,
            recorded: Cell::new(false),
        }
    }

    fn on_audit_channel(&self) -> bool {
        self.tx.channel_id() == self.audit_channel
    }

    /// Appends the entry for this transaction.
    ///
    /// Off the audit channel this is a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the ledger supplied no timestamp or
    /// the transaction already has an entry.
    pub fn record(
        &self,
        actor_id: &str,
        action: AuditAction,
        details: Value,
    ) -> AuthResult<Option<AuditEntry>> {
        if !self.on_audit_channel() {
            tracing::trace!(
                channel = %self.tx.channel_id(),
                action = %action,
                "Audit skipped off the audit channel"
            );
            return Ok(None);
        }

        let timestamp = self.tx.timestamp().map_err(|e| {
            AuthError::internal(format!("audit entry needs a transaction timestamp: {e}"))
        })?;
        let tx_id = self.tx.tx_id();
        let key = encode_key(AUDIT_OBJECT_TYPE, &[tx_id])?;
        if self.recorded.get() || self.store.get_state(&key)?.is_some() {
            return Err(AuthError::internal(format!(
                "audit entry for transaction {tx_id} already recorded"
            )));
        }

        let head = self.head()?;
        let mut entry = AuditEntry {
            tx_id: tx_id.to_string(),
            sequence: head.sequence + 1,
            timestamp,
            actor_id: actor_id.to_string(),
            channel: self.tx.channel_id().to_string(),
            action: action.code().to_string(),
            details,
            prev_hash: head.hash,
            hash: String::new(),
        };
        entry.hash = entry_hash(&entry).map_err(|e| AuthError::internal(e.to_string()))?;

        let next_head = ChainHead {
            sequence: entry.sequence,
            hash: entry.hash.clone(),
        };
        self.store.put_state(&key, to_bytes(&entry)?)?;
        self.store
            .put_state(&head_key()?, to_bytes(&next_head)?)?;
        self.recorded.set(true);

        tracing::debug!(
            tx_id = %entry.tx_id,
            sequence = entry.sequence,
            action = %entry.action,
            "Audit entry recorded"
        );
        Ok(Some(entry))
    }

    /// Entries with `start <= timestamp <= end`, ordered by
    /// `(timestamp, sequence)`.
    ///
    /// Admins see every entry; patients see entries about themselves.
    pub fn query(
        &self,
        caller: &IdentityContext,
        start: i64,
        end: i64,
    ) -> AuthResult<Vec<AuditEntry>> {
        caller.require_role(&[Role::Admin, Role::Patient])?;
        self.require_audit_channel()?;
        if start > end {
            return Err(AuthError::invalid_input(format!(
                "start time {start} is after end time {end}"
            )));
        }
        let own_patient_id = match caller.role {
            Role::Patient => Some(caller.patient_id()?),
            _ => None,
        };

        let mut entries = Vec::new();
        for item in ScanGuard::open(self.store, &encode_prefix(AUDIT_OBJECT_TYPE, &[])?)? {
            let (_, bytes) = item?;
            let entry = from_bytes(&bytes)?;
            if entry.timestamp < start || entry.timestamp > end {
                continue;
            }
            if let Some(own) = own_patient_id {
                if entry.patient_id() != Some(own) {
                    continue;
                }
            }
            entries.push(entry);
        }
        entries.sort_by_key(|e| (e.timestamp, e.sequence));
        Ok(entries)
    }

    /// Recomputes the whole chain and returns the number of verified entries.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` describing the first break.
    pub fn verify_chain(&self, caller: &IdentityContext) -> AuthResult<u64> {
        caller.require_role(&[Role::Admin, Role::Auditor])?;
        self.require_audit_channel()?;

        let mut entries = Vec::new();
        for item in ScanGuard::open(self.store, &encode_prefix(AUDIT_OBJECT_TYPE, &[])?)? {
            let (key, bytes) = item?;
            let entry = from_bytes(&bytes)?;
            let (_, attributes) = decode_key(&key)?;
            if attributes.first().map(String::as_str) != Some(entry.tx_id.as_str()) {
                return Err(broken(&ChainBreak {
                    sequence: entry.sequence,
                    problem: format!("entry for {} stored under another key", entry.tx_id),
                }));
            }
            entries.push(entry);
        }
        entries.sort_by_key(|e| e.sequence);

        let verified = verify_entries(&entries, &self.head()?).map_err(|b| broken(&b))?;
        tracing::debug!(entries = verified, "Audit chain verified");
        Ok(verified)
    }

    fn require_audit_channel(&self) -> AuthResult<()> {
        if self.on_audit_channel() {
            Ok(())
        } else {
            Err(AuthError::access_denied(DenyReason::WrongChannel {
                expected: self.audit_channel.to_string(),
            }))
        }
    }

    fn head(&self) -> AuthResult<ChainHead> {
        match self.store.get_state(&head_key()?)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AuthError::internal(format!("audit head could not be decoded: {e}"))),
            None => Ok(ChainHead::genesis()),
        }
    }
}

fn head_key() -> AuthResult<String> {
    Ok(encode_key(AUDIT_HEAD_OBJECT_TYPE, &[])?)
}

fn to_bytes<T: serde::Serialize>(value: &T) -> AuthResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| AuthError::internal(e.to_string()))
}

fn from_bytes(bytes: &[u8]) -> AuthResult<AuditEntry> {
    serde_json::from_slice(bytes)
        .map_err(|e| AuthError::internal(format!("audit entry could not be decoded: {e}")))
}

fn broken(chain_break: &ChainBreak) -> AuthError {
    tracing::error!(
        sequence = chain_break.sequence,
        problem = %chain_break.problem,
        "Audit chain broken"
    );
    AuthError::internal(format!(
        "audit chain broken at sequence {}: {}",
        chain_break.sequence, chain_break.problem
    ))
}
