//! Access decision engine.
//!
//! Decides whether a caller may read or write one `(patientId, dataType)`
//! record. Delegated access runs the full pipeline:
//!
//! 1. Find a live policy `(patientId, caller role, dataType)` granting the
//!    permission
//! 2. Load the record (`NotFound` stays distinguishable from a denial)
//! 3. Require the record's hospital to equal the caller's
//! 4. Require `high` clearance for `high` sensitivity records
//!
//! Direct-ownership paths skip the policy lookup and apply the hospital and
//! clearance analogues.

use ehrgate_core::{DataType, Permission, Policy, Record, Role};
use ehrgate_storage::{LedgerStore, RecordStore, TransactionContext};

use crate::error::{AuthError, DenyReason};
use crate::identity::IdentityContext;
use crate::policy::index::PolicyIndex;
use crate::AuthResult;

/// Evaluates access requests against stored policies and records.
pub struct AccessDecisionEngine<'a> {
    store: &'a dyn LedgerStore,
    /// Source of the transaction time. Only policy expiry reads it.
    tx: &'a dyn TransactionContext,
}

impl<'a> AccessDecisionEngine<'a> {
    pub fn new(store: &'a dyn LedgerStore, tx: &'a dyn TransactionContext) -> Self {
        Self { store, tx }
    }

    /// Finds the policy delegating `permission` on `(patientId, dataType)` to
    /// the caller's role.
    ///
    /// Expiry is evaluated against the transaction time, so a ledger without
    /// a timestamp fails here with `Internal`.
    pub fn find_grant(
        &self,
        caller: &IdentityContext,
        patient_id: &str,
        data_type: DataType,
        permission: Permission,
    ) -> AuthResult<Policy> {
        let now = self.tx.timestamp().map_err(|e| {
            AuthError::internal(format!("policy expiry needs a transaction timestamp: {e}"))
        })?;
        let found = PolicyIndex::new(self.store).find_matching(
            patient_id,
            caller.role,
            data_type,
            permission,
            now,
        )?;
        match found {
            Some(policy) => Ok(policy),
            None => Err(self.deny(caller, patient_id, data_type, DenyReason::NoMatchingPolicy)),
        }
    }

    /// Requires the record to belong to the caller's hospital.
    pub fn check_hospital(&self, caller: &IdentityContext, record: &Record) -> AuthResult<()> {
        if record.hospital_id == caller.hospital_id()? {
            Ok(())
        } else {
            Err(self.deny(
                caller,
                &record.patient_id,
                record.data_type,
                DenyReason::CrossHospital,
            ))
        }
    }

    /// Mandatory sensitivity gate, applied on every path returning or
    /// modifying record contents.
    pub fn check_clearance(&self, caller: &IdentityContext, record: &Record) -> AuthResult<()> {
        if caller.clearance.permits(record.sensitivity) {
            Ok(())
        } else {
            Err(self.deny(
                caller,
                &record.patient_id,
                record.data_type,
                DenyReason::InsufficientClearance,
            ))
        }
    }

    /// Delegated access: policy, record, hospital, clearance.
    pub fn authorize(
        &self,
        caller: &IdentityContext,
        patient_id: &str,
        data_type: DataType,
        permission: Permission,
    ) -> AuthResult<Record> {
        self.find_grant(caller, patient_id, data_type, permission)?;
        let record = RecordStore::new(self.store).get(data_type, patient_id)?;
        self.check_hospital(caller, &record)?;
        self.check_clearance(caller, &record)?;
        self.allow(caller, patient_id, data_type, "delegated");
        Ok(record)
    }

    /// Direct-ownership access.
    ///
    /// Patients reach their own records without a hospital check; admins and
    /// nurses reach records of their own hospital. Every other role must go
    /// through [`authorize`](Self::authorize).
    pub fn authorize_owner(
        &self,
        caller: &IdentityContext,
        patient_id: &str,
        data_type: DataType,
    ) -> AuthResult<Record> {
        let records = RecordStore::new(self.store);
        let record = match caller.role {
            Role::Patient => {
                if !caller.owns(patient_id) {
                    return Err(self.deny(caller, patient_id, data_type, DenyReason::NotOwner));
                }
                records.get(data_type, patient_id)?
            }
            Role::Admin | Role::Nurse => {
                let record = records.get(data_type, patient_id)?;
                self.check_hospital(caller, &record)?;
                record
            }
            other => {
                return Err(self.deny(
                    caller,
                    patient_id,
                    data_type,
                    DenyReason::RoleNotPermitted(other),
                ));
            }
        };
        self.check_clearance(caller, &record)?;
        self.allow(caller, patient_id, data_type, "owner");
        Ok(record)
    }

    fn allow(&self, caller: &IdentityContext, patient_id: &str, data_type: DataType, path: &str) {
        tracing::debug!(
            subject = %caller.subject_id,
            role = %caller.role,
            patient_id = %patient_id,
            data_type = %data_type,
            path,
            "Access allowed"
        );
    }

    fn deny(
        &self,
        caller: &IdentityContext,
        patient_id: &str,
        data_type: DataType,
        reason: DenyReason,
    ) -> AuthError {
        tracing::info!(
            subject = %caller.subject_id,
            role = %caller.role,
            patient_id = %patient_id,
            data_type = %data_type,
            reason = reason.code(),
            "Access denied"
        );
        AuthError::access_denied(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehrgate_core::{Clearance, PermissionSet, Sensitivity, payload_object};
    use ehrgate_db_memory::{InMemoryLedger, TransactionOptions};
    use serde_json::json;

    const NOW: i64 = 1_000;

    fn record(data_type: DataType, patient_id: &str, hospital: &str, sensitivity: Sensitivity) -> Record {
        Record::from_payload(
            data_type,
            patient_id,
            payload_object(json!({"diagnosis": "flu"})).unwrap(),
            hospital,
            sensitivity,
        )
        .unwrap()
    }

    fn grant(patient_id: &str, role: Role, data_type: DataType, perms: &str, expiry: Option<i64>) -> Policy {
        Policy {
            patient_id: patient_id.to_string(),
            role,
            data_type,
            permissions: PermissionSet::parse(perms).unwrap(),
            expiry,
            granted_by: patient_id.to_string(),
            granted_at: 0,
        }
    }

    fn ledger(records: &[Record], policies: &[Policy]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("ch", 0));
        for r in records {
            RecordStore::new(&tx).create(r).unwrap();
        }
        for p in policies {
            PolicyIndex::new(&tx).put(p).unwrap();
        }
        tx.commit().unwrap();
        ledger
    }

    fn caller(role: Role, hospital: &str, clearance: Clearance) -> IdentityContext {
        IdentityContext::new("caller", role, Some(hospital.to_string()), clearance, None)
    }

    fn reason(err: &AuthError) -> &DenyReason {
        err.deny_reason().expect("expected AccessDenied")
    }

    #[test]
    fn test_delegated_read_allowed() {
        let ledger = ledger(
            &[record(DataType::Ehr, "p1", "H1", Sensitivity::Medium)],
            &[grant("p1", Role::Doctor, DataType::Ehr, "read", None)],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let engine = AccessDecisionEngine::new(&tx, &tx);

        let rec = engine
            .authorize(&caller(Role::Doctor, "H1", Clearance::Low), "p1", DataType::Ehr, Permission::Read)
            .unwrap();
        assert_eq!(rec.patient_id, "p1");
        assert_eq!(ledger.open_scans(), 0);
    }

    #[test]
    fn test_no_policy_is_denied() {
        let ledger = ledger(&[record(DataType::Ehr, "p1", "H1", Sensitivity::Low)], &[]);
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let err = AccessDecisionEngine::new(&tx, &tx)
            .authorize(&caller(Role::Doctor, "H1", Clearance::High), "p1", DataType::Ehr, Permission::Read)
            .unwrap_err();
        assert_eq!(reason(&err), &DenyReason::NoMatchingPolicy);
    }

    #[test]
    fn test_expired_policy_is_denied() {
        let ledger = ledger(
            &[record(DataType::Ehr, "p1", "H1", Sensitivity::Low)],
            &[grant("p1", Role::Doctor, DataType::Ehr, "read", Some(NOW))],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let err = AccessDecisionEngine::new(&tx, &tx)
            .authorize(&caller(Role::Doctor, "H1", Clearance::Low), "p1", DataType::Ehr, Permission::Read)
            .unwrap_err();
        assert_eq!(reason(&err), &DenyReason::NoMatchingPolicy);
    }

    #[test]
    fn test_read_grant_does_not_cover_write() {
        let ledger = ledger(
            &[record(DataType::Lab, "p1", "H1", Sensitivity::Low)],
            &[grant("p1", Role::Doctor, DataType::Lab, "read", None)],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let err = AccessDecisionEngine::new(&tx, &tx)
            .authorize(&caller(Role::Doctor, "H1", Clearance::Low), "p1", DataType::Lab, Permission::Write)
            .unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_cross_hospital_denied_despite_policy() {
        let ledger = ledger(
            &[record(DataType::Ehr, "p1", "H1", Sensitivity::Low)],
            &[grant("p1", Role::Doctor, DataType::Ehr, "read", None)],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let err = AccessDecisionEngine::new(&tx, &tx)
            .authorize(&caller(Role::Doctor, "H2", Clearance::High), "p1", DataType::Ehr, Permission::Read)
            .unwrap_err();
        assert_eq!(reason(&err), &DenyReason::CrossHospital);
    }

    #[test]
    fn test_high_sensitivity_requires_high_clearance() {
        let ledger = ledger(
            &[record(DataType::Ehr, "p1", "H1", Sensitivity::High)],
            &[grant("p1", Role::Doctor, DataType::Ehr, "read", None)],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let engine = AccessDecisionEngine::new(&tx, &tx);

        let err = engine
            .authorize(&caller(Role::Doctor, "H1", Clearance::Medium), "p1", DataType::Ehr, Permission::Read)
            .unwrap_err();
        assert_eq!(reason(&err), &DenyReason::InsufficientClearance);

        assert!(engine
            .authorize(&caller(Role::Doctor, "H1", Clearance::High), "p1", DataType::Ehr, Permission::Read)
            .is_ok());
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let ledger = ledger(&[], &[grant("p1", Role::Doctor, DataType::Lab, "read", None)]);
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let err = AccessDecisionEngine::new(&tx, &tx)
            .authorize(&caller(Role::Doctor, "H1", Clearance::Low), "p1", DataType::Lab, Permission::Read)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_owner_paths() {
        let ledger = ledger(
            &[
                record(DataType::Ehr, "p1", "H1", Sensitivity::Medium),
                record(DataType::Ehr, "p2", "H1", Sensitivity::High),
            ],
            &[],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let engine = AccessDecisionEngine::new(&tx, &tx);

        let patient = IdentityContext::new("p1", Role::Patient, None, Clearance::Low, Some("p1".to_string()));
        assert!(engine.authorize_owner(&patient, "p1", DataType::Ehr).is_ok());
        let err = engine.authorize_owner(&patient, "p2", DataType::Ehr).unwrap_err();
        assert_eq!(reason(&err), &DenyReason::NotOwner);

        let nurse = caller(Role::Nurse, "H1", Clearance::Low);
        assert!(engine.authorize_owner(&nurse, "p1", DataType::Ehr).is_ok());
        let err = engine.authorize_owner(&nurse, "p2", DataType::Ehr).unwrap_err();
        assert_eq!(reason(&err), &DenyReason::InsufficientClearance);

        let foreign_admin = caller(Role::Admin, "H2", Clearance::High);
        let err = engine.authorize_owner(&foreign_admin, "p1", DataType::Ehr).unwrap_err();
        assert_eq!(reason(&err), &DenyReason::CrossHospital);

        let doctor = caller(Role::Doctor, "H1", Clearance::High);
        let err = engine.authorize_owner(&doctor, "p1", DataType::Ehr).unwrap_err();
        assert_eq!(reason(&err), &DenyReason::RoleNotPermitted(Role::Doctor));
    }

    #[test]
    fn test_owner_high_record_needs_high_clearance() {
        let ledger = ledger(&[record(DataType::Ehr, "p1", "H1", Sensitivity::High)], &[]);
        let tx = ledger.begin(TransactionOptions::new("ch", NOW));
        let engine = AccessDecisionEngine::new(&tx, &tx);

        let patient = IdentityContext::new("p1", Role::Patient, None, Clearance::Low, Some("p1".to_string()));
        let err = engine.authorize_owner(&patient, "p1", DataType::Ehr).unwrap_err();
        assert_eq!(reason(&err), &DenyReason::InsufficientClearance);
    }

    #[test]
    fn test_timestamp_only_needed_for_policy_expiry() {
        let ledger = ledger(
            &[record(DataType::Ehr, "p1", "H1", Sensitivity::Low)],
            &[grant("p1", Role::Doctor, DataType::Ehr, "read", None)],
        );
        let tx = ledger.begin(TransactionOptions::new("ch", NOW).without_timestamp());
        let engine = AccessDecisionEngine::new(&tx, &tx);

        let nurse = caller(Role::Nurse, "H1", Clearance::Low);
        assert!(engine.authorize_owner(&nurse, "p1", DataType::Ehr).is_ok());

        let err = engine
            .authorize(&caller(Role::Doctor, "H1", Clearance::Low), "p1", DataType::Ehr, Permission::Read)
            .unwrap_err();
        assert!(err.is_internal());
    }
}
