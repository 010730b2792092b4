//! Delegation policy index.
//!
//! Policies are stored under `policy / patientId / role / dataType`, so every
//! policy a patient issued shares the `(patientId)` prefix and the policy for
//! one role and data type is a single-key range.

use ehrgate_core::{DataType, Permission, Policy, Role};
use ehrgate_storage::{LedgerStore, ScanGuard, encode_key, encode_prefix};

use crate::error::AuthError;
use crate::AuthResult;

/// Object-type tag of policy keys.
pub const POLICY_OBJECT_TYPE: &str = "policy";

pub struct PolicyIndex<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> PolicyIndex<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    fn key(patient_id: &str, role: Role, data_type: DataType) -> AuthResult<String> {
        Ok(encode_key(
            POLICY_OBJECT_TYPE,
            &[patient_id, role.as_str(), data_type.as_str()],
        )?)
    }

    /// Reads a policy regardless of expiry.
    pub fn get(
        &self,
        patient_id: &str,
        role: Role,
        data_type: DataType,
    ) -> AuthResult<Option<Policy>> {
        let key = Self::key(patient_id, role, data_type)?;
        match self.store.get_state(&key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a policy, overwriting any previous grant for the same key.
    pub fn put(&self, policy: &Policy) -> AuthResult<()> {
        let key = Self::key(&policy.patient_id, policy.role, policy.data_type)?;
        self.store.put_state(&key, policy.to_bytes()?)?;
        Ok(())
    }

    /// Removes a policy.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotFound` if no policy exists for the key.
    pub fn delete(&self, patient_id: &str, role: Role, data_type: DataType) -> AuthResult<()> {
        let key = Self::key(patient_id, role, data_type)?;
        if self.store.get_state(&key)?.is_none() {
            return Err(AuthError::not_found(
                POLICY_OBJECT_TYPE,
                format!("{patient_id}/{role}/{data_type}"),
            ));
        }
        self.store.delete_state(&key)?;
        Ok(())
    }

    /// Finds the first live policy for `(patientId, role, dataType)` that
    /// grants `permission` at time `now`. Scanning stops at the first match.
    pub fn find_matching(
        &self,
        patient_id: &str,
        role: Role,
        data_type: DataType,
        permission: Permission,
        now: i64,
    ) -> AuthResult<Option<Policy>> {
        let prefix = encode_prefix(
            POLICY_OBJECT_TYPE,
            &[patient_id, role.as_str(), data_type.as_str()],
        )?;
        let scan = ScanGuard::open(self.store, &prefix)?;
        for item in scan {
            let (_, bytes) = item?;
            let policy = decode(&bytes)?;
            if policy.grants(permission, now) {
                return Ok(Some(policy));
            }
        }
        Ok(None)
    }

    /// Every policy the patient has issued, expired ones included, in key
    /// order.
    pub fn list_for_patient(&self, patient_id: &str) -> AuthResult<Vec<Policy>> {
        let prefix = encode_prefix(POLICY_OBJECT_TYPE, &[patient_id])?;
        let scan = ScanGuard::open(self.store, &prefix)?;
        scan.map(|item| {
            let (_, bytes) = item?;
            decode(&bytes)
        })
        .collect()
    }
}

fn decode(bytes: &[u8]) -> AuthResult<Policy> {
    Policy::from_bytes(bytes)
        .map_err(|e| AuthError::internal(format!("stored policy could not be decoded: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehrgate_core::PermissionSet;
    use ehrgate_db_memory::{InMemoryLedger, TransactionOptions};

    fn policy(patient_id: &str, role: Role, data_type: DataType, perms: &str, expiry: Option<i64>) -> Policy {
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

    fn seeded(policies: &[Policy]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        let tx = ledger.begin(TransactionOptions::new("ch", 1));
        let index = PolicyIndex::new(&tx);
        for p in policies {
            index.put(p).unwrap();
        }
        tx.commit().unwrap();
        ledger
    }

    #[test]
    fn test_put_get_overwrite() {
        let ledger = seeded(&[
            policy("p1", Role::Doctor, DataType::Ehr, "read", None),
            policy("p1", Role::Doctor, DataType::Ehr, "read,write", Some(99)),
        ]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        let got = PolicyIndex::new(&tx)
            .get("p1", Role::Doctor, DataType::Ehr)
            .unwrap()
            .unwrap();
        assert!(got.permissions.contains(Permission::Write));
        assert_eq!(got.expiry, Some(99));
    }

    #[test]
    fn test_find_matching_respects_permission_and_expiry() {
        let ledger = seeded(&[
            policy("p1", Role::Doctor, DataType::Ehr, "read", Some(100)),
            policy("p1", Role::Nurse, DataType::Ehr, "read,write", None),
        ]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        let index = PolicyIndex::new(&tx);

        assert!(index
            .find_matching("p1", Role::Doctor, DataType::Ehr, Permission::Read, 50)
            .unwrap()
            .is_some());
        assert!(index
            .find_matching("p1", Role::Doctor, DataType::Ehr, Permission::Read, 100)
            .unwrap()
            .is_none());
        assert!(index
            .find_matching("p1", Role::Doctor, DataType::Ehr, Permission::Write, 50)
            .unwrap()
            .is_none());
        assert!(index
            .find_matching("p1", Role::Doctor, DataType::Lab, Permission::Read, 50)
            .unwrap()
            .is_none());

        // expired but still stored
        assert!(index.get("p1", Role::Doctor, DataType::Ehr).unwrap().is_some());
        assert_eq!(ledger.open_scans(), 0);
    }

    #[test]
    fn test_patient_prefix_does_not_leak_to_longer_ids() {
        let ledger = seeded(&[
            policy("p1", Role::Doctor, DataType::Ehr, "read", None),
            policy("p10", Role::Doctor, DataType::Ehr, "read", None),
            policy("p10", Role::Insurer, DataType::Insurance, "read", None),
        ]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        let index = PolicyIndex::new(&tx);

        let p1 = index.list_for_patient("p1").unwrap();
        assert_eq!(p1.len(), 1);
        assert_eq!(index.list_for_patient("p10").unwrap().len(), 2);
        assert!(index
            .find_matching("p", Role::Doctor, DataType::Ehr, Permission::Read, 0)
            .unwrap()
            .is_none());
        assert_eq!(ledger.open_scans(), 0);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let ledger = seeded(&[policy("p1", Role::Doctor, DataType::Ehr, "read", None)]);
        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        let index = PolicyIndex::new(&tx);
        assert!(index
            .delete("p1", Role::Nurse, DataType::Ehr)
            .unwrap_err()
            .is_not_found());
        index.delete("p1", Role::Doctor, DataType::Ehr).unwrap();
        tx.commit().unwrap();

        let tx = ledger.begin(TransactionOptions::new("ch", 3));
        assert!(PolicyIndex::new(&tx)
            .get("p1", Role::Doctor, DataType::Ehr)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_policy_releases_scan() {
        let ledger = InMemoryLedger::new();
        let key = encode_key(POLICY_OBJECT_TYPE, &["p1", "doctor", "ehr"]).unwrap();
        ledger.force_put(&key, b"{broken".to_vec());

        let tx = ledger.begin(TransactionOptions::new("ch", 2));
        let err = PolicyIndex::new(&tx)
            .find_matching("p1", Role::Doctor, DataType::Ehr, Permission::Read, 0)
            .unwrap_err();
        assert!(err.is_internal());
        assert_eq!(ledger.open_scans(), 0);
    }
}
