use ehrgate_auth::{AuthError, AuthResult, DenyReason, PolicyIndex};
use ehrgate_core::{
    AuditAction, DataType, PermissionSet, Policy, Record, Role, payload_object,
};
use ehrgate_storage::{Invocation, RecordStore};
use serde_json::{Value, json};

use super::Gateway;

impl Gateway {
    /// Reads the caller's own record of `data_type`.
    pub fn read_my_record(&self, inv: Invocation<'_>, data_type: DataType) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Patient])?;
        let patient_id = caller.patient_id()?;

        let record = self.engine(inv).authorize_owner(&caller, patient_id, data_type)?;
        self.record_audit(
            inv,
            &caller,
            AuditAction::ReadRecord,
            json!({"patientId": patient_id, "dataType": data_type}),
        )?;
        Ok(record)
    }

    /// Merges `updates` into the caller's own record of `data_type`.
    pub fn update_my_record(
        &self,
        inv: Invocation<'_>,
        updates: Value,
        data_type: DataType,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Patient])?;
        let patient_id = caller.patient_id()?;
        let updates = payload_object(updates)?;

        let engine = self.engine(inv);
        let mut record = engine.authorize_owner(&caller, patient_id, data_type)?;
        let fields: Vec<String> = updates.keys().cloned().collect();
        record.merge_update(updates)?;
        engine.check_clearance(&caller, &record)?;
        RecordStore::new(inv.store).put(data_type, patient_id, &record)?;

        self.record_audit(
            inv,
            &caller,
            AuditAction::UpdateRecord,
            json!({"patientId": patient_id, "dataType": data_type, "fields": fields}),
        )?;
        Ok(record)
    }

    /// Delegates `permissions` on the caller's `data_type` records to `role`,
    /// replacing any earlier grant for the same pair.
    pub fn grant_access(
        &self,
        inv: Invocation<'_>,
        role: Role,
        data_type: DataType,
        permissions: PermissionSet,
        expiry: Option<i64>,
    ) -> AuthResult<Policy> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Patient])?;
        let patient_id = caller.patient_id()?;
        if !role.is_delegable() {
            return Err(AuthError::access_denied(DenyReason::NotDelegable(role)));
        }
        let now = inv.tx.timestamp()?;
        if let Some(expiry) = expiry {
            if expiry <= now {
                return Err(AuthError::invalid_input(format!(
                    "expiry {expiry} is not after the transaction time {now}"
                )));
            }
        }

        let policy = Policy {
            patient_id: patient_id.to_string(),
            role,
            data_type,
            permissions,
            expiry,
            granted_by: caller.subject_id.clone(),
            granted_at: now,
        };
        PolicyIndex::new(inv.store).put(&policy)?;

        tracing::info!(
            patient_id,
            role = %role,
            data_type = %data_type,
            permissions = %policy.permissions,
            "Access granted"
        );
        self.record_audit(
            inv,
            &caller,
            AuditAction::GrantAccess,
            json!({
                "patientId": patient_id,
                "dataType": data_type,
                "role": role,
                "permissions": policy.permissions,
                "expiry": expiry,
            }),
        )?;
        Ok(policy)
    }

    /// Removes the caller's grant for `(role, data_type)`.
    pub fn revoke_access(
        &self,
        inv: Invocation<'_>,
        role: Role,
        data_type: DataType,
    ) -> AuthResult<()> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Patient])?;
        let patient_id = caller.patient_id()?;

        PolicyIndex::new(inv.store).delete(patient_id, role, data_type)?;

        tracing::info!(patient_id, role = %role, data_type = %data_type, "Access revoked");
        self.record_audit(
            inv,
            &caller,
            AuditAction::RevokeAccess,
            json!({"patientId": patient_id, "dataType": data_type, "role": role}),
        )
    }

    /// Every grant the caller has issued, expired ones included.
    pub fn list_my_policies(&self, inv: Invocation<'_>) -> AuthResult<Vec<Policy>> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Patient])?;
        let patient_id = caller.patient_id()?;

        let policies = PolicyIndex::new(inv.store).list_for_patient(patient_id)?;
        self.record_audit(
            inv,
            &caller,
            AuditAction::ListPolicies,
            json!({"patientId": patient_id, "dataType": Value::Null, "count": policies.len()}),
        )?;
        Ok(policies)
    }
}
