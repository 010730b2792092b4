use ehrgate_auth::AuthResult;
use ehrgate_core::{AuditAction, DataType, Permission, Record, Role, payload_object};
use ehrgate_storage::{Invocation, RecordStore};
use serde_json::{Value, json};

use super::Gateway;

impl Gateway {
    /// Reads a patient's insurance record through a `read` delegation.
    /// Served on the insurance channel only.
    pub fn read_insurance_data(&self, inv: Invocation<'_>, patient_id: &str) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Insurer])?;
        self.require_insurance_channel(inv)?;

        let record = self.engine(inv).authorize(
            &caller,
            patient_id,
            DataType::Insurance,
            Permission::Read,
        )?;
        self.record_audit(
            inv,
            &caller,
            AuditAction::ReadInsurance,
            json!({"patientId": patient_id, "dataType": DataType::Insurance}),
        )?;
        Ok(record)
    }

    /// Merges `updates` into the insurance record, creating it in the
    /// insurer's hospital when absent. Requires a `write` delegation and the
    /// insurance channel.
    pub fn update_insurance_data(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        updates: Value,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Insurer])?;
        self.require_insurance_channel(inv)?;
        let updates = payload_object(updates)?;

        let engine = self.engine(inv);
        engine.find_grant(&caller, patient_id, DataType::Insurance, Permission::Write)?;

        let records = RecordStore::new(inv.store);
        let (record, created) = match records.find(DataType::Insurance, patient_id)? {
            Some(mut existing) => {
                engine.check_hospital(&caller, &existing)?;
                engine.check_clearance(&caller, &existing)?;
                existing.merge_update(updates)?;
                (existing, false)
            }
            None => {
                let ehr = records.get(DataType::Ehr, patient_id)?;
                engine.check_hospital(&caller, &ehr)?;
                let hospital_id = caller.hospital_id()?;
                (
                    self.new_record(DataType::Insurance, patient_id, updates, hospital_id)?,
                    true,
                )
            }
        };
        engine.check_clearance(&caller, &record)?;
        records.put(DataType::Insurance, patient_id, &record)?;

        self.record_audit(
            inv,
            &caller,
            AuditAction::UpdateInsurance,
            json!({
                "patientId": patient_id,
                "dataType": DataType::Insurance,
                "created": created,
            }),
        )?;
        Ok(record)
    }
}
