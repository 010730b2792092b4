use ehrgate_auth::AuthResult;
use ehrgate_core::{AuditAction, DataType, Record, Role, payload_object};
use ehrgate_storage::{Invocation, RecordStore};
use serde_json::{Value, json};

use super::{Gateway, record_details};

impl Gateway {
    /// Creates a patient's `ehr` record in the admin's hospital.
    pub fn create_patient(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        data: Value,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Admin])?;
        let hospital_id = caller.hospital_id()?;

        let record = self.new_record(DataType::Ehr, patient_id, payload_object(data)?, hospital_id)?;
        self.engine(inv).check_clearance(&caller, &record)?;
        RecordStore::new(inv.store).create(&record)?;

        tracing::info!(patient_id, hospital_id, "Patient created");
        self.record_audit(inv, &caller, AuditAction::CreatePatient, record_details(&record))?;
        Ok(record)
    }

    /// Deletes a patient's `ehr` record from the admin's hospital.
    pub fn delete_patient(&self, inv: Invocation<'_>, patient_id: &str) -> AuthResult<()> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Admin])?;

        let record = self.engine(inv).authorize_owner(&caller, patient_id, DataType::Ehr)?;
        RecordStore::new(inv.store).delete(DataType::Ehr, patient_id)?;

        tracing::info!(patient_id, "Patient deleted");
        self.record_audit(inv, &caller, AuditAction::DeletePatient, record_details(&record))
    }

    /// Lists `ehr` records of the admin's hospital. `high` records are left
    /// out unless the admin holds `high` clearance.
    pub fn get_all_patients(&self, inv: Invocation<'_>) -> AuthResult<Vec<Record>> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Admin])?;
        let hospital_id = caller.hospital_id()?;

        let mut patients = Vec::new();
        let mut withheld = 0usize;
        for record in RecordStore::new(inv.store).scan_all(DataType::Ehr)? {
            let record = record?;
            if record.hospital_id != hospital_id {
                continue;
            }
            if caller.clearance.permits(record.sensitivity) {
                patients.push(record);
            } else {
                withheld += 1;
            }
        }
        if withheld > 0 {
            tracing::info!(hospital_id, withheld, "High sensitivity records withheld from listing");
        }

        self.record_audit(
            inv,
            &caller,
            AuditAction::ListPatients,
            json!({
                "dataType": DataType::Ehr,
                "hospitalID": hospital_id,
                "count": patients.len(),
            }),
        )?;
        Ok(patients)
    }
}
