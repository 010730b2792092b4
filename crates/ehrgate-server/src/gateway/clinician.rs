use ehrgate_auth::{AuthError, AuthResult, DenyReason};
use ehrgate_core::{AuditAction, DataType, Permission, Record, Role, payload_object};
use ehrgate_storage::{Invocation, RecordStore};
use serde_json::{Value, json};

use super::{Gateway, record_details};

impl Gateway {
    /// Doctors read through a delegation policy; nurses read any
    /// non-insurance record of their own hospital.
    pub fn read_patient_record(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        data_type: DataType,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Doctor, Role::Nurse])?;
        let engine = self.engine(inv);

        let record = match caller.role {
            Role::Nurse if data_type == DataType::Insurance => {
                return Err(AuthError::access_denied(DenyReason::RoleNotPermitted(
                    Role::Nurse,
                )));
            }
            Role::Nurse => engine.authorize_owner(&caller, patient_id, data_type)?,
            _ => engine.authorize(&caller, patient_id, data_type, Permission::Read)?,
        };

        self.record_audit(
            inv,
            &caller,
            AuditAction::ReadRecord,
            json!({"patientId": patient_id, "dataType": data_type}),
        )?;
        Ok(record)
    }

    /// Merges `updates` into a record the doctor holds `write` delegation on.
    pub fn update_patient_record(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        data_type: DataType,
        updates: Value,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Doctor])?;
        let updates = payload_object(updates)?;

        let engine = self.engine(inv);
        let mut record = engine.authorize(&caller, patient_id, data_type, Permission::Write)?;
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

    pub fn create_lab_report(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        data: Value,
    ) -> AuthResult<Record> {
        self.create_clinical_record(inv, DataType::Lab, patient_id, data)
    }

    pub fn create_prescription(
        &self,
        inv: Invocation<'_>,
        patient_id: &str,
        data: Value,
    ) -> AuthResult<Record> {
        self.create_clinical_record(inv, DataType::Prescription, patient_id, data)
    }

    // The patient must be registered (ehr) in the doctor's hospital.
    fn create_clinical_record(
        &self,
        inv: Invocation<'_>,
        data_type: DataType,
        patient_id: &str,
        data: Value,
    ) -> AuthResult<Record> {
        let caller = self.caller(inv)?;
        caller.require_role(&[Role::Doctor])?;
        let hospital_id = caller.hospital_id()?;
        let payload = payload_object(data)?;

        let engine = self.engine(inv);
        let records = RecordStore::new(inv.store);
        let ehr = records.get(DataType::Ehr, patient_id)?;
        engine.check_hospital(&caller, &ehr)?;

        let record = self.new_record(data_type, patient_id, payload, hospital_id)?;
        engine.check_clearance(&caller, &record)?;
        records.create(&record)?;

        tracing::info!(patient_id, data_type = %data_type, "Clinical record created");
        self.record_audit(inv, &caller, AuditAction::CreateRecord, record_details(&record))?;
        Ok(record)
    }
}
