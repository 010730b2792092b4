//! Public gateway operations, grouped by the role that invokes them.
//!
//! Every operation takes the invocation's collaborator handles explicitly,
//! resolves the caller, checks the role allow-list, runs the access decision
//! and records one audit entry on success. Failures leave the write-set to be
//! discarded by the ledger.

mod admin;
mod audit;
mod clinician;
mod insurer;
mod patient;

use ehrgate_auth::{
    AccessDecisionEngine, AuditLog, AuthError, AuthResult, DenyReason, IdentityContext,
};
use ehrgate_core::{AuditAction, DataType, Record};
use ehrgate_storage::Invocation;
use serde_json::{Map, Value, json};

use crate::config::{ConfigError, GatewayConfig};

/// Access-controlled front door to the medical record store.
#[derive(Debug, Clone)]
pub struct Gateway {
    config: GatewayConfig,
}

impl Gateway {
    /// Creates a gateway after validating `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn caller(&self, inv: Invocation<'_>) -> AuthResult<IdentityContext> {
        IdentityContext::resolve(inv.identity, &self.config.identity)
    }

    fn engine<'a>(&self, inv: Invocation<'a>) -> AccessDecisionEngine<'a> {
        AccessDecisionEngine::new(inv.store, inv.tx)
    }

    fn audit_log<'a>(&'a self, inv: Invocation<'a>) -> AuditLog<'a> {
        AuditLog::new(inv.store, inv.tx, &self.config.channels.audit)
    }

    fn record_audit(
        &self,
        inv: Invocation<'_>,
        caller: &IdentityContext,
        action: AuditAction,
        details: Value,
    ) -> AuthResult<()> {
        self.audit_log(inv)
            .record(&caller.subject_id, action, details)?;
        Ok(())
    }

    fn require_insurance_channel(&self, inv: Invocation<'_>) -> AuthResult<()> {
        if inv.tx.channel_id() == self.config.channels.insurance {
            Ok(())
        } else {
            Err(AuthError::access_denied(DenyReason::WrongChannel {
                expected: self.config.channels.insurance.clone(),
            }))
        }
    }

    /// Builds a record from a creation payload owned by `hospital_id`.
    ///
    /// A payload naming another hospital is refused.
    fn new_record(
        &self,
        data_type: DataType,
        patient_id: &str,
        payload: Map<String, Value>,
        hospital_id: &str,
    ) -> AuthResult<Record> {
        require_id("patientId", patient_id)?;
        let record = Record::from_payload(
            data_type,
            patient_id,
            payload,
            hospital_id,
            self.config.records.sensitivity_for(data_type),
        )?;
        if record.hospital_id != hospital_id {
            return Err(AuthError::access_denied(DenyReason::CrossHospital));
        }
        Ok(record)
    }
}

fn require_id(name: &str, value: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        return Err(AuthError::invalid_input(format!("{name} must not be empty")));
    }
    Ok(())
}

fn record_details(record: &Record) -> Value {
    json!({
        "patientId": record.patient_id,
        "dataType": record.data_type,
        "hospitalID": record.hospital_id,
    })
}
