use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mediated actions that leave an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreatePatient,
    DeletePatient,
    ListPatients,
    ReadRecord,
    UpdateRecord,
    CreateRecord,
    GrantAccess,
    RevokeAccess,
    ListPolicies,
    ReadInsurance,
    UpdateInsurance,
}

impl AuditAction {
    /// Returns the dotted action code stored in the entry
    pub fn code(&self) -> &'static str {
        match self {
            AuditAction::CreatePatient => "patient.create",
            AuditAction::DeletePatient => "patient.delete",
            AuditAction::ListPatients => "patient.list",
            AuditAction::ReadRecord => "record.read",
            AuditAction::UpdateRecord => "record.update",
            AuditAction::CreateRecord => "record.create",
            AuditAction::GrantAccess => "policy.grant",
            AuditAction::RevokeAccess => "policy.revoke",
            AuditAction::ListPolicies => "policy.list",
            AuditAction::ReadInsurance => "insurance.read",
            AuditAction::UpdateInsurance => "insurance.update",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Immutable record of one mediated action, keyed by transaction id.
///
/// `prev_hash` links the entry to its predecessor and `hash` covers every
/// other field, so rewriting or dropping an entry breaks the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub tx_id: String,
    pub sequence: u64,
    pub timestamp: i64,
    pub actor_id: String,
    pub channel: String,
    pub action: String,
    pub details: Value,
    pub prev_hash: String,
    #[serde(default)]
    pub hash: String,
}

impl AuditEntry {
    /// Patient the entry concerns, read from `details.patientId`.
    pub fn patient_id(&self) -> Option<&str> {
        self.details.get("patientId").and_then(Value::as_str)
    }
}
