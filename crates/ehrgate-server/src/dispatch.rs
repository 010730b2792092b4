//! String-argument dispatcher.
//!
//! Ledger clients invoke the gateway with a function name and a list of
//! string arguments. [`Operation::parse`] turns that into a typed request
//! and [`Gateway::invoke`] runs it, returning the result as JSON.

use ehrgate_auth::{AuthError, AuthResult};
use ehrgate_core::{DataType, PermissionSet, Role, parse_timestamp};
use ehrgate_storage::Invocation;
use serde_json::{Value, json};

use crate::gateway::Gateway;

/// A parsed gateway request.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreatePatient { patient_id: String, data: Value },
    DeletePatient { patient_id: String },
    GetAllPatients,
    ReadMyRecord { data_type: DataType },
    UpdateMyRecord { updates: Value, data_type: DataType },
    GrantAccess {
        role: Role,
        data_type: DataType,
        permissions: PermissionSet,
        expiry: Option<i64>,
    },
    RevokeAccess { role: Role, data_type: DataType },
    ListMyPolicies,
    ReadPatientRecord { patient_id: String, data_type: DataType },
    UpdatePatientRecord {
        patient_id: String,
        data_type: DataType,
        updates: Value,
    },
    CreateLabReport { patient_id: String, data: Value },
    CreatePrescription { patient_id: String, data: Value },
    ReadInsuranceData { patient_id: String },
    UpdateInsuranceData { patient_id: String, updates: Value },
    GetAuditLogs { start: i64, end: i64 },
    VerifyAuditChain,
}

/// Function names accepted by [`Operation::parse`].
pub const FUNCTIONS: [&str; 16] = [
    "createPatient",
    "deletePatient",
    "getAllPatients",
    "readMyRecord",
    "updateMyRecord",
    "grantAccess",
    "revokeAccess",
    "listMyPolicies",
    "readPatientRecord",
    "updatePatientRecord",
    "createLabReport",
    "createPrescription",
    "readInsuranceData",
    "updateInsuranceData",
    "getAuditLogs",
    "verifyAuditChain",
];

impl Operation {
    /// Parses `function(args...)`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` for unknown functions, wrong arity,
    /// malformed JSON payloads and unknown enum values.
    pub fn parse(function: &str, args: &[String]) -> AuthResult<Self> {
        let args = Args { function, args };
        let op = match function {
            "createPatient" => {
                args.arity(2, 2)?;
                Self::CreatePatient {
                    patient_id: args.string(0),
                    data: args.json(1)?,
                }
            }
            "deletePatient" => {
                args.arity(1, 1)?;
                Self::DeletePatient {
                    patient_id: args.string(0),
                }
            }
            "getAllPatients" => {
                args.arity(0, 0)?;
                Self::GetAllPatients
            }
            "readMyRecord" => {
                args.arity(0, 1)?;
                Self::ReadMyRecord {
                    data_type: args.data_type_or_ehr(0)?,
                }
            }
            "updateMyRecord" => {
                args.arity(1, 2)?;
                Self::UpdateMyRecord {
                    updates: args.json(0)?,
                    data_type: args.data_type_or_ehr(1)?,
                }
            }
            "grantAccess" => {
                args.arity(3, 4)?;
                Self::GrantAccess {
                    role: args.parsed(0)?,
                    data_type: args.parsed(1)?,
                    permissions: PermissionSet::parse(&args.args[2])?,
                    expiry: args.optional_timestamp(3)?,
                }
            }
            "revokeAccess" => {
                args.arity(2, 2)?;
                Self::RevokeAccess {
                    role: args.parsed(0)?,
                    data_type: args.parsed(1)?,
                }
            }
            "listMyPolicies" => {
                args.arity(0, 0)?;
                Self::ListMyPolicies
            }
            "readPatientRecord" => {
                args.arity(2, 2)?;
                Self::ReadPatientRecord {
                    patient_id: args.string(0),
                    data_type: args.parsed(1)?,
                }
            }
            "updatePatientRecord" => {
                args.arity(3, 3)?;
                Self::UpdatePatientRecord {
                    patient_id: args.string(0),
                    data_type: args.parsed(1)?,
                    updates: args.json(2)?,
                }
            }
            "createLabReport" => {
                args.arity(2, 2)?;
                Self::CreateLabReport {
                    patient_id: args.string(0),
                    data: args.json(1)?,
                }
            }
            "createPrescription" => {
                args.arity(2, 2)?;
                Self::CreatePrescription {
                    patient_id: args.string(0),
                    data: args.json(1)?,
                }
            }
            "readInsuranceData" => {
                args.arity(1, 1)?;
                Self::ReadInsuranceData {
                    patient_id: args.string(0),
                }
            }
            "updateInsuranceData" => {
                args.arity(2, 2)?;
                Self::UpdateInsuranceData {
                    patient_id: args.string(0),
                    updates: args.json(1)?,
                }
            }
            "getAuditLogs" => {
                args.arity(2, 2)?;
                Self::GetAuditLogs {
                    start: args.timestamp(0)?,
                    end: args.timestamp(1)?,
                }
            }
            "verifyAuditChain" => {
                args.arity(0, 0)?;
                Self::VerifyAuditChain
            }
            other => {
                return Err(AuthError::invalid_input(format!(
                    "unknown function {other:?}"
                )));
            }
        };
        Ok(op)
    }
}

struct Args<'a> {
    function: &'a str,
    args: &'a [String],
}

impl Args<'_> {
    fn arity(&self, min: usize, max: usize) -> AuthResult<()> {
        let n = self.args.len();
        if n < min || n > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            };
            return Err(AuthError::invalid_input(format!(
                "{} expects {expected} argument(s), got {n}",
                self.function
            )));
        }
        Ok(())
    }

    fn string(&self, i: usize) -> String {
        self.args[i].clone()
    }

    fn json(&self, i: usize) -> AuthResult<Value> {
        serde_json::from_str(&self.args[i]).map_err(|e| {
            AuthError::invalid_input(format!(
                "{} argument {} is not valid JSON: {e}",
                self.function,
                i + 1
            ))
        })
    }

    fn parsed<T>(&self, i: usize) -> AuthResult<T>
    where
        T: std::str::FromStr<Err = ehrgate_core::CoreError>,
    {
        Ok(self.args[i].parse::<T>()?)
    }

    fn data_type_or_ehr(&self, i: usize) -> AuthResult<DataType> {
        match self.args.get(i).map(String::as_str) {
            None | Some("") => Ok(DataType::Ehr),
            Some(_) => self.parsed(i),
        }
    }

    fn timestamp(&self, i: usize) -> AuthResult<i64> {
        Ok(parse_timestamp(&self.args[i])?)
    }

    fn optional_timestamp(&self, i: usize) -> AuthResult<Option<i64>> {
        match self.args.get(i).map(|s| s.trim()) {
            None | Some("") => Ok(None),
            Some(_) => self.timestamp(i).map(Some),
        }
    }
}

impl Gateway {
    /// Parses and runs one string-argument invocation.
    pub fn invoke(&self, inv: Invocation<'_>, function: &str, args: &[String]) -> AuthResult<Value> {
        let op = Operation::parse(function, args)?;
        tracing::debug!(function, tx_id = %inv.tx.tx_id(), channel = %inv.tx.channel_id(), "Invoking");
        self.execute(inv, op)
    }

    /// Runs a parsed operation, returning its result as JSON.
    pub fn execute(&self, inv: Invocation<'_>, op: Operation) -> AuthResult<Value> {
        let value = match op {
            Operation::CreatePatient { patient_id, data } => {
                self.create_patient(inv, &patient_id, data)?.to_json()?
            }
            Operation::DeletePatient { patient_id } => {
                self.delete_patient(inv, &patient_id)?;
                json!({"deleted": patient_id})
            }
            Operation::GetAllPatients => to_value(&self.get_all_patients(inv)?)?,
            Operation::ReadMyRecord { data_type } => self.read_my_record(inv, data_type)?.to_json()?,
            Operation::UpdateMyRecord { updates, data_type } => {
                self.update_my_record(inv, updates, data_type)?.to_json()?
            }
            Operation::GrantAccess {
                role,
                data_type,
                permissions,
                expiry,
            } => to_value(&self.grant_access(inv, role, data_type, permissions, expiry)?)?,
            Operation::RevokeAccess { role, data_type } => {
                self.revoke_access(inv, role, data_type)?;
                json!({"revoked": {"role": role, "dataType": data_type}})
            }
            Operation::ListMyPolicies => to_value(&self.list_my_policies(inv)?)?,
            Operation::ReadPatientRecord {
                patient_id,
                data_type,
            } => self.read_patient_record(inv, &patient_id, data_type)?.to_json()?,
            Operation::UpdatePatientRecord {
                patient_id,
                data_type,
                updates,
            } => self
                .update_patient_record(inv, &patient_id, data_type, updates)?
                .to_json()?,
            Operation::CreateLabReport { patient_id, data } => {
                self.create_lab_report(inv, &patient_id, data)?.to_json()?
            }
            Operation::CreatePrescription { patient_id, data } => {
                self.create_prescription(inv, &patient_id, data)?.to_json()?
            }
            Operation::ReadInsuranceData { patient_id } => {
                self.read_insurance_data(inv, &patient_id)?.to_json()?
            }
            Operation::UpdateInsuranceData {
                patient_id,
                updates,
            } => self
                .update_insurance_data(inv, &patient_id, updates)?
                .to_json()?,
            Operation::GetAuditLogs { start, end } => {
                to_value(&self.get_audit_logs(inv, start, end)?)?
            }
            Operation::VerifyAuditChain => {
                json!({"verifiedEntries": self.verify_audit_chain(inv)?})
            }
        };
        Ok(value)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> AuthResult<Value> {
    serde_json::to_value(value).map_err(|e| AuthError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehrgate_core::Permission;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_grant_access() {
        let op = Operation::parse("grantAccess", &args(&["doctor", "lab", "read,write", "2030-01-01T00:00:00Z"]))
            .unwrap();
        let Operation::GrantAccess {
            role,
            data_type,
            permissions,
            expiry,
        } = op
        else {
            panic!("expected GrantAccess");
        };
        assert_eq!(role, Role::Doctor);
        assert_eq!(data_type, DataType::Lab);
        assert!(permissions.contains(Permission::Write));
        assert_eq!(expiry, Some(1_893_456_000));

        let op = Operation::parse("grantAccess", &args(&["nurse", "ehr", "read"])).unwrap();
        assert!(matches!(op, Operation::GrantAccess { expiry: None, .. }));
    }

    #[test]
    fn test_parse_defaults_data_type_to_ehr() {
        assert_eq!(
            Operation::parse("readMyRecord", &[]).unwrap(),
            Operation::ReadMyRecord {
                data_type: DataType::Ehr
            }
        );
        assert_eq!(
            Operation::parse("readMyRecord", &args(&["lab"])).unwrap(),
            Operation::ReadMyRecord {
                data_type: DataType::Lab
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let cases: &[(&str, &[&str])] = &[
            ("createPatient", &["p1"]),
            ("createPatient", &["p1", "{not json"]),
            ("readPatientRecord", &["p1", "xray"]),
            ("grantAccess", &["doctor", "ehr", ""]),
            ("grantAccess", &["doctor", "ehr", "read,delete"]),
            ("getAuditLogs", &["yesterday", "10"]),
            ("getAllPatients", &["extra"]),
            ("dropTables", &[]),
        ];
        for (function, values) in cases {
            let err = Operation::parse(function, &args(values)).unwrap_err();
            assert!(err.is_invalid_input(), "{function} {values:?}: {err}");
        }
    }

    #[test]
    fn test_every_function_name_parses_with_valid_arity() {
        let samples: [&[&str]; 16] = [
            &["p1", "{}"],
            &["p1"],
            &[],
            &[],
            &["{}"],
            &["doctor", "ehr", "read"],
            &["doctor", "ehr"],
            &[],
            &["p1", "ehr"],
            &["p1", "ehr", "{}"],
            &["p1", "{}"],
            &["p1", "{}"],
            &["p1"],
            &["p1", "{}"],
            &["0", "10"],
            &[],
        ];
        for (function, values) in FUNCTIONS.iter().zip(samples) {
            assert!(Operation::parse(function, &args(values)).is_ok(), "{function}");
        }
    }
}
