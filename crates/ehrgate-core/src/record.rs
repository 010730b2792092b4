use crate::error::{CoreError, Result};
use crate::model::{DataType, Sensitivity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const HOSPITAL_ID_FIELD: &str = "hospitalID";
pub const SENSITIVITY_FIELD: &str = "sensitivity";
pub const PATIENT_ID_FIELD: &str = "patientId";
pub const DATA_TYPE_FIELD: &str = "dataType";

/// A medical record stored under `(dataType, patientId)`.
///
/// The stored JSON is the flattened attribute bag plus the four reserved
/// fields, so a value read back from a range scan is self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "patientId")]
    pub patient_id: String,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    #[serde(rename = "hospitalID")]
    pub hospital_id: String,
    pub sensitivity: Sensitivity,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Record {
    /// Builds a record from a creation payload.
    ///
    /// `hospitalID` falls back to `default_hospital` and `sensitivity` to
    /// `default_sensitivity` when the payload omits them.
    pub fn from_payload(
        data_type: DataType,
        patient_id: impl Into<String>,
        mut payload: Map<String, Value>,
        default_hospital: &str,
        default_sensitivity: Sensitivity,
    ) -> Result<Self> {
        let hospital_id = match payload.remove(HOSPITAL_ID_FIELD) {
            None | Some(Value::Null) => default_hospital.to_string(),
            Some(Value::String(h)) if !h.is_empty() => h,
            Some(_) => {
                return Err(CoreError::invalid_record(
                    "hospitalID must be a non-empty string",
                ));
            }
        };
        let sensitivity = match payload.remove(SENSITIVITY_FIELD) {
            None | Some(Value::Null) => default_sensitivity,
            Some(value) => parse_sensitivity(&value)?,
        };
        payload.remove(PATIENT_ID_FIELD);
        payload.remove(DATA_TYPE_FIELD);

        Ok(Self {
            patient_id: patient_id.into(),
            data_type,
            hospital_id,
            sensitivity,
            data: payload,
        })
    }

    /// Merges `updates` into the record.
    ///
    /// `hospitalID`, `patientId` and `dataType` are never overwritten. A
    /// missing or null `sensitivity` keeps the previous label.
    pub fn merge_update(&mut self, mut updates: Map<String, Value>) -> Result<()> {
        updates.remove(HOSPITAL_ID_FIELD);
        updates.remove(PATIENT_ID_FIELD);
        updates.remove(DATA_TYPE_FIELD);
        match updates.remove(SENSITIVITY_FIELD) {
            None | Some(Value::Null) => {}
            Some(value) => self.sensitivity = parse_sensitivity(&value)?,
        }
        for (key, value) in updates {
            self.data.insert(key, value);
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn parse_sensitivity(value: &Value) -> Result<Sensitivity> {
    match value {
        Value::String(s) => s.parse(),
        other => Err(CoreError::invalid_sensitivity(other.to_string())),
    }
}

/// Interprets an operation payload as a JSON object.
pub fn payload_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::invalid_record(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        payload_object(value).unwrap()
    }

    #[test]
    fn test_from_payload_defaults() {
        let record = Record::from_payload(
            DataType::Ehr,
            "p1",
            object(json!({"name": "Alice"})),
            "H1",
            Sensitivity::Medium,
        )
        .unwrap();

        assert_eq!(record.hospital_id, "H1");
        assert_eq!(record.sensitivity, Sensitivity::Medium);
        assert_eq!(record.data.get("name"), Some(&json!("Alice")));
    }

    #[test]
    fn test_from_payload_explicit_fields() {
        let record = Record::from_payload(
            DataType::Lab,
            "p1",
            object(json!({"hospitalID": "H2", "sensitivity": "high", "patientId": "evil"})),
            "H1",
            Sensitivity::Low,
        )
        .unwrap();

        assert_eq!(record.hospital_id, "H2");
        assert_eq!(record.sensitivity, Sensitivity::High);
        assert_eq!(record.patient_id, "p1");
        assert!(!record.data.contains_key("patientId"));
    }

    #[test]
    fn test_from_payload_rejects_bad_sensitivity() {
        let err = Record::from_payload(
            DataType::Ehr,
            "p1",
            object(json!({"sensitivity": "secret"})),
            "H1",
            Sensitivity::Low,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSensitivity(_)));
    }

    #[test]
    fn test_merge_preserves_hospital_and_sensitivity() {
        let mut record = Record::from_payload(
            DataType::Ehr,
            "p1",
            object(json!({"sensitivity": "high", "allergies": []})),
            "H1",
            Sensitivity::Low,
        )
        .unwrap();

        record
            .merge_update(object(json!({"hospitalID": "H9", "allergies": ["penicillin"]})))
            .unwrap();

        assert_eq!(record.hospital_id, "H1");
        assert_eq!(record.sensitivity, Sensitivity::High);
        assert_eq!(record.data["allergies"], json!(["penicillin"]));

        record
            .merge_update(object(json!({"sensitivity": "low"})))
            .unwrap();
        assert_eq!(record.sensitivity, Sensitivity::Low);
    }

    #[test]
    fn test_stored_json_is_flat() {
        let record = Record::from_payload(
            DataType::Insurance,
            "p1",
            object(json!({"policyNumber": "X-1"})),
            "H1",
            Sensitivity::Low,
        )
        .unwrap();
        let json = record.to_json().unwrap();
        assert_eq!(json["patientId"], "p1");
        assert_eq!(json["dataType"], "insurance");
        assert_eq!(json["hospitalID"], "H1");
        assert_eq!(json["sensitivity"], "low");
        assert_eq!(json["policyNumber"], "X-1");

        let bytes = record.to_bytes().unwrap();
        assert_eq!(Record::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn test_payload_must_be_object() {
        assert!(payload_object(json!([1, 2])).is_err());
    }
}
