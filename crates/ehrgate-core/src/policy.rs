use crate::error::Result;
use crate::model::{DataType, Permission, PermissionSet, Role};
use serde::{Deserialize, Serialize};

/// Patient-issued delegation grant for one `(patientId, role, dataType)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub patient_id: String,
    pub role: Role,
    pub data_type: DataType,
    pub permissions: PermissionSet,
    /// Absolute unix seconds after which the grant no longer applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<i64>,
    pub granted_by: String,
    pub granted_at: i64,
}

impl Policy {
    /// Expiry is lazy: an expired policy stays stored but stops granting.
    pub fn is_live(&self, now: i64) -> bool {
        match self.expiry {
            Some(expiry) => expiry > now,
            None => true,
        }
    }

    pub fn grants(&self, permission: Permission, now: i64) -> bool {
        self.permissions.contains(permission) && self.is_live(now)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(permissions: &str, expiry: Option<i64>) -> Policy {
        Policy {
            patient_id: "p1".to_string(),
            role: Role::Doctor,
            data_type: DataType::Ehr,
            permissions: PermissionSet::parse(permissions).unwrap(),
            expiry,
            granted_by: "p1".to_string(),
            granted_at: 100,
        }
    }

    #[test]
    fn test_policy_without_expiry_is_live() {
        let p = policy("read", None);
        assert!(p.is_live(i64::MAX));
        assert!(p.grants(Permission::Read, 1_000));
        assert!(!p.grants(Permission::Write, 1_000));
    }

    #[test]
    fn test_expiry_boundary() {
        let p = policy("read,write", Some(500));
        assert!(p.grants(Permission::Write, 499));
        assert!(!p.grants(Permission::Write, 500));
        assert!(!p.grants(Permission::Read, 501));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(policy("read", Some(10))).unwrap();
        assert_eq!(json["patientId"], "p1");
        assert_eq!(json["role"], "doctor");
        assert_eq!(json["dataType"], "ehr");
        assert_eq!(json["permissions"], serde_json::json!(["read"]));
        assert_eq!(json["expiry"], 10);

        let json = serde_json::to_value(policy("read", None)).unwrap();
        assert!(json.get("expiry").is_none());
    }
}
