use ehrgate_core::{Clearance, Role};
use ehrgate_storage::IdentityProvider;
use std::collections::HashMap;

/// Fixed caller identity, standing in for a verified certificate.
///
/// # Example
///
/// ```ignore
/// use ehrgate_core::Role;
/// use ehrgate_db_memory::StaticIdentity;
///
/// let doctor = StaticIdentity::new("x509::CN=dr-bob")
///     .with_role(Role::Doctor)
///     .with_hospital("H1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    caller_id: String,
    attributes: HashMap<String, String>,
}

impl StaticIdentity {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_role(self, role: Role) -> Self {
        self.with_attribute("role", role.as_str())
    }

    pub fn with_hospital(self, hospital_id: impl Into<String>) -> Self {
        self.with_attribute("hospitalID", hospital_id)
    }

    pub fn with_clearance(self, clearance: Clearance) -> Self {
        self.with_attribute("clearance", clearance.as_str())
    }

    pub fn with_patient_id(self, patient_id: impl Into<String>) -> Self {
        self.with_attribute("patientId", patient_id)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }
}

impl IdentityProvider for StaticIdentity {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn caller_id(&self) -> String {
        self.caller_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_attributes() {
        let id = StaticIdentity::new("nurse-1")
            .with_role(Role::Nurse)
            .with_hospital("H1")
            .with_clearance(Clearance::High);

        assert_eq!(id.caller_id(), "nurse-1");
        assert_eq!(id.attribute("role").as_deref(), Some("nurse"));
        assert_eq!(id.attribute("hospitalID").as_deref(), Some("H1"));
        assert_eq!(id.attribute("clearance").as_deref(), Some("high"));
        assert_eq!(id.attribute("patientId"), None);
    }
}
