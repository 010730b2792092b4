//! Caller identity extraction.
//!
//! [`IdentityContext`] is resolved once per invocation from the ledger's
//! [`IdentityProvider`] and is never persisted.

use ehrgate_core::{Clearance, Role};
use ehrgate_storage::IdentityProvider;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, DenyReason};
use crate::AuthResult;

/// Reported as the missing attribute when subjects bind by caller id.
const CALLER_ID_SOURCE: &str = "callerId";

/// How a caller is mapped to the patient id they own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectBinding {
    /// The patient id is the value of the patient-id identity attribute.
    #[default]
    Attribute,
    /// The patient id is the caller id verbatim.
    CallerId,
}

/// Identity attribute names and subject binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub subject_binding: SubjectBinding,
    pub role_attribute: String,
    pub hospital_attribute: String,
    pub clearance_attribute: String,
    pub patient_id_attribute: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            subject_binding: SubjectBinding::Attribute,
            role_attribute: "role".to_string(),
            hospital_attribute: "hospitalID".to_string(),
            clearance_attribute: "clearance".to_string(),
            patient_id_attribute: "patientId".to_string(),
        }
    }
}

impl IdentityConfig {
    /// Names of every attribute the resolver reads, for validation.
    pub fn attribute_names(&self) -> [(&'static str, &str); 4] {
        [
            ("role_attribute", &self.role_attribute),
            ("hospital_attribute", &self.hospital_attribute),
            ("clearance_attribute", &self.clearance_attribute),
            ("patient_id_attribute", &self.patient_id_attribute),
        ]
    }
}

/// Verified attributes of the caller of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub subject_id: String,
    pub role: Role,
    hospital_id: Option<String>,
    pub clearance: Clearance,
    patient_id: Option<String>,
    /// Attribute names reported when a required value is missing
    hospital_source: String,
    patient_source: String,
}

impl IdentityContext {
    /// Reads and validates the caller's attributes.
    ///
    /// A missing clearance defaults to `low`. A missing or unknown role, or a
    /// malformed clearance, is refused.
    pub fn resolve(identity: &dyn IdentityProvider, config: &IdentityConfig) -> AuthResult<Self> {
        let subject_id = identity.caller_id();

        let role = identity
            .attribute(&config.role_attribute)
            .and_then(|r| r.parse::<Role>().ok())
            .ok_or_else(|| invalid_identity(&config.role_attribute))?;

        let clearance = match identity.attribute(&config.clearance_attribute) {
            None => Clearance::default(),
            Some(value) => value
                .parse::<Clearance>()
                .map_err(|_| invalid_identity(&config.clearance_attribute))?,
        };

        let hospital_id = identity
            .attribute(&config.hospital_attribute)
            .filter(|h| !h.is_empty());

        let patient_id = match config.subject_binding {
            SubjectBinding::Attribute => identity.attribute(&config.patient_id_attribute),
            SubjectBinding::CallerId => Some(subject_id.clone()),
        }
        .filter(|p| !p.is_empty());

        tracing::trace!(
            subject = %subject_id,
            role = %role,
            clearance = %clearance,
            "Resolved caller identity"
        );

        let patient_source = match config.subject_binding {
            SubjectBinding::Attribute => config.patient_id_attribute.clone(),
            SubjectBinding::CallerId => CALLER_ID_SOURCE.to_string(),
        };

        Ok(Self {
            subject_id,
            role,
            hospital_id,
            clearance,
            patient_id,
            hospital_source: config.hospital_attribute.clone(),
            patient_source,
        })
    }

    /// Builds a context directly, bypassing the identity provider. Missing
    /// values are reported under the default attribute names.
    pub fn new(
        subject_id: impl Into<String>,
        role: Role,
        hospital_id: Option<String>,
        clearance: Clearance,
        patient_id: Option<String>,
    ) -> Self {
        let defaults = IdentityConfig::default();
        Self {
            subject_id: subject_id.into(),
            role,
            hospital_id,
            clearance,
            patient_id,
            hospital_source: defaults.hospital_attribute,
            patient_source: defaults.patient_id_attribute,
        }
    }

    /// Refuses the call unless the caller's role is in `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> AuthResult<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::info!(subject = %self.subject_id, role = %self.role, "Role not permitted");
            Err(AuthError::access_denied(DenyReason::RoleNotPermitted(self.role)))
        }
    }

    /// The caller's hospital; refused when the credential carries none.
    pub fn hospital_id(&self) -> AuthResult<&str> {
        self.hospital_id
            .as_deref()
            .ok_or_else(|| invalid_identity(&self.hospital_source))
    }

    /// The patient id the caller owns; refused when unbound.
    pub fn patient_id(&self) -> AuthResult<&str> {
        self.patient_id
            .as_deref()
            .ok_or_else(|| invalid_identity(&self.patient_source))
    }

    /// Exact-equality ownership check.
    pub fn owns(&self, patient_id: &str) -> bool {
        self.patient_id.as_deref() == Some(patient_id)
    }
}

fn invalid_identity(attribute: &str) -> AuthError {
    AuthError::access_denied(DenyReason::InvalidIdentity {
        attribute: attribute.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ehrgate_db_memory::StaticIdentity;

    #[test]
    fn test_resolve_doctor() {
        let identity = StaticIdentity::new("dr-bob")
            .with_role(Role::Doctor)
            .with_hospital("H1")
            .with_clearance(Clearance::High);
        let ctx = IdentityContext::resolve(&identity, &IdentityConfig::default()).unwrap();

        assert_eq!(ctx.subject_id, "dr-bob");
        assert_eq!(ctx.role, Role::Doctor);
        assert_eq!(ctx.hospital_id().unwrap(), "H1");
        assert_eq!(ctx.clearance, Clearance::High);
        assert!(ctx.patient_id().is_err());
    }

    #[test]
    fn test_missing_clearance_defaults_to_low() {
        let identity = StaticIdentity::new("n1").with_role(Role::Nurse);
        let ctx = IdentityContext::resolve(&identity, &IdentityConfig::default()).unwrap();
        assert_eq!(ctx.clearance, Clearance::Low);
        assert!(ctx.hospital_id().unwrap_err().is_access_denied());
    }

    #[test]
    fn test_missing_or_unknown_role_is_denied() {
        let config = IdentityConfig::default();

        let err = IdentityContext::resolve(&StaticIdentity::new("x"), &config).unwrap_err();
        assert!(err.is_access_denied());

        let identity = StaticIdentity::new("x").with_attribute("role", "janitor");
        let err = IdentityContext::resolve(&identity, &config).unwrap_err();
        assert_eq!(
            err.deny_reason(),
            Some(&DenyReason::InvalidIdentity {
                attribute: "role".to_string()
            })
        );
    }

    #[test]
    fn test_malformed_clearance_is_denied() {
        let identity = StaticIdentity::new("x")
            .with_role(Role::Doctor)
            .with_attribute("clearance", "top-secret");
        let err = IdentityContext::resolve(&identity, &IdentityConfig::default()).unwrap_err();
        assert!(err.is_access_denied());
    }

    #[test]
    fn test_subject_binding_attribute_is_exact() {
        let identity = StaticIdentity::new("x509::CN=p1-and-p10")
            .with_role(Role::Patient)
            .with_patient_id("p1");
        let ctx = IdentityContext::resolve(&identity, &IdentityConfig::default()).unwrap();

        assert!(ctx.owns("p1"));
        assert!(!ctx.owns("p10"));
        assert!(!ctx.owns(""));
    }

    #[test]
    fn test_subject_binding_caller_id() {
        let config = IdentityConfig {
            subject_binding: SubjectBinding::CallerId,
            ..IdentityConfig::default()
        };
        let identity = StaticIdentity::new("p7")
            .with_role(Role::Patient)
            .with_patient_id("p1");
        let ctx = IdentityContext::resolve(&identity, &config).unwrap();

        assert!(ctx.owns("p7"));
        assert!(!ctx.owns("p1"));
    }

    #[test]
    fn test_require_role_is_an_allow_list() {
        let ctx = IdentityContext::new("a", Role::Auditor, None, Clearance::Low, None);
        assert!(ctx.require_role(&[Role::Admin, Role::Auditor]).is_ok());
        let err = ctx.require_role(&[Role::Admin, Role::Patient]).unwrap_err();
        assert_eq!(err.deny_reason(), Some(&DenyReason::RoleNotPermitted(Role::Auditor)));
    }

    #[test]
    fn test_missing_values_report_configured_attribute_names() {
        let config = IdentityConfig {
            hospital_attribute: "org".to_string(),
            patient_id_attribute: "mrn".to_string(),
            ..IdentityConfig::default()
        };
        let identity = StaticIdentity::new("x").with_role(Role::Patient);
        let ctx = IdentityContext::resolve(&identity, &config).unwrap();

        assert_eq!(
            ctx.hospital_id().unwrap_err().deny_reason(),
            Some(&DenyReason::InvalidIdentity {
                attribute: "org".to_string()
            })
        );
        assert_eq!(
            ctx.patient_id().unwrap_err().deny_reason(),
            Some(&DenyReason::InvalidIdentity {
                attribute: "mrn".to_string()
            })
        );
    }
}
