use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Partition of the record space a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Ehr,
    Lab,
    Prescription,
    Insurance,
}

impl DataType {
    pub const ALL: [DataType; 4] = [
        DataType::Ehr,
        DataType::Lab,
        DataType::Prescription,
        DataType::Insurance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Ehr => "ehr",
            DataType::Lab => "lab",
            DataType::Prescription => "prescription",
            DataType::Insurance => "insurance",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ehr" => Ok(DataType::Ehr),
            "lab" => Ok(DataType::Lab),
            "prescription" => Ok(DataType::Prescription),
            "insurance" => Ok(DataType::Insurance),
            other => Err(CoreError::invalid_data_type(other)),
        }
    }
}

/// Data sensitivity label carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Low => "low",
            Sensitivity::Medium => "medium",
            Sensitivity::High => "high",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensitivity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            other => Err(CoreError::invalid_sensitivity(other)),
        }
    }
}

/// Caller clearance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Clearance {
    #[default]
    Low,
    Medium,
    High,
}

impl Clearance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Clearance::Low => "low",
            Clearance::Medium => "medium",
            Clearance::High => "high",
        }
    }

    /// Mandatory gate: `high` data is only visible to `high` clearance.
    pub fn permits(&self, sensitivity: Sensitivity) -> bool {
        sensitivity != Sensitivity::High || *self == Clearance::High
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Clearance {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Clearance::Low),
            "medium" => Ok(Clearance::Medium),
            "high" => Ok(Clearance::High),
            other => Err(CoreError::invalid_clearance(other)),
        }
    }
}

/// Organizational role carried in the caller's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Patient,
    Doctor,
    Nurse,
    Insurer,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Insurer => "insurer",
            Role::Auditor => "auditor",
        }
    }

    /// Roles a patient may delegate access to.
    pub fn is_delegable(&self) -> bool {
        matches!(
            self,
            Role::Doctor | Role::Nurse | Role::Insurer | Role::Auditor
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "insurer" => Ok(Role::Insurer),
            "auditor" => Ok(Role::Auditor),
            other => Err(CoreError::invalid_role(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(CoreError::invalid_permission(other)),
        }
    }
}

/// Non-empty set of permissions granted by a policy.
///
/// Serializes as a sorted list; decoding goes through [`PermissionSet::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<Permission>")]
pub struct PermissionSet(BTreeSet<Permission>);

impl TryFrom<BTreeSet<Permission>> for PermissionSet {
    type Error = CoreError;

    fn try_from(set: BTreeSet<Permission>) -> Result<Self, Self::Error> {
        Self::new(set)
    }
}

impl PermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Result<Self, CoreError> {
        let set: BTreeSet<Permission> = permissions.into_iter().collect();
        if set.is_empty() {
            return Err(CoreError::invalid_permission("permission list is empty"));
        }
        Ok(Self(set))
    }

    /// Parses a comma separated list such as `"read,write"`.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        let permissions = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Permission::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(permissions)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(Permission::as_str).collect();
        f.write_str(&joined.join(","))
    }
}
