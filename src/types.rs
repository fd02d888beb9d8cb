/// Shared enums used across the registry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Student gender as stored in the registry (`m` / `f`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "m",
            Gender::F => "f",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(Gender::M),
            "f" => Ok(Gender::F),
            other => Err(UnknownVariant { kind: "gender", value: other.to_string() }),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enrollment status of a student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Enrolled,
    Transferred,
    Graduated,
    Expelled,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 4] = [
        StudentStatus::Enrolled,
        StudentStatus::Transferred,
        StudentStatus::Graduated,
        StudentStatus::Expelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Enrolled => "enrolled",
            StudentStatus::Transferred => "transferred",
            StudentStatus::Graduated => "graduated",
            StudentStatus::Expelled => "expelled",
        }
    }
}

impl FromStr for StudentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "status", value: s.to_string() })
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account role carried in the JWT.
/// `Roo` is the district education authority; `School` is a single school account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Roo,
    School,
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "roo" => Ok(Role::Roo),
            "school" => Ok(Role::School),
            other => Err(UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_only_canonical_values() {
        assert_eq!("graduated".parse::<StudentStatus>().unwrap(), StudentStatus::Graduated);
        assert!("Graduated".parse::<StudentStatus>().is_err());
        assert!("выпущен".parse::<StudentStatus>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Roo).unwrap(), "\"roo\"");
        assert_eq!("School".parse::<Role>().unwrap(), Role::School);
    }
}
