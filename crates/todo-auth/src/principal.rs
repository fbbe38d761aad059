//! Authenticated principal

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Capability granted to every authenticated user
pub const BASELINE_AUTHORITY: &str = "ROLE_USER";

/// Capability marker
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authority(String);

impl Authority {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn baseline() -> Self {
        Self::new(BASELINE_AUTHORITY)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity bound to a single request after its token verified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    /// Display name, when the identity lookup supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub authorities: BTreeSet<Authority>,
}

impl Principal {
    /// Create a principal, granting the baseline authority when none are given
    pub fn new(subject: impl Into<String>, authorities: impl IntoIterator<Item = Authority>) -> Self {
        let mut authorities: BTreeSet<Authority> = authorities.into_iter().collect();
        if authorities.is_empty() {
            authorities.insert(Authority::baseline());
        }

        Self {
            subject: subject.into(),
            name: None,
            authorities,
        }
    }

    /// Principal built from the token alone
    pub fn from_subject(subject: impl Into<String>) -> Self {
        Self::new(subject, std::iter::empty())
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a.as_str() == authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_baseline_authority() {
        let principal = Principal::from_subject("a@b.com");

        assert_eq!(principal.subject, "a@b.com");
        assert_eq!(principal.authorities.len(), 1);
        assert!(principal.has_authority(BASELINE_AUTHORITY));
    }

    #[test]
    fn test_explicit_authorities_kept() {
        let principal = Principal::new(
            "a@b.com",
            [Authority::new("ROLE_USER"), Authority::new("todo:write"), Authority::new("ROLE_USER")],
        );

        assert_eq!(principal.authorities.len(), 2);
        assert!(principal.has_authority("todo:write"));
    }

    #[test]
    fn test_serialized_shape() {
        let principal = Principal::from_subject("a@b.com").with_name(Some("Ada".to_string()));
        let value = serde_json::to_value(&principal).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"subject": "a@b.com", "name": "Ada", "authorities": ["ROLE_USER"]})
        );
    }
}
