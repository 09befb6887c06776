//! Step identifiers and the built-in subscription wizard steps.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Unique identifier of a wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepKey(String);

impl StepKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StepKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One screen of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub key: StepKey,
    pub label: String,
    /// Position in traversal order, assigned by the sequencer.
    pub ordinal: usize,
}

/// Keys of the subscription wizard, in traversal order.
pub mod keys {
    pub const COMPANY_DETAILS: &str = "CompanyDetails";
    pub const CONTACT_PERSON_DETAILS: &str = "ContactPersonDetails";
    pub const VERIFY_DOCUMENTS: &str = "VerifyDocuments";
    pub const CHOOSE_PACKAGE: &str = "ChoosePackage";
}

/// `(key, label)` pairs of the subscription wizard.
pub fn subscription_steps() -> Vec<(StepKey, String)> {
    vec![
        (keys::COMPANY_DETAILS.into(), "Company Details".to_string()),
        (keys::CONTACT_PERSON_DETAILS.into(), "Contact Person Details".to_string()),
        (keys::VERIFY_DOCUMENTS.into(), "Verify Documents".to_string()),
        (keys::CHOOSE_PACKAGE.into(), "Choose Package".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_is_transparent() {
        let key = StepKey::from("CompanyDetails");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"CompanyDetails\"");
        let parsed: StepKey = serde_json::from_str("\"ChoosePackage\"").unwrap();
        assert_eq!(parsed.as_str(), "ChoosePackage");
    }

    #[test]
    fn subscription_steps_order() {
        let keys: Vec<String> = subscription_steps()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["CompanyDetails", "ContactPersonDetails", "VerifyDocuments", "ChoosePackage"]
        );
    }
}
