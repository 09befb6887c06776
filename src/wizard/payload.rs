//! Step payloads — the typed view of what each step collects.
//!
//! Drafts travel as JSON objects so partially filled forms survive. The
//! aggregate built at submission decodes each draft into a variant of
//! [`StepPayload`]; fields a variant does not know are kept in its `extra`
//! map, and steps without a variant use [`StepPayload::Extension`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::step::{StepKey, keys};
use crate::packages::BillingCycle;

/// Field name → value for one step.
pub type FieldMap = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompanyDetails {
    pub name: String,
    pub email: String,
    pub registration_number: String,
    pub registration_address: String,
    pub present_address: String,
    pub is_same_as_registration: bool,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPersonDetails {
    pub name: String,
    pub id_number: String,
    pub mobile_number: String,
    pub email: String,
    pub designation: String,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// Upload state of one required document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub is_uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentsPayload {
    pub documents: Vec<DocumentRecord>,
    #[serde(flatten)]
    pub extra: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageSelection {
    pub package_id: Option<String>,
    pub billing_cycle: BillingCycle,
    #[serde(flatten)]
    pub extra: FieldMap,
}

/// One variant per known step, plus an extension slot for the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    CompanyDetails(CompanyDetails),
    ContactPerson(ContactPersonDetails),
    Documents(DocumentsPayload),
    Package(PackageSelection),
    Extension { step: StepKey, fields: FieldMap },
}

impl StepPayload {
    /// Decode a saved draft for `step`.
    ///
    /// Drafts whose shape does not match their step's variant are kept
    /// verbatim as [`StepPayload::Extension`].
    pub fn decode(step: &str, value: &Value) -> Self {
        let decoded = match step {
            keys::COMPANY_DETAILS => {
                serde_json::from_value(value.clone()).map(StepPayload::CompanyDetails)
            }
            keys::CONTACT_PERSON_DETAILS => {
                serde_json::from_value(value.clone()).map(StepPayload::ContactPerson)
            }
            keys::VERIFY_DOCUMENTS => {
                serde_json::from_value(value.clone()).map(StepPayload::Documents)
            }
            keys::CHOOSE_PACKAGE => serde_json::from_value(value.clone()).map(StepPayload::Package),
            _ => return Self::extension(step, value),
        };
        decoded.unwrap_or_else(|e| {
            warn!(step, "Draft does not match its step shape, keeping raw fields: {}", e);
            Self::extension(step, value)
        })
    }

    fn extension(step: &str, value: &Value) -> Self {
        let fields = match value {
            Value::Object(map) => map.clone(),
            Value::Null => FieldMap::new(),
            other => {
                let mut map = FieldMap::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        StepPayload::Extension {
            step: StepKey::from(step),
            fields,
        }
    }

    pub fn to_value(&self) -> Value {
        let encoded = match self {
            StepPayload::CompanyDetails(p) => serde_json::to_value(p),
            StepPayload::ContactPerson(p) => serde_json::to_value(p),
            StepPayload::Documents(p) => serde_json::to_value(p),
            StepPayload::Package(p) => serde_json::to_value(p),
            StepPayload::Extension { fields, .. } => return Value::Object(fields.clone()),
        };
        // Serializing plain structs of strings, bools and JSON values cannot fail.
        encoded.unwrap_or(Value::Null)
    }
}

/// All step drafts merged for submission, keyed by step name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    steps: BTreeMap<StepKey, StepPayload>,
}

impl Aggregate {
    pub fn from_drafts<I>(drafts: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let steps = drafts
            .into_iter()
            .map(|(key, value)| {
                let payload = StepPayload::decode(&key, &value);
                (StepKey::from(key), payload)
            })
            .collect();
        Self { steps }
    }

    pub fn get(&self, step: &str) -> Option<&StepPayload> {
        self.steps.get(step)
    }

    pub fn step_keys(&self) -> impl Iterator<Item = &StepKey> {
        self.steps.keys()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn company_details(&self) -> Option<&CompanyDetails> {
        match self.get(keys::COMPANY_DETAILS)? {
            StepPayload::CompanyDetails(p) => Some(p),
            _ => None,
        }
    }

    pub fn contact_person(&self) -> Option<&ContactPersonDetails> {
        match self.get(keys::CONTACT_PERSON_DETAILS)? {
            StepPayload::ContactPerson(p) => Some(p),
            _ => None,
        }
    }

    pub fn documents(&self) -> Option<&DocumentsPayload> {
        match self.get(keys::VERIFY_DOCUMENTS)? {
            StepPayload::Documents(p) => Some(p),
            _ => None,
        }
    }

    pub fn package(&self) -> Option<&PackageSelection> {
        match self.get(keys::CHOOSE_PACKAGE)? {
            StepPayload::Package(p) => Some(p),
            _ => None,
        }
    }

    /// JSON object keyed by step name.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.steps
                .iter()
                .map(|(key, payload)| (key.to_string(), payload.to_value()))
                .collect(),
        )
    }
}
