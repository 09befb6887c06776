//! StepValidator — pure, synchronous schema validation.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::schema::{FieldKind, FieldRule, Requirement, StepSchema, is_true};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Result of validating one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Field name → first failing message.
    pub errors: BTreeMap<String, String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: BTreeMap::new(),
        }
    }

    fn from_errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Schemas keyed by step (or form) name.
#[derive(Debug, Clone, Default)]
pub struct StepValidator {
    schemas: HashMap<String, StepSchema>,
}

impl StepValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, step_key: impl Into<String>, schema: StepSchema) -> Self {
        self.schemas.insert(step_key.into(), schema);
        self
    }

    pub fn schema(&self, step_key: &str) -> Option<&StepSchema> {
        self.schemas.get(step_key)
    }

    /// Validate `payload` against the schema registered for `step_key`.
    ///
    /// Steps without a schema are always valid; non-object payloads are
    /// validated as empty objects.
    pub fn validate(&self, step_key: &str, payload: &Value) -> ValidationOutcome {
        let Some(schema) = self.schemas.get(step_key) else {
            return ValidationOutcome::valid();
        };
        let empty = Map::new();
        let fields = payload.as_object().unwrap_or(&empty);
        let outcome = validate_fields(schema, fields);
        debug!(
            step = step_key,
            valid = outcome.is_valid,
            errors = outcome.errors.len(),
            "Validated step"
        );
        outcome
    }
}

/// Validate a field map against a schema.
pub fn validate_fields(schema: &StepSchema, payload: &Map<String, Value>) -> ValidationOutcome {
    let errors = schema
        .fields()
        .filter_map(|(name, rule)| {
            check_field(rule, payload.get(name), payload).map(|msg| (name.to_string(), msg))
        })
        .collect();
    ValidationOutcome::from_errors(errors)
}

/// First failing check for one field, if any.
fn check_field(rule: &FieldRule, value: Option<&Value>, payload: &Map<String, Value>) -> Option<String> {
    let present = is_present(value);

    match &rule.requirement {
        Requirement::Optional => {}
        Requirement::Required(message) => {
            if !present {
                return Some(message.clone());
            }
        }
        Requirement::RequiredUnless { flag, message, .. } => {
            if is_true(payload.get(flag)) {
                return None;
            }
            if !present {
                return Some(message.clone());
            }
        }
    }

    // Absent optional fields pass every remaining check.
    let value = value.filter(|_| present)?;

    if let Some(message) = check_kind(&rule.kind, value) {
        return Some(message);
    }

    if let Some((min, message)) = &rule.min_length {
        let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0);
        if len < *min {
            return Some(message.clone());
        }
    }

    if let Some((other, message)) = &rule.equals_field
        && payload.get(other) != Some(value)
    {
        return Some(message.clone());
    }

    None
}

fn check_kind(kind: &FieldKind, value: &Value) -> Option<String> {
    match kind {
        FieldKind::Text => None,
        FieldKind::Boolean => (!value.is_boolean()).then(|| "Must be true or false".to_string()),
        FieldKind::Email(message) => match value.as_str() {
            Some(s) if EMAIL_RE.is_match(s.trim()) => None,
            _ => Some(message.clone()),
        },
        FieldKind::Number(message) => {
            let ok = match value {
                Value::Number(_) => true,
                Value::String(s) => s.trim().parse::<f64>().is_ok(),
                _ => false,
            };
            (!ok).then(|| message.clone())
        }
        FieldKind::OneOf { values, message } => match value.as_str() {
            Some(s) if values.iter().any(|v| v == s) => None,
            _ => Some(message.clone()),
        },
        FieldKind::UploadedDocuments(message) => {
            let all_uploaded = value.as_array().is_some_and(|docs| {
                !docs.is_empty()
                    && docs
                        .iter()
                        .all(|d| d.get("isUploaded").and_then(Value::as_bool) == Some(true))
            });
            (!all_uploaded).then(|| message.clone())
        }
    }
}

/// Empty strings, `null` and missing fields count as absent.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::packages::PackageCatalog;
    use crate::wizard::schema::{self, FieldRule};
    use crate::wizard::step::keys;

    fn subscription_validator() -> StepValidator {
        schema::subscription_schemas(&PackageCatalog::default())
            .into_iter()
            .fold(StepValidator::new(), |v, (key, schema)| v.with_schema(key, schema))
    }

    fn valid_company() -> Value {
        json!({
            "name": "Acme Manpower",
            "email": "info@acme.example",
            "registrationNumber": "REG-001",
            "registrationAddress": "12 Dhanmondi Road",
            "presentAddress": "45 Gulshan Avenue",
            "isSameAsRegistration": false
        })
    }

    #[test]
    fn present_address_waived_when_same_as_registration() {
        let v = subscription_validator();
        let mut payload = valid_company();
        payload["presentAddress"] = json!("");
        payload["isSameAsRegistration"] = json!(true);
        let outcome = v.validate(keys::COMPANY_DETAILS, &payload);
        assert!(outcome.is_valid, "{:?}", outcome.errors);

        payload["isSameAsRegistration"] = json!(false);
        let outcome = v.validate(keys::COMPANY_DETAILS, &payload);
        assert!(!outcome.is_valid);
        assert_eq!(
            outcome.errors.get("presentAddress").map(String::as_str),
            Some("Present Address is required")
        );
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn conditional_waiver_minimal_schema() {
        let schema = StepSchema::new()
            .field(
                "presentAddress",
                FieldRule::text().required_unless("isSameAsRegistration", None, "required"),
            )
            .field("isSameAsRegistration", FieldRule::boolean());
        let v = StepValidator::new().with_schema("S", schema);

        assert!(v.validate("S", &json!({"isSameAsRegistration": true, "presentAddress": ""})).is_valid);
        let outcome = v.validate("S", &json!({"isSameAsRegistration": false, "presentAddress": ""}));
        assert!(!outcome.is_valid);
        assert!(outcome.errors.contains_key("presentAddress"));
    }

    #[test]
    fn boolean_fields_reject_other_types() {
        let v = subscription_validator();
        let mut payload = valid_company();
        payload["isSameAsRegistration"] = json!("yes");
        let outcome = v.validate(keys::COMPANY_DETAILS, &payload);
        assert!(!outcome.is_valid);
        assert_eq!(outcome.errors["isSameAsRegistration"], "Must be true or false");

        payload["isSameAsRegistration"] = json!(null);
        assert!(v.validate(keys::COMPANY_DETAILS, &payload).is_valid);
    }

    #[test]
    fn validate_is_pure() {
        let v = subscription_validator();
        let payload = json!({"name": "", "email": "nope"});
        let before = payload.clone();
        let first = v.validate(keys::COMPANY_DETAILS, &payload);
        let second = v.validate(keys::COMPANY_DETAILS, &payload);
        assert_eq!(first, second);
        assert_eq!(payload, before);
    }

    #[test]
    fn required_and_email_messages() {
        let v = subscription_validator();
        let outcome = v.validate(
            keys::CONTACT_PERSON_DETAILS,
            &json!({"name": "  ", "email": "not-an-email"}),
        );
        assert!(!outcome.is_valid);
        assert_eq!(outcome.errors["name"], "Name is required");
        assert_eq!(outcome.errors["email"], "Invalid email");
        assert_eq!(outcome.errors["idNumber"], "ID/Passport Number is required");
        assert_eq!(outcome.errors["mobileNumber"], "Mobile Number is required");
        assert_eq!(outcome.errors["designation"], "Designation is required");
    }

    #[test]
    fn valid_company_passes() {
        let v = subscription_validator();
        assert!(v.validate(keys::COMPANY_DETAILS, &valid_company()).is_valid);
    }

    #[test]
    fn missing_schema_is_valid_and_non_object_is_empty() {
        let v = subscription_validator();
        assert!(v.validate("Unknown", &json!(null)).is_valid);
        let outcome = v.validate(keys::COMPANY_DETAILS, &json!("garbage"));
        assert!(!outcome.is_valid);
        assert_eq!(outcome.errors["name"], "Company/Agency Name is required");
    }

    #[test]
    fn documents_must_all_be_uploaded() {
        let v = subscription_validator();
        let partial = json!({"documents": [
            {"id": "gov_id", "isUploaded": true, "downloadUrl": "mem://a"},
            {"id": "trade_license", "isUploaded": false}
        ]});
        assert!(!v.validate(keys::VERIFY_DOCUMENTS, &partial).is_valid);

        let complete = json!({"documents": [
            {"id": "gov_id", "isUploaded": true, "downloadUrl": "mem://a"},
            {"id": "trade_license", "isUploaded": true, "downloadUrl": "mem://b"}
        ]});
        assert!(v.validate(keys::VERIFY_DOCUMENTS, &complete).is_valid);
        assert!(!v.validate(keys::VERIFY_DOCUMENTS, &json!({"documents": []})).is_valid);
    }

    #[test]
    fn package_selection_rules() {
        let v = subscription_validator();
        let outcome = v.validate(keys::CHOOSE_PACKAGE, &json!({"billingCycle": "yearly"}));
        assert_eq!(outcome.errors["packageId"], "Please select a package to continue.");

        let outcome = v.validate(
            keys::CHOOSE_PACKAGE,
            &json!({"packageId": "platinum", "billingCycle": "weekly"}),
        );
        assert_eq!(outcome.errors["packageId"], "Unknown package");
        assert!(outcome.errors.contains_key("billingCycle"));

        assert!(v
            .validate(keys::CHOOSE_PACKAGE, &json!({"packageId": "standard"}))
            .is_valid);
    }

    #[test]
    fn register_form_confirmation_and_min_length() {
        let schema = schema::register_form();
        let outcome = validate_fields(
            &schema,
            json!({
                "name": "Nadia",
                "email": "nadia@example.com",
                "password": "abc",
                "confirmPassword": "abd"
            })
            .as_object()
            .unwrap(),
        );
        assert_eq!(outcome.errors["password"], "Password must be at least 6 characters");
        assert_eq!(outcome.errors["confirmPassword"], "Passwords must match");

        let outcome = validate_fields(
            &schema,
            json!({
                "name": "Nadia",
                "email": "nadia@example.com",
                "password": "secret1",
                "confirmPassword": "secret1"
            })
            .as_object()
            .unwrap(),
        );
        assert!(outcome.is_valid);
    }

    #[test]
    fn number_kind_accepts_numeric_strings() {
        let schema = StepSchema::new().field("age", FieldRule::number("Must be a number"));
        let ok = validate_fields(&schema, json!({"age": "42"}).as_object().unwrap());
        assert!(ok.is_valid);
        let bad = validate_fields(&schema, json!({"age": "forty"}).as_object().unwrap());
        assert_eq!(bad.errors["age"], "Must be a number");
        let absent = validate_fields(&schema, &Map::new());
        assert!(absent.is_valid);
    }
}
