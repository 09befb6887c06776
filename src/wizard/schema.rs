//! Declarative per-step schemas.
//!
//! A schema is an ordered list of field rules. Rules may reference sibling
//! fields (confirmation fields, conditional requirements), so they are always
//! evaluated against the full payload snapshot.

use serde_json::{Map, Value};

use super::step::keys;
use crate::packages::PackageCatalog;

/// Whether a field must be present.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Optional,
    Required(String),
    /// Required unless the boolean field `flag` is `true`. When waived and
    /// `mirror_of` is set, the field takes that field's value.
    RequiredUnless {
        flag: String,
        mirror_of: Option<String>,
        message: String,
    },
}

/// Shape constraint on a field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Email(String),
    Number(String),
    Boolean,
    OneOf { values: Vec<String>, message: String },
    /// Array of `{id, isUploaded, downloadUrl}` where every entry is uploaded.
    UploadedDocuments(String),
}

/// Rule for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub requirement: Requirement,
    pub kind: FieldKind,
    pub min_length: Option<(usize, String)>,
    pub equals_field: Option<(String, String)>,
}

impl FieldRule {
    pub fn text() -> Self {
        Self {
            requirement: Requirement::Optional,
            kind: FieldKind::Text,
            min_length: None,
            equals_field: None,
        }
    }

    pub fn email(invalid: &str) -> Self {
        Self {
            kind: FieldKind::Email(invalid.to_string()),
            ..Self::text()
        }
    }

    pub fn number(invalid: &str) -> Self {
        Self {
            kind: FieldKind::Number(invalid.to_string()),
            ..Self::text()
        }
    }

    pub fn boolean() -> Self {
        Self {
            kind: FieldKind::Boolean,
            ..Self::text()
        }
    }

    pub fn one_of<I, S>(values: I, invalid: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: FieldKind::OneOf {
                values: values.into_iter().map(Into::into).collect(),
                message: invalid.to_string(),
            },
            ..Self::text()
        }
    }

    pub fn uploaded_documents(incomplete: &str) -> Self {
        Self {
            kind: FieldKind::UploadedDocuments(incomplete.to_string()),
            ..Self::text()
        }
    }

    pub fn required(mut self, message: &str) -> Self {
        self.requirement = Requirement::Required(message.to_string());
        self
    }

    pub fn required_unless(mut self, flag: &str, mirror_of: Option<&str>, message: &str) -> Self {
        self.requirement = Requirement::RequiredUnless {
            flag: flag.to_string(),
            mirror_of: mirror_of.map(String::from),
            message: message.to_string(),
        };
        self
    }

    pub fn min_length(mut self, min: usize, message: &str) -> Self {
        self.min_length = Some((min, message.to_string()));
        self
    }

    pub fn equals(mut self, field: &str, message: &str) -> Self {
        self.equals_field = Some((field.to_string(), message.to_string()));
        self
    }
}

/// Ordered field rules for one step or form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSchema {
    fields: Vec<(String, FieldRule)>,
}

impl StepSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: FieldRule) -> Self {
        self.fields.push((name.to_string(), rule));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.fields.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rule)| rule)
    }

    /// Copy mirrored values into waived fields.
    ///
    /// For every `RequiredUnless` rule whose flag is `true` and which names a
    /// `mirror_of` field, the field is overwritten with the mirrored value.
    /// Returns whether anything changed.
    pub fn apply_mirrors(&self, payload: &mut Map<String, Value>) -> bool {
        let mut changed = false;
        for (name, rule) in &self.fields {
            if let Requirement::RequiredUnless {
                flag,
                mirror_of: Some(source),
                ..
            } = &rule.requirement
                && is_true(payload.get(flag))
            {
                let mirrored = payload.get(source).cloned().unwrap_or(Value::Null);
                if payload.get(name) != Some(&mirrored) {
                    payload.insert(name.clone(), mirrored);
                    changed = true;
                }
            }
        }
        changed
    }
}

pub(crate) fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

// ── Built-in schemas ────────────────────────────────────────────────────

pub fn company_details() -> StepSchema {
    StepSchema::new()
        .field("name", FieldRule::text().required("Company/Agency Name is required"))
        .field(
            "email",
            FieldRule::email("Invalid email").required("Email is required"),
        )
        .field(
            "registrationNumber",
            FieldRule::text().required("Registration Number is required"),
        )
        .field(
            "registrationAddress",
            FieldRule::text().required("Registration Address is required"),
        )
        .field(
            "presentAddress",
            FieldRule::text().required_unless(
                "isSameAsRegistration",
                Some("registrationAddress"),
                "Present Address is required",
            ),
        )
        .field("isSameAsRegistration", FieldRule::boolean())
}

pub fn contact_person_details() -> StepSchema {
    StepSchema::new()
        .field("name", FieldRule::text().required("Name is required"))
        .field(
            "idNumber",
            FieldRule::text().required("ID/Passport Number is required"),
        )
        .field(
            "mobileNumber",
            FieldRule::text().required("Mobile Number is required"),
        )
        .field(
            "email",
            FieldRule::email("Invalid email").required("Email is required"),
        )
        .field(
            "designation",
            FieldRule::text().required("Designation is required"),
        )
}

pub fn verify_documents() -> StepSchema {
    StepSchema::new().field(
        "documents",
        FieldRule::uploaded_documents("Upload every required document")
            .required("Documents are required"),
    )
}

pub fn choose_package(catalog: &PackageCatalog) -> StepSchema {
    StepSchema::new()
        .field(
            "packageId",
            FieldRule::one_of(catalog.ids(), "Unknown package")
                .required("Please select a package to continue."),
        )
        .field(
            "billingCycle",
            FieldRule::one_of(["monthly", "yearly"], "Billing cycle must be monthly or yearly"),
        )
}

/// Schemas of the subscription wizard keyed by step.
pub fn subscription_schemas(catalog: &PackageCatalog) -> Vec<(&'static str, StepSchema)> {
    vec![
        (keys::COMPANY_DETAILS, company_details()),
        (keys::CONTACT_PERSON_DETAILS, contact_person_details()),
        (keys::VERIFY_DOCUMENTS, verify_documents()),
        (keys::CHOOSE_PACKAGE, choose_package(catalog)),
    ]
}

// ── Auth forms ──────────────────────────────────────────────────────────

pub fn login_form() -> StepSchema {
    StepSchema::new()
        .field(
            "email",
            FieldRule::email("Please enter a valid email").required("Email is required"),
        )
        .field(
            "password",
            FieldRule::text()
                .required("Password is required")
                .min_length(6, "Password must be at least 6 characters"),
        )
}

pub fn register_form() -> StepSchema {
    StepSchema::new()
        .field("name", FieldRule::text().required("Name is required"))
        .field(
            "email",
            FieldRule::email("Please enter a valid email").required("Email is required"),
        )
        .field(
            "password",
            FieldRule::text()
                .required("Password is required")
                .min_length(6, "Password must be at least 6 characters"),
        )
        .field(
            "confirmPassword",
            FieldRule::text()
                .required("Confirm password is required")
                .equals("password", "Passwords must match"),
        )
}

pub fn forgot_password_form() -> StepSchema {
    StepSchema::new().field(
        "email",
        FieldRule::email("Please enter a valid email").required("Email is required"),
    )
}

pub fn reset_password_form() -> StepSchema {
    StepSchema::new()
        .field(
            "password",
            FieldRule::text()
                .required("Password is required")
                .min_length(6, "Password must be at least 6 characters"),
        )
        .field(
            "confirmPassword",
            FieldRule::text()
                .required("Confirm password is required")
                .equals("password", "Passwords must match"),
        )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn mirrors_registration_address_when_flag_set() {
        let schema = company_details();
        let mut payload = object(json!({
            "registrationAddress": "12 Dhanmondi Road",
            "presentAddress": "",
            "isSameAsRegistration": true
        }));
        assert!(schema.apply_mirrors(&mut payload));
        assert_eq!(payload["presentAddress"], "12 Dhanmondi Road");
        // Second application is a no-op.
        assert!(!schema.apply_mirrors(&mut payload));
    }

    #[test]
    fn no_mirror_when_flag_unset() {
        let schema = company_details();
        let mut payload = object(json!({
            "registrationAddress": "12 Dhanmondi Road",
            "presentAddress": "Somewhere else",
            "isSameAsRegistration": false
        }));
        assert!(!schema.apply_mirrors(&mut payload));
        assert_eq!(payload["presentAddress"], "Somewhere else");
    }

    #[test]
    fn rule_lookup_and_field_order() {
        let schema = register_form();
        let names: Vec<&str> = schema.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "email", "password", "confirmPassword"]);
        let confirm = schema.rule("confirmPassword").unwrap();
        assert_eq!(
            confirm.equals_field,
            Some(("password".to_string(), "Passwords must match".to_string()))
        );
        assert!(schema.rule("missing").is_none());
    }

    #[test]
    fn package_schema_uses_catalog_ids() {
        let schema = choose_package(&PackageCatalog::default());
        match &schema.rule("packageId").unwrap().kind {
            FieldKind::OneOf { values, .. } => assert!(values.contains(&"standard".to_string())),
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
