//! AuthService — form validation in front of the identity provider.

use std::sync::Arc;

use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::AuthError;
use crate::gateway::SUBSCRIPTIONS;
use crate::identity::{AuthUser, IdentityProvider, Provider};
use crate::store::DocumentDatabase;
use crate::wizard::payload::FieldMap;
use crate::wizard::schema::{self, StepSchema};
use crate::wizard::validator::{ValidationOutcome, validate_fields};

/// The auth screens' forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthForm {
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
}

impl AuthForm {
    pub fn schema(self) -> StepSchema {
        match self {
            Self::Login => schema::login_form(),
            Self::Register => schema::register_form(),
            Self::ForgotPassword => schema::forgot_password_form(),
            Self::ResetPassword => schema::reset_password_form(),
        }
    }

    pub fn validate(self, fields: &FieldMap) -> ValidationOutcome {
        validate_fields(&self.schema(), fields)
    }
}

/// A completed sign-in and where the app should go next.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIn {
    pub user: AuthUser,
    /// `false` sends the user into the subscription wizard.
    pub is_subscribed: bool,
}

pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    db: Arc<dyn DocumentDatabase>,
}

impl AuthService {
    pub fn new(identity: Arc<dyn IdentityProvider>, db: Arc<dyn DocumentDatabase>) -> Self {
        Self { identity, db }
    }

    pub async fn login(&self, fields: &FieldMap) -> Result<SignedIn, AuthError> {
        ensure_valid(AuthForm::Login, fields)?;
        let user = self
            .identity
            .sign_in(&text(fields, "email"), &secret(fields, "password"))
            .await?;
        self.signed_in(user).await
    }

    pub async fn register(&self, fields: &FieldMap) -> Result<SignedIn, AuthError> {
        ensure_valid(AuthForm::Register, fields)?;
        let user = self
            .identity
            .sign_up(
                &text(fields, "email"),
                &secret(fields, "password"),
                &text(fields, "name"),
            )
            .await?;
        self.signed_in(user).await
    }

    pub async fn sign_in_with(&self, provider: Provider) -> Result<SignedIn, AuthError> {
        let user = self.identity.sign_in_with_provider(provider).await?;
        self.signed_in(user).await
    }

    /// Send a reset link to the address in the forgot-password form.
    pub async fn forgot_password(&self, fields: &FieldMap) -> Result<(), AuthError> {
        ensure_valid(AuthForm::ForgotPassword, fields)?;
        self.identity.reset_password(&text(fields, "email")).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.identity.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    /// A subscription document with a chosen package exists. Errors count
    /// as not subscribed.
    pub async fn is_subscribed(&self, uid: &str) -> bool {
        match self.db.read(SUBSCRIPTIONS, uid).await {
            Ok(Some(doc)) => doc.get("package").is_some_and(|p| !p.is_null()),
            Ok(None) => false,
            Err(e) => {
                warn!(uid, "Check subscription error: {}", e);
                false
            }
        }
    }

    async fn signed_in(&self, user: AuthUser) -> Result<SignedIn, AuthError> {
        let is_subscribed = self.is_subscribed(&user.uid).await;
        Ok(SignedIn {
            user,
            is_subscribed,
        })
    }
}

fn ensure_valid(form: AuthForm, fields: &FieldMap) -> Result<(), AuthError> {
    let outcome = form.validate(fields);
    if outcome.is_valid {
        return Ok(());
    }
    let message = outcome
        .errors
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AuthError::InvalidForm(message))
}

fn text(fields: &FieldMap, name: &str) -> String {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn secret(fields: &FieldMap, name: &str) -> SecretString {
    let raw = fields.get(name).and_then(Value::as_str).unwrap_or_default();
    SecretString::from(raw.to_string())
}
