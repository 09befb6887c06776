//! Identity provider seam — who is signed in.
//!
//! The wizard only needs `current_user()`; the auth screens use the rest.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AuthError;

/// Federated sign-in providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Apple,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::Apple => write!(f, "apple"),
        }
    }
}

/// The signed-in user as seen by the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Identity backend (email/password plus federated providers).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<AuthUser, AuthError>;

    async fn sign_in_with_provider(&self, provider: Provider) -> Result<AuthUser, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn current_user(&self) -> Option<AuthUser>;

    /// Send a password reset message to `email`.
    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;
}

struct Account {
    user: AuthUser,
    password: SecretString,
}

/// In-process identity provider.
///
/// Federated providers only succeed for accounts linked with
/// [`MemoryIdentity::link_provider`].
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: RwLock<HashMap<String, Account>>,
    linked: RwLock<HashMap<Provider, AuthUser>>,
    current: RwLock<Option<AuthUser>>,
    reset_requests: RwLock<Vec<String>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with `user` already signed in.
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            current: RwLock::new(Some(user)),
            ..Self::default()
        }
    }

    pub async fn link_provider(&self, provider: Provider, user: AuthUser) {
        self.linked.write().await.insert(provider, user);
    }

    /// Emails a reset was requested for, oldest first.
    pub async fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.read().await.clone()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, AuthError> {
        let accounts = self.accounts.read().await;
        let account = accounts
            .get(&normalize(email))
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password.expose_secret() != password.expose_secret() {
            return Err(AuthError::InvalidCredentials);
        }
        let user = account.user.clone();
        drop(accounts);

        *self.current.write().await = Some(user.clone());
        tracing::info!(uid = %user.uid, "Signed in");
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<AuthUser, AuthError> {
        let key = normalize(email);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(AuthError::EmailInUse { email: key });
        }
        let user = AuthUser::new(Uuid::new_v4().to_string())
            .with_email(key.clone())
            .with_display_name(name.trim());
        accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: SecretString::from(password.expose_secret().to_string()),
            },
        );
        drop(accounts);

        *self.current.write().await = Some(user.clone());
        tracing::info!(uid = %user.uid, "Account created");
        Ok(user)
    }

    async fn sign_in_with_provider(&self, provider: Provider) -> Result<AuthUser, AuthError> {
        let user = self
            .linked
            .read()
            .await
            .get(&provider)
            .cloned()
            .ok_or_else(|| AuthError::ProviderFailed {
                provider: provider.to_string(),
                reason: "sign-in was cancelled".to_string(),
            })?;
        *self.current.write().await = Some(user.clone());
        tracing::info!(uid = %user.uid, %provider, "Signed in with provider");
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.current.write().await.take().is_none() {
            return Err(AuthError::NotSignedIn);
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<AuthUser> {
        self.current.read().await.clone()
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let key = normalize(email);
        if !self.accounts.read().await.contains_key(&key) {
            return Err(AuthError::UserNotFound { email: key });
        }
        self.reset_requests.write().await.push(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let id = MemoryIdentity::new();
        let created = id
            .sign_up("Nadia@Example.com", &secret("secret1"), "Nadia")
            .await
            .unwrap();
        assert_eq!(created.email.as_deref(), Some("nadia@example.com"));
        assert_eq!(created.display_name.as_deref(), Some("Nadia"));
        assert_eq!(id.current_user().await, Some(created.clone()));

        id.sign_out().await.unwrap();
        assert!(id.current_user().await.is_none());

        let user = id.sign_in("nadia@example.com", &secret("secret1")).await.unwrap();
        assert_eq!(user.uid, created.uid);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicate_email() {
        let id = MemoryIdentity::new();
        id.sign_up("a@b.co", &secret("secret1"), "A").await.unwrap();
        assert!(matches!(
            id.sign_in("a@b.co", &secret("nope")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            id.sign_in("x@b.co", &secret("secret1")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            id.sign_up("A@B.CO", &secret("other1"), "A").await,
            Err(AuthError::EmailInUse { .. })
        ));
    }

    #[tokio::test]
    async fn provider_sign_in_requires_link() {
        let id = MemoryIdentity::new();
        assert!(matches!(
            id.sign_in_with_provider(Provider::Apple).await,
            Err(AuthError::ProviderFailed { ref provider, .. }) if provider == "apple"
        ));

        id.link_provider(Provider::Google, AuthUser::new("g-1")).await;
        let user = id.sign_in_with_provider(Provider::Google).await.unwrap();
        assert_eq!(user.uid, "g-1");
        assert_eq!(id.current_user().await.unwrap().uid, "g-1");
    }

    #[tokio::test]
    async fn sign_out_without_session_fails() {
        let id = MemoryIdentity::new();
        assert!(matches!(id.sign_out().await, Err(AuthError::NotSignedIn)));
    }

    #[tokio::test]
    async fn reset_password_records_known_accounts() {
        let id = MemoryIdentity::new();
        id.sign_up("a@b.co", &secret("secret1"), "A").await.unwrap();
        id.reset_password(" A@b.co ").await.unwrap();
        assert_eq!(id.reset_requests().await, vec!["a@b.co".to_string()]);
        assert!(matches!(
            id.reset_password("ghost@b.co").await,
            Err(AuthError::UserNotFound { .. })
        ));
    }
}
