//! SubmissionGateway — where the finished wizard goes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::GatewayError;
use crate::identity::IdentityProvider;
use crate::packages::{BillingCycle, Package, PackageCatalog};
use crate::store::{DocumentDatabase, WriteOptions};
use crate::wizard::payload::{Aggregate, DocumentRecord, StepPayload};
use crate::wizard::step::keys;

/// Collection holding one subscription document per user.
pub const SUBSCRIPTIONS: &str = "subscriptions";

/// Receives the aggregate of every step on final submission.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn write(&self, aggregate: &Aggregate) -> Result<(), GatewayError>;
}

/// The document written to `subscriptions/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub company_details: Value,
    pub contact_person_details: Value,
    pub documents: Vec<DocumentRecord>,
    pub package: Option<Package>,
    pub billing_cycle: BillingCycle,
    pub is_verified_by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Build the record for `user_id`. Missing steps become empty values.
    pub fn from_aggregate(
        user_id: &str,
        aggregate: &Aggregate,
        catalog: &PackageCatalog,
        now: DateTime<Utc>,
    ) -> Self {
        let step_value = |key: &str| {
            aggregate
                .get(key)
                .map(StepPayload::to_value)
                .unwrap_or_else(|| json!({}))
        };
        let selection = aggregate.package();

        Self {
            user_id: user_id.to_string(),
            company_details: step_value(keys::COMPANY_DETAILS),
            contact_person_details: step_value(keys::CONTACT_PERSON_DETAILS),
            documents: aggregate
                .documents()
                .map(|d| d.documents.clone())
                .unwrap_or_default(),
            package: selection
                .and_then(|s| s.package_id.as_deref())
                .and_then(|id| catalog.find(id))
                .cloned(),
            billing_cycle: selection.map(|s| s.billing_cycle).unwrap_or_default(),
            is_verified_by_admin: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Writes the subscription record for the signed-in user.
pub struct DocumentGateway {
    identity: Arc<dyn IdentityProvider>,
    db: Arc<dyn DocumentDatabase>,
    catalog: PackageCatalog,
}

impl DocumentGateway {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        db: Arc<dyn DocumentDatabase>,
        catalog: PackageCatalog,
    ) -> Self {
        Self {
            identity,
            db,
            catalog,
        }
    }
}

#[async_trait]
impl SubmissionGateway for DocumentGateway {
    async fn write(&self, aggregate: &Aggregate) -> Result<(), GatewayError> {
        let user = self
            .identity
            .current_user()
            .await
            .ok_or(GatewayError::NotAuthenticated)?;

        let record = SubscriptionRecord::from_aggregate(&user.uid, aggregate, &self.catalog, Utc::now());
        let body = serde_json::to_value(&record).map_err(|e| GatewayError::Encode(e.to_string()))?;

        self.db
            .write(SUBSCRIPTIONS, &user.uid, &body, WriteOptions::merge())
            .await?;
        info!(uid = %user.uid, steps = aggregate.len(), "Subscription submitted");
        Ok(())
    }
}
