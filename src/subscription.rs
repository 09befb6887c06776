//! Subscription lifecycle stored in `subscriptions/{uid}`.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::gateway::SUBSCRIPTIONS;
use crate::store::{DocumentDatabase, WriteOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub package: SubscriptionTier,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub status: SubscriptionStatus,
}

impl Subscription {
    /// Active status and an end date still ahead of `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date > now
    }
}

pub struct SubscriptionService {
    db: Arc<dyn DocumentDatabase>,
}

impl SubscriptionService {
    pub fn new(db: Arc<dyn DocumentDatabase>) -> Self {
        Self { db }
    }

    pub async fn get(&self, uid: &str) -> Result<Option<Subscription>, StoreError> {
        let Some(doc) = self.db.read(SUBSCRIPTIONS, uid).await? else {
            return Ok(None);
        };
        serde_json::from_value(doc)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Replace the user's subscription with a fresh one starting at `now`.
    pub async fn subscribe(
        &self,
        uid: &str,
        tier: SubscriptionTier,
        auto_renew: bool,
        months: u32,
        now: DateTime<Utc>,
    ) -> Result<Subscription, StoreError> {
        let end_date = now.checked_add_months(Months::new(months)).ok_or_else(|| {
            StoreError::Serialization(format!("subscription of {months} months is out of range"))
        })?;
        let subscription = Subscription {
            package: tier,
            start_date: now,
            end_date,
            auto_renew,
            status: SubscriptionStatus::Active,
        };
        let body = serde_json::to_value(&subscription)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db
            .write(SUBSCRIPTIONS, uid, &body, WriteOptions::default())
            .await?;
        info!(uid, ?tier, months, "Subscribed");
        Ok(subscription)
    }

    /// Stop renewal and mark canceled. `None` when there is nothing to cancel.
    pub async fn cancel(&self, uid: &str) -> Result<Option<Subscription>, StoreError> {
        if self.db.read(SUBSCRIPTIONS, uid).await?.is_none() {
            return Ok(None);
        }
        self.db
            .write(
                SUBSCRIPTIONS,
                uid,
                &json!({"autoRenew": false, "status": "canceled"}),
                WriteOptions::merge(),
            )
            .await?;
        info!(uid, "Subscription canceled");
        self.get(uid).await
    }

    /// Errors count as inactive.
    pub async fn is_active(&self, uid: &str, now: DateTime<Utc>) -> bool {
        match self.get(uid).await {
            Ok(Some(sub)) => sub.is_active_at(now),
            Ok(None) => false,
            Err(e) => {
                warn!(uid, "Check subscription active error: {}", e);
                false
            }
        }
    }
}
