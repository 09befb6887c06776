//! Home dashboard — verification banner, greeting and the people list.

use std::sync::Arc;

use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::gateway::SUBSCRIPTIONS;
use crate::identity::IdentityProvider;
use crate::store::DocumentDatabase;

/// Collection of registered workers and students.
pub const WORKERS: &str = "workers";

/// Status shown until an admin has reviewed the submission.
pub const PENDING: &str = "pending";

/// Greeting for an hour of the day (0-23).
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good Morning",
        12 => "Good Noon",
        13..=16 => "Good Afternoon",
        17..=19 => "Good Evening",
        _ => "Good Night",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersonRole {
    #[default]
    Worker,
    Student,
}

/// One row of the people list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersonCard {
    pub id: String,
    pub role: PersonRole,
    pub name: String,
    pub profile_image: Option<String>,
    pub card_id: String,
    pub passes: Vec<String>,
    pub is_active: bool,
}

pub struct Dashboard {
    identity: Arc<dyn IdentityProvider>,
    db: Arc<dyn DocumentDatabase>,
}

impl Dashboard {
    pub fn new(identity: Arc<dyn IdentityProvider>, db: Arc<dyn DocumentDatabase>) -> Self {
        Self { identity, db }
    }

    pub fn greeting_now(&self) -> &'static str {
        greeting(Local::now().hour())
    }

    /// `verificationStatus` of the signed-in user's subscription, or
    /// `pending` when it is unset, unreadable or nobody is signed in.
    pub async fn verification_status(&self) -> String {
        let Some(user) = self.identity.current_user().await else {
            return PENDING.to_string();
        };
        match self.db.read(SUBSCRIPTIONS, &user.uid).await {
            Ok(doc) => doc
                .as_ref()
                .and_then(|d| d.get("verificationStatus"))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(PENDING)
                .to_string(),
            Err(e) => {
                warn!(uid = %user.uid, "Error fetching verification status: {}", e);
                PENDING.to_string()
            }
        }
    }

    /// People whose name contains `query` (case-insensitive), most recently
    /// added first. An empty query lists everyone.
    pub async fn search_people(&self, query: &str) -> Result<Vec<PersonCard>, StoreError> {
        let needle = query.trim().to_lowercase();
        let docs = self.db.list(WORKERS).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                match serde_json::from_value::<PersonCard>(doc.data) {
                    Ok(mut card) => {
                        card.id = doc.id;
                        Some(card)
                    }
                    Err(e) => {
                        warn!(id = %doc.id, "Skipping unreadable person record: {}", e);
                        None
                    }
                }
            })
            .filter(|card| needle.is_empty() || card.name.to_lowercase().contains(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::identity::{AuthUser, MemoryIdentity};
    use crate::store::{MemoryDocuments, WriteOptions};

    #[test]
    fn greeting_boundaries() {
        assert_eq!(greeting(4), "Good Night");
        assert_eq!(greeting(5), "Good Morning");
        assert_eq!(greeting(11), "Good Morning");
        assert_eq!(greeting(12), "Good Noon");
        assert_eq!(greeting(13), "Good Afternoon");
        assert_eq!(greeting(16), "Good Afternoon");
        assert_eq!(greeting(17), "Good Evening");
        assert_eq!(greeting(19), "Good Evening");
        assert_eq!(greeting(20), "Good Night");
        assert_eq!(greeting(0), "Good Night");
    }

    #[tokio::test]
    async fn verification_status_defaults_to_pending() {
        let db = Arc::new(MemoryDocuments::new());
        let signed_out = Dashboard::new(Arc::new(MemoryIdentity::new()), db.clone());
        assert_eq!(signed_out.verification_status().await, "pending");

        let dash = Dashboard::new(Arc::new(MemoryIdentity::signed_in(AuthUser::new("u1"))), db.clone());
        assert_eq!(dash.verification_status().await, "pending");

        db.write(SUBSCRIPTIONS, "u1", &json!({"isVerifiedByAdmin": false}), WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(dash.verification_status().await, "pending");

        db.write(SUBSCRIPTIONS, "u1", &json!({"verificationStatus": "approved"}), WriteOptions::merge())
            .await
            .unwrap();
        assert_eq!(dash.verification_status().await, "approved");

        db.set_failing(true);
        assert_eq!(dash.verification_status().await, "pending");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_newest_first() {
        let db = Arc::new(MemoryDocuments::new());
        for (id, name, role) in [
            ("1", "Joshep Daniel", "Student"),
            ("2", "Jitu Miah", "Worker"),
            ("3", "Rafiq Daniel", "Worker"),
        ] {
            db.write(
                WORKERS,
                id,
                &json!({"name": name, "role": role, "cardId": "AG3456789", "passes": ["TEP"]}),
                WriteOptions::default(),
            )
            .await
            .unwrap();
        }
        db.write(WORKERS, "bad", &json!({"name": 7}), WriteOptions::default())
            .await
            .unwrap();

        let dash = Dashboard::new(Arc::new(MemoryIdentity::new()), db);
        let hits = dash.search_people("daniel").await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert_eq!(hits[1].role, PersonRole::Student);

        let everyone = dash.search_people("  ").await.unwrap();
        assert_eq!(everyone.len(), 3);
        assert_eq!(everyone[0].id, "3");
    }
}
