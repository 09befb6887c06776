//! REST document database — JSON over HTTP with an optional bearer token.
//!
//! Layout: `GET|PUT|PATCH {base}/{collection}/{doc_id}` and
//! `GET {base}/{collection}` returning `[{"id": .., "data": ..}]`.
//! `PATCH` is a shallow merge, `PUT` replaces.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use super::traits::{DocumentDatabase, StoredDocument, WriteOptions};
use crate::error::StoreError;

/// Document database backed by a remote HTTP API.
pub struct RestDocuments {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ListedDocument {
    id: String,
    data: Value,
}

impl RestDocuments {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    fn doc_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{collection}/{doc_id}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

async fn remote_error(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status, "Document API request failed");
    StoreError::Remote { status, body }
}

#[async_trait]
impl DocumentDatabase for RestDocuments {
    async fn write(
        &self,
        collection: &str,
        doc_id: &str,
        payload: &Value,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        let url = self.doc_url(collection, doc_id);
        let request = if options.merge {
            self.client.patch(url)
        } else {
            self.client.put(url)
        };
        let response = self.send(request.json(payload)).await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        Ok(())
    }

    async fn read(&self, collection: &str, doc_id: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .send(self.client.get(self.doc_url(collection, doc_id)))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let value = response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(value))
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let response = self
            .send(self.client.get(format!("{}/{collection}", self.base_url)))
            .await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }
        let listed = response
            .json::<Vec<ListedDocument>>()
            .await
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(listed
            .into_iter()
            .map(|d| StoredDocument {
                id: d.id,
                data: d.data,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct Fake {
        doc: Arc<Mutex<Option<Value>>>,
        last_auth: Arc<Mutex<Option<String>>>,
    }

    async fn get_doc(
        State(fake): State<Fake>,
        Path((_c, _id)): Path<(String, String)>,
    ) -> Result<Json<Value>, StatusCode> {
        fake.doc.lock().await.clone().map(Json).ok_or(StatusCode::NOT_FOUND)
    }

    async fn put_doc(
        State(fake): State<Fake>,
        headers: HeaderMap,
        Path((_c, _id)): Path<(String, String)>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        *fake.last_auth.lock().await = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        *fake.doc.lock().await = Some(body);
        StatusCode::OK
    }

    async fn list_docs() -> Json<Value> {
        Json(json!([{"id": "w1", "data": {"name": "Rahim"}}]))
    }

    async fn start(fake: Fake) -> String {
        let app = Router::new()
            .route("/{collection}", get(list_docs))
            .route("/{collection}/{id}", get(get_doc).put(put_doc))
            .with_state(fake);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn put_then_get_with_bearer_token() {
        let fake = Fake::default();
        let base = start(fake.clone()).await;
        let db = RestDocuments::new(format!("{base}/")).with_token(SecretString::from("tok"));

        assert!(db.read("subscriptions", "u1").await.unwrap().is_none());

        db.write("subscriptions", "u1", &json!({"a": 1}), WriteOptions::default())
            .await
            .unwrap();
        assert_eq!(fake.last_auth.lock().await.as_deref(), Some("Bearer tok"));
        assert_eq!(db.read("subscriptions", "u1").await.unwrap(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn unsupported_method_is_remote_error() {
        let base = start(Fake::default()).await;
        let db = RestDocuments::new(base);
        // No PATCH route registered: the server answers 405.
        let err = db
            .write("subscriptions", "u1", &json!({}), WriteOptions::merge())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Remote { status: 405, .. }));
    }

    #[tokio::test]
    async fn list_decodes_documents() {
        let base = start(Fake::default()).await;
        let db = RestDocuments::new(base);
        let docs = db.list("workers").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "w1");
        assert_eq!(docs[0].data["name"], "Rahim");
    }
}
