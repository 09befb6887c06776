//! REST endpoints driving the wizard and the dashboard banner.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use super::controller::WizardController;
use super::payload::FieldMap;
use super::step::keys;
use crate::dashboard::Dashboard;
use crate::error::{UploadError, WizardError};
use crate::uploads::{DocumentUploader, PickedFile};

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub controller: Arc<WizardController>,
    pub dashboard: Arc<Dashboard>,
    pub uploader: Arc<DocumentUploader>,
}

impl IntoResponse for WizardError {
    fn into_response(self) -> Response {
        let status = match &self {
            WizardError::UnknownStep(_) => StatusCode::NOT_FOUND,
            WizardError::AlreadySubmitted => StatusCode::CONFLICT,
            WizardError::Gateway(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            UploadError::PermissionDenied => StatusCode::FORBIDDEN,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::UnknownSlot(_) => StatusCode::NOT_FOUND,
            UploadError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            UploadError::Transfer(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/wizard
async fn get_wizard(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(state.controller.snapshot().await)
}

/// POST /api/wizard/steps/{step}/fields
///
/// Body is a JSON object of field → value, merged into the step's draft.
async fn update_fields(
    State(state): State<WizardRouteState>,
    Path(step): Path<String>,
    Json(fields): Json<FieldMap>,
) -> Result<impl IntoResponse, WizardError> {
    let outcome = state.controller.update_fields(&step, fields).await?;
    Ok(Json(outcome))
}

/// POST /api/wizard/steps/{step}/continue
async fn continue_step(
    State(state): State<WizardRouteState>,
    Path(step): Path<String>,
) -> Result<impl IntoResponse, WizardError> {
    Ok(Json(state.controller.continue_step(&step).await?))
}

/// POST /api/wizard/steps/{step}/skip
async fn skip_step(
    State(state): State<WizardRouteState>,
    Path(step): Path<String>,
) -> Result<impl IntoResponse, WizardError> {
    Ok(Json(state.controller.skip_step(&step).await?))
}

/// POST /api/wizard/jump/{step}
async fn jump_to_step(
    State(state): State<WizardRouteState>,
    Path(step): Path<String>,
) -> Result<impl IntoResponse, WizardError> {
    Ok(Json(state.controller.jump_to_step(&step).await?))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    name: Option<String>,
}

/// POST /api/wizard/documents/{slot}?name=<file name>
///
/// Body is the raw file. A successful upload refreshes the VerifyDocuments
/// draft from the uploader's slots.
async fn upload_document(
    State(state): State<WizardRouteState>,
    Path(slot): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Response> {
    let file = PickedFile {
        name: query.name,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        bytes: body.to_vec(),
    };
    let download_url = state
        .uploader
        .upload(&slot, file)
        .await
        .map_err(IntoResponse::into_response)?;

    let fields = match state.uploader.payload().await {
        Value::Object(map) => map,
        _ => FieldMap::new(),
    };
    let validation = state
        .controller
        .update_fields(keys::VERIFY_DOCUMENTS, fields)
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(Json(json!({
        "downloadUrl": download_url,
        "validation": validation,
    })))
}

/// POST /api/wizard/submit
///
/// 200 with the outcome (including rejections), 502 when the gateway fails.
async fn submit(State(state): State<WizardRouteState>) -> Result<impl IntoResponse, WizardError> {
    Ok(Json(state.controller.submit().await?))
}

/// POST /api/wizard/cancel
async fn cancel(State(state): State<WizardRouteState>) -> impl IntoResponse {
    state.controller.cancel().await;
    Json(state.controller.snapshot().await)
}

/// GET /api/dashboard/status
async fn dashboard_status(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(json!({
        "verificationStatus": state.dashboard.verification_status().await,
        "greeting": state.dashboard.greeting_now(),
    }))
}

/// Build the wizard REST routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    // One byte over the limit still reaches the uploader so it can say why.
    let upload_limit = usize::try_from(state.uploader.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(1);
    Router::new()
        .route("/health", get(health))
        .route("/api/wizard", get(get_wizard))
        .route("/api/wizard/steps/{step}/fields", post(update_fields))
        .route("/api/wizard/steps/{step}/continue", post(continue_step))
        .route("/api/wizard/steps/{step}/skip", post(skip_step))
        .route("/api/wizard/jump/{step}", post(jump_to_step))
        .route(
            "/api/wizard/documents/{slot}",
            post(upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/wizard/submit", post(submit))
        .route("/api/wizard/cancel", post(cancel))
        .route("/api/dashboard/status", get(dashboard_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::blobs::MemoryBlobStorage;
    use crate::gateway::DocumentGateway;
    use crate::identity::{AuthUser, IdentityProvider, MemoryIdentity};
    use crate::packages::PackageCatalog;
    use crate::store::{DocumentDatabase, FormStore, MemoryDocuments, MemoryDraftStorage};
    use crate::uploads::AlwaysGranted;
    use crate::wizard::controller::WizardConfig;
    use crate::wizard::step::keys;

    async fn app(identity: Arc<dyn IdentityProvider>) -> Router {
        let docs: Arc<dyn DocumentDatabase> = Arc::new(MemoryDocuments::new());
        let catalog = PackageCatalog::default();
        let gateway = Arc::new(DocumentGateway::new(identity.clone(), docs.clone(), catalog.clone()));
        let controller = WizardController::mount(
            WizardConfig::subscription(&catalog).unwrap(),
            FormStore::new(Arc::new(MemoryDraftStorage::new())),
            gateway,
        )
        .await;
        wizard_routes(WizardRouteState {
            controller: Arc::new(controller),
            dashboard: Arc::new(Dashboard::new(identity.clone(), docs)),
            uploader: Arc::new(DocumentUploader::new(
                identity,
                Arc::new(MemoryBlobStorage::default()),
                Arc::new(AlwaysGranted),
            )),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_and_snapshot() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&app, "GET", "/api/wizard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current"], keys::COMPANY_DETAILS);
        assert_eq!(body["steps"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn rejected_continue_is_200_with_errors() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/wizard/steps/CompanyDetails/continue",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "rejected");
        assert_eq!(body["errors"]["name"], "Company/Agency Name is required");
    }

    #[tokio::test]
    async fn skip_on_a_later_step_is_blocked() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let (status, body) = call(&app, "POST", "/api/wizard/steps/VerifyDocuments/skip", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "blocked");

        let (_, snapshot) = call(&app, "GET", "/api/wizard", None).await;
        assert_eq!(snapshot["current"], keys::COMPANY_DETAILS);
    }

    #[tokio::test]
    async fn upload_without_session_is_401() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/wizard/documents/gov_id?name=id.pdf")
            .header("content-type", "application/pdf")
            .body(Body::from(vec![1u8; 16]))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "POST", "/api/wizard/documents/passport", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown document slot: passport");
    }

    #[tokio::test]
    async fn unknown_step_is_404() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let (status, body) = call(&app, "POST", "/api/wizard/jump/Nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown step: Nowhere");
    }

    #[tokio::test]
    async fn gateway_failure_is_502() {
        let app = app(Arc::new(MemoryIdentity::new())).await;
        let (status, _) = call(
            &app,
            "POST",
            "/api/wizard/steps/ChoosePackage/fields",
            Some(serde_json::json!({"packageId": "standard"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "POST", "/api/wizard/submit", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to submit form data: User not authenticated");
    }

    #[tokio::test]
    async fn dashboard_status_defaults_to_pending() {
        let app = app(Arc::new(MemoryIdentity::signed_in(AuthUser::new("u1")))).await;
        let (status, body) = call(&app, "GET", "/api/dashboard/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verificationStatus"], "pending");
        assert!(body["greeting"].as_str().unwrap().starts_with("Good "));
    }
}
