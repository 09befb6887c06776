//! Integration tests for the wizard REST surface.
//!
//! Each test spins up an Axum server on a random port and drives the full
//! subscription wizard over HTTP with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use manpower::blobs::MemoryBlobStorage;
use manpower::dashboard::Dashboard;
use manpower::gateway::{DocumentGateway, SUBSCRIPTIONS};
use manpower::identity::{AuthUser, MemoryIdentity};
use manpower::packages::PackageCatalog;
use manpower::store::{DocumentDatabase, FormStore, MemoryDocuments, MemoryDraftStorage};
use manpower::uploads::{AlwaysGranted, DocumentUploader};
use manpower::wizard::{WizardConfig, WizardController, WizardRouteState, wizard_routes};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Upload cap for the test server.
const MAX_UPLOAD: u64 = 1024 * 1024;

struct TestServer {
    base: String,
    docs: Arc<MemoryDocuments>,
    client: reqwest::Client,
}

impl TestServer {
    async fn post(&self, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut request = self.client.post(format!("{}{}", self.base, path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn upload(&self, slot: &str, name: &str, bytes: Vec<u8>) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}/api/wizard/documents/{slot}?name={name}", self.base))
            .header("content-type", "application/pdf")
            .body(bytes)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

/// Start a server for a signed-in user `u1`.
async fn start_server() -> TestServer {
    let identity = Arc::new(MemoryIdentity::signed_in(AuthUser::new("u1")));
    let docs = Arc::new(MemoryDocuments::new());
    let catalog = PackageCatalog::default();
    let gateway = Arc::new(DocumentGateway::new(
        identity.clone(),
        docs.clone(),
        catalog.clone(),
    ));
    let controller = WizardController::mount(
        WizardConfig::subscription(&catalog).unwrap(),
        FormStore::new(Arc::new(MemoryDraftStorage::new())),
        gateway,
    )
    .await;
    let app = wizard_routes(WizardRouteState {
        controller: Arc::new(controller),
        dashboard: Arc::new(Dashboard::new(identity.clone(), docs.clone())),
        uploader: Arc::new(
            DocumentUploader::new(
                identity,
                Arc::new(MemoryBlobStorage::default()),
                Arc::new(AlwaysGranted),
            )
            .with_max_bytes(MAX_UPLOAD),
        ),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        docs,
        client: reqwest::Client::new(),
    }
}

fn company() -> Value {
    json!({
        "name": "Acme Manpower",
        "email": "info@acme.example",
        "registrationNumber": "REG-001",
        "registrationAddress": "12 Dhanmondi Road",
        "isSameAsRegistration": true
    })
}

fn contact() -> Value {
    json!({
        "name": "Nadia Rahman",
        "idNumber": "P1234567",
        "mobileNumber": "+8801700000000",
        "email": "nadia@acme.example",
        "designation": "Director"
    })
}

fn documents() -> Value {
    json!({"documents": [
        {"id": "gov_id", "isUploaded": true, "downloadUrl": "mem://gov"},
        {"id": "trade_license", "isUploaded": true, "downloadUrl": "mem://trade"}
    ]})
}

#[tokio::test]
async fn full_wizard_over_http() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;

        let steps = [
            ("CompanyDetails", company(), Some("ContactPersonDetails")),
            ("ContactPersonDetails", contact(), Some("VerifyDocuments")),
            ("VerifyDocuments", documents(), Some("ChoosePackage")),
            ("ChoosePackage", json!({"packageId": "standard"}), None),
        ];
        for (step, fields, next) in steps {
            let (status, outcome) = server
                .post(&format!("/api/wizard/steps/{step}/fields"), Some(fields))
                .await;
            assert_eq!(status, 200);
            assert_eq!(outcome["isValid"], true, "{step}: {outcome}");

            let (status, transition) = server
                .post(&format!("/api/wizard/steps/{step}/continue"), None)
                .await;
            assert_eq!(status, 200);
            match next {
                Some(next) => {
                    assert_eq!(transition["outcome"], "advanced");
                    assert_eq!(transition["to"], next);
                }
                None => assert_eq!(transition["outcome"], "at_last_step"),
            }
        }

        let (_, snapshot) = server.get("/api/wizard").await;
        assert_eq!(
            snapshot["drafts"]["CompanyDetails"]["presentAddress"],
            "12 Dhanmondi Road"
        );

        let (status, outcome) = server.post("/api/wizard/submit", None).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["outcome"], "submitted");

        let record = server.docs.read(SUBSCRIPTIONS, "u1").await.unwrap().unwrap();
        assert_eq!(record["userId"], "u1");
        assert_eq!(record["contactPersonDetails"]["designation"], "Director");
        assert_eq!(record["package"]["id"], "standard");
        assert_eq!(record["billingCycle"], "yearly");
        assert_eq!(record["isVerifiedByAdmin"], false);

        let (_, snapshot) = server.get("/api/wizard").await;
        assert_eq!(snapshot["phase"], "submitted");
        assert!(snapshot["drafts"].as_object().unwrap().is_empty());

        let (status, body) = server.post("/api/wizard/submit", None).await;
        assert_eq!(status, 409);
        assert_eq!(body["error"], "Wizard already submitted");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blocked_jump_and_cancel() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;

        let (status, outcome) = server.post("/api/wizard/jump/ChoosePackage", None).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["outcome"], "blocked");
        assert_eq!(
            outcome["advisory"],
            "Complete the current step before moving on."
        );

        server
            .post("/api/wizard/steps/CompanyDetails/fields", Some(company()))
            .await;
        let (_, outcome) = server.post("/api/wizard/jump/VerifyDocuments", None).await;
        assert_eq!(outcome["outcome"], "moved");
        assert_eq!(outcome["to"], "VerifyDocuments");

        let (_, transition) = server
            .post("/api/wizard/steps/VerifyDocuments/skip", None)
            .await;
        assert_eq!(transition["to"], "ChoosePackage");

        let (status, snapshot) = server.post("/api/wizard/cancel", None).await;
        assert_eq!(status, 200);
        assert_eq!(snapshot["current"], "CompanyDetails");
        assert_eq!(snapshot["phase"], "active");
        assert!(snapshot["drafts"].as_object().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn submit_rejected_until_package_chosen() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (status, outcome) = server.post("/api/wizard/submit", None).await;
        assert_eq!(status, 200);
        assert_eq!(outcome["outcome"], "rejected");
        assert_eq!(
            outcome["errors"]["packageId"],
            "Please select a package to continue."
        );
        assert!(server.docs.is_empty().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn uploads_fill_the_documents_step() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;

        let (status, body) = server
            .upload("gov_id", "nid.pdf", vec![0; (MAX_UPLOAD + 1) as usize])
            .await;
        assert_eq!(status, 413);
        assert_eq!(body["error"], "File size exceeds 1MB limit.");

        let (status, body) = server.upload("gov_id", "nid.pdf", vec![1; 64]).await;
        assert_eq!(status, 200);
        assert_eq!(
            body["downloadUrl"],
            "mem://blobs/users/u1/documents/gov_id/nid.pdf"
        );
        assert_eq!(body["validation"]["isValid"], false);

        let (_, body) = server
            .upload("trade_license", "license.pdf", vec![2; 64])
            .await;
        assert_eq!(body["validation"]["isValid"], true);

        let (_, snapshot) = server.get("/api/wizard").await;
        let documents = &snapshot["drafts"]["VerifyDocuments"]["documents"];
        assert_eq!(documents.as_array().unwrap().len(), 2);
        assert_eq!(documents[1]["isUploaded"], true);
        assert_eq!(snapshot["current"], "CompanyDetails");
    })
    .await
    .expect("test timed out");
}
