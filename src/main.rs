use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use manpower::blobs::MemoryBlobStorage;
use manpower::config::{AppConfig, DraftBackend};
use manpower::dashboard::Dashboard;
use manpower::gateway::DocumentGateway;
use manpower::identity::{AuthUser, IdentityProvider, MemoryIdentity};
use manpower::packages::PackageCatalog;
use manpower::store::{
    DocumentDatabase, DraftStorage, FormStore, JsonFileDraftStorage, LibSqlBackend,
    MemoryDocuments, MemoryDraftStorage, RestDocuments,
};
use manpower::uploads::{AlwaysGranted, DocumentUploader};
use manpower::wizard::{WizardConfig, WizardController, WizardRouteState, wizard_routes};

/// Stderr logging, plus a daily rolling file when a log directory is set.
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "manpower.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    let _log_guard = init_tracing(&config);

    eprintln!("Manpower v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Drafts: {:?} at {}", config.draft_backend, config.draft_path.display());
    eprintln!("   Wizard API: http://0.0.0.0:{}/api/wizard", config.port);

    // ── Storage ───────────────────────────────────────────────────────────
    let (drafts, local_documents): (Arc<dyn DraftStorage>, Option<Arc<dyn DocumentDatabase>>) =
        match config.draft_backend {
            DraftBackend::Memory => (Arc::new(MemoryDraftStorage::new()), None),
            DraftBackend::File => (
                Arc::new(JsonFileDraftStorage::new(config.draft_path.clone())),
                None,
            ),
            DraftBackend::LibSql => {
                let db = Arc::new(
                    LibSqlBackend::new_local(&config.draft_path)
                        .await
                        .context("failed to open libSQL database")?,
                );
                let drafts: Arc<dyn DraftStorage> = db.clone();
                (drafts, Some(db as Arc<dyn DocumentDatabase>))
            }
        };
    let documents: Arc<dyn DocumentDatabase> = match (&config.api_base_url, local_documents) {
        (Some(url), _) => {
            let mut rest = RestDocuments::new(url.clone());
            if let Some(token) = &config.api_token {
                rest = rest.with_token(token.clone());
            }
            Arc::new(rest)
        }
        (None, Some(db)) => db,
        (None, None) => Arc::new(MemoryDocuments::new()),
    };

    // ── Session ───────────────────────────────────────────────────────────
    let identity: Arc<dyn IdentityProvider> = match &config.session_uid {
        Some(uid) => Arc::new(MemoryIdentity::signed_in(AuthUser::new(uid.clone()))),
        None => {
            tracing::warn!("MANPOWER_SESSION_UID not set, submissions will be rejected");
            Arc::new(MemoryIdentity::new())
        }
    };

    // ── Wizard ────────────────────────────────────────────────────────────
    let catalog = PackageCatalog::default();
    let gateway = Arc::new(DocumentGateway::new(
        identity.clone(),
        documents.clone(),
        catalog.clone(),
    ));
    let store = FormStore::with_namespace(drafts, config.draft_namespace.clone());
    let controller = Arc::new(
        WizardController::mount(WizardConfig::subscription(&catalog)?, store, gateway).await,
    );
    let dashboard = Arc::new(Dashboard::new(identity.clone(), documents));
    let uploader = Arc::new(
        DocumentUploader::new(
            identity,
            Arc::new(MemoryBlobStorage::default()),
            Arc::new(AlwaysGranted),
        )
        .with_max_bytes(config.max_upload_bytes),
    );

    let app = wizard_routes(WizardRouteState {
        controller,
        dashboard,
        uploader,
    });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Wizard server started");
    axum::serve(listener, app).await?;
    Ok(())
}
