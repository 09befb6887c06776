//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default namespace under which all step drafts are persisted.
pub const DEFAULT_DRAFT_NAMESPACE: &str = "multiStepFormData";

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Which backend holds local step drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftBackend {
    Memory,
    File,
    LibSql,
}

impl std::str::FromStr for DraftBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "libsql" => Ok(Self::LibSql),
            other => Err(ConfigError::InvalidValue {
                key: "MANPOWER_DRAFT_BACKEND".to_string(),
                message: format!("expected memory, file or libsql, got '{other}'"),
            }),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port for the REST surface.
    pub port: u16,
    /// Draft storage backend.
    pub draft_backend: DraftBackend,
    /// Directory (file backend) or database path (libsql backend).
    pub draft_path: PathBuf,
    /// Namespace of the single draft record.
    pub draft_namespace: String,
    /// Largest document accepted by the upload step.
    pub max_upload_bytes: u64,
    /// Base URL of the remote document API; in-process documents when unset.
    pub api_base_url: Option<String>,
    /// Bearer token for the remote document API.
    pub api_token: Option<SecretString>,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// User the server acts for. Submissions fail as unauthenticated without it.
    pub session_uid: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            draft_backend: DraftBackend::File,
            draft_path: PathBuf::from("./data/drafts"),
            draft_namespace: DEFAULT_DRAFT_NAMESPACE.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            api_base_url: None,
            api_token: None,
            log_dir: None,
            session_uid: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from `MANPOWER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("MANPOWER_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MANPOWER_PORT".to_string(),
                message: format!("'{port}' is not a valid port"),
            })?;
        }
        if let Some(backend) = lookup("MANPOWER_DRAFT_BACKEND") {
            config.draft_backend = backend.parse()?;
        }
        if let Some(path) = lookup("MANPOWER_DRAFT_PATH") {
            config.draft_path = PathBuf::from(path);
        }
        if let Some(namespace) = lookup("MANPOWER_DRAFT_NAMESPACE") {
            if namespace.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "MANPOWER_DRAFT_NAMESPACE".to_string(),
                    message: "namespace must not be empty".to_string(),
                });
            }
            config.draft_namespace = namespace;
        }
        if let Some(bytes) = lookup("MANPOWER_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MANPOWER_MAX_UPLOAD_BYTES".to_string(),
                message: format!("'{bytes}' is not a byte count"),
            })?;
        }
        config.api_base_url = lookup("MANPOWER_API_BASE_URL").filter(|url| !url.is_empty());
        config.api_token = lookup("MANPOWER_API_TOKEN")
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        config.log_dir = lookup("MANPOWER_LOG_DIR").map(PathBuf::from);
        config.session_uid = lookup("MANPOWER_SESSION_UID").filter(|uid| !uid.trim().is_empty());

        Ok(config)
    }
}
