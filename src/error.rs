//! Error types for the Manpower onboarding core.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local draft storage and document database errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Remote store returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity provider errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid form: {0}")]
    InvalidForm(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for {email}")]
    EmailInUse { email: String },

    #[error("No account found for {email}")]
    UserNotFound { email: String },

    #[error("Sign-in with {provider} failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    #[error("Not signed in")]
    NotSignedIn,
}

/// Failures of the final submission write.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Failed to write submission: {0}")]
    Write(#[from] StoreError),

    #[error("Failed to encode submission: {0}")]
    Encode(String),
}

/// Document upload errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("You need to grant storage permission to upload documents.")]
    PermissionDenied,

    #[error("File size exceeds {limit_mb}MB limit.")]
    TooLarge { size: u64, limit_mb: u64 },

    #[error("Unknown document slot: {0}")]
    UnknownSlot(String),

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Failed to upload document: {0}")]
    Transfer(String),
}

/// Step ordering errors raised at construction time.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("A wizard needs at least one step")]
    Empty,

    #[error("Duplicate step identifier: {0}")]
    DuplicateStep(String),
}

/// Errors returned by wizard operations.
///
/// Validation failures and blocked jumps are outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Wizard already submitted")]
    AlreadySubmitted,

    #[error("Failed to submit form data: {0}")]
    Gateway(#[from] GatewayError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
