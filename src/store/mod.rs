//! Persistence layer — draft storage, the FormStore, and document databases.

pub mod file;
pub mod form_store;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod rest;
pub mod traits;

pub use file::JsonFileDraftStorage;
pub use form_store::{Drafts, FormStore};
pub use libsql_backend::LibSqlBackend;
pub use memory::{MemoryDocuments, MemoryDraftStorage};
pub use rest::RestDocuments;
pub use traits::{DocumentDatabase, DraftStorage, StoredDocument, WriteOptions};
