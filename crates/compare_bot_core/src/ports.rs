//! crates/compare_bot_core/src/ports.rs
//!
//! Defines the service contracts (traits) the client workflows depend on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! workflows independent of the HTTP stack and of the storage medium.

use async_trait::async_trait;

use crate::domain::{
    ComparisonQuery, ComparisonResult, LoginGrant, ReportSummary, Session, UploadReceipt,
    UploadRequest,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., network, disk).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// The backend answered with a non-success status.
    #[error("Request rejected with status {status}")]
    Rejected { status: u16, message: Option<String> },
    /// No response arrived at all.
    #[error("Transport failure: {0}")]
    Transport(String),
    /// A response arrived but could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The Compare Bot backend, as seen by the client.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// `POST /auth/login`. Bad credentials map to [`PortError::Unauthorized`].
    async fn login(&self, client_id: &str, password: &str) -> PortResult<LoginGrant>;

    /// `POST /upload_report` as multipart, authenticated with `token`.
    async fn upload_report(&self, token: &str, request: &UploadRequest)
        -> PortResult<UploadReceipt>;

    /// `GET /compare_reports`. A missing week pair maps to [`PortError::NotFound`].
    async fn compare_reports(
        &self,
        token: &str,
        query: &ComparisonQuery,
    ) -> PortResult<ComparisonResult>;

    /// `GET /reports`, newest week first.
    async fn list_reports(&self, token: &str, client_id: &str) -> PortResult<Vec<ReportSummary>>;
}

/// A single write against a [`KeyValueStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvOp {
    Put { key: String, value: String },
    Delete { key: String },
}

/// Durable key/value storage, the equivalent of a browser origin's local storage.
///
/// `apply` is all-or-nothing: either every op in the batch lands or none does.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn apply(&self, ops: &[KvOp]) -> PortResult<()>;
}

/// Read access to the current session, handed to anything that makes
/// authenticated calls.
pub trait SessionSource: Send + Sync {
    fn current_session(&self) -> Option<Session>;
}
