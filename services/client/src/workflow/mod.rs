//! services/client/src/workflow/mod.rs
//!
//! The client's stateful workflows: session persistence, authentication,
//! report upload and comparison retrieval. Each workflow publishes its state
//! through a `tokio::sync::watch` channel and reports cross-workflow events
//! through one shared `WorkflowEvent` channel.

pub mod auth;
pub mod context;
pub mod retrieval;
pub mod session_store;
pub mod upload;

#[cfg(test)]
pub(crate) mod fake;

use compare_bot_core::domain::{ComparisonResult, WeekNumber};

pub use auth::{AuthCoordinator, AuthPhase, AuthState, LoginOutcome};
pub use context::ClientContext;
pub use retrieval::{ComparisonRetrieval, RetrievalSnapshot};
pub use session_store::SessionStore;
pub use upload::{UploadForm, UploadWorkflow};

pub const INVALID_PDF_MESSAGE: &str = "Please select a valid PDF file";
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch comparison data";
pub const NO_COMPARISON_MESSAGE: &str = "No comparison data found for this week. Make sure you have uploaded reports for both this week and the previous week.";

/// Something one workflow wants the surrounding views to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// Sent after the redirect delay that follows a successful upload.
    UploadSucceeded { week_number: WeekNumber },
    /// A comparison fetch landed and was applied.
    ComparisonLoaded(ComparisonResult),
}
