//! services/client/src/workflow/context.rs
//!
//! Defines the client context: the one object that owns the workflows and is
//! handed down to every view.

use compare_bot_core::domain::ReportSummary;
use compare_bot_core::ports::{
    KeyValueStore, PortError, PortResult, ReportBackend, SessionSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use crate::adapters::{FileKeyValueStore, HttpBackend};
use crate::config::Config;
use crate::error::ClientError;
use crate::workflow::{
    AuthCoordinator, ComparisonRetrieval, SessionStore, UploadWorkflow, WorkflowEvent,
};

/// The shared client state, created once at startup and passed to all views.
#[derive(Clone)]
pub struct ClientContext {
    pub backend: Arc<dyn ReportBackend>,
    pub auth: Arc<AuthCoordinator>,
    pub upload: UploadWorkflow,
    pub retrieval: ComparisonRetrieval,
}

impl ClientContext {
    /// Wires the workflows together. The returned receiver carries every
    /// `WorkflowEvent` they emit.
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        store: Arc<dyn KeyValueStore>,
        upload_redirect_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let auth = Arc::new(AuthCoordinator::new(
            backend.clone(),
            SessionStore::new(store),
        ));
        let session: Arc<dyn SessionSource> = auth.clone();

        let upload = UploadWorkflow::new(
            backend.clone(),
            session.clone(),
            events_tx.clone(),
            upload_redirect_delay,
        );
        let retrieval = ComparisonRetrieval::new(backend.clone(), session, events_tx);

        let context = Self {
            backend,
            auth,
            upload,
            retrieval,
        };
        (context, events_rx)
    }

    /// Builds the production wiring: the HTTP backend and the on-disk session file.
    pub fn from_config(
        config: &Config,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkflowEvent>), ClientError> {
        info!(
            api_url = %config.api_url,
            session_path = %config.session_path.display(),
            "building client context"
        );
        let backend = Arc::new(HttpBackend::new(config.api_url.clone())?);
        let store = Arc::new(FileKeyValueStore::new(config.session_path.clone()));
        Ok(Self::new(backend, store, config.upload_redirect_delay))
    }

    /// Lists the signed-in client's stored reports, newest week first.
    pub async fn list_reports(&self) -> PortResult<Vec<ReportSummary>> {
        let session = self
            .auth
            .current_session()
            .ok_or(PortError::Unauthorized)?;
        self.backend
            .list_reports(&session.token, &session.client_id)
            .await
    }
}
