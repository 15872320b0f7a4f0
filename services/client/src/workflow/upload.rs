//! services/client/src/workflow/upload.rs
//!
//! The upload workflow: holds the selected report and week number, submits
//! them as a multipart request and tracks the outcome.

use compare_bot_core::domain::{ReportFile, UploadRequest, UploadStatus, WeekNumber};
use compare_bot_core::ports::{PortError, ReportBackend, SessionSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::workflow::{
    WorkflowEvent, INVALID_PDF_MESSAGE, NETWORK_ERROR_MESSAGE, UPLOAD_FAILED_MESSAGE,
};

/// Everything the upload tab shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub selected_file: Option<ReportFile>,
    pub week_input: String,
    pub status: UploadStatus,
    /// Number of submissions still waiting on the backend.
    pub in_flight: usize,
}

impl UploadForm {
    pub fn is_uploading(&self) -> bool {
        self.in_flight > 0
    }

    /// Whether the upload button would be enabled.
    pub fn can_submit(&self) -> bool {
        self.selected_file.is_some() && !self.week_input.trim().is_empty() && !self.is_uploading()
    }
}

/// Clears one in-flight marker when dropped, whichever way the request ends.
struct InFlight<'a> {
    form: &'a watch::Sender<UploadForm>,
}

impl<'a> InFlight<'a> {
    fn begin(form: &'a watch::Sender<UploadForm>) -> Self {
        form.send_modify(|f| {
            f.in_flight += 1;
            f.status = UploadStatus::Idle;
        });
        Self { form }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.form
            .send_modify(|f| f.in_flight = f.in_flight.saturating_sub(1));
    }
}

#[derive(Clone)]
pub struct UploadWorkflow {
    backend: Arc<dyn ReportBackend>,
    session: Arc<dyn SessionSource>,
    form: Arc<watch::Sender<UploadForm>>,
    events: mpsc::UnboundedSender<WorkflowEvent>,
    redirect_delay: Duration,
    /// Bumped by `reset`. A submission only reports back while the
    /// generation it started under is still current.
    generation: Arc<AtomicU64>,
}

impl UploadWorkflow {
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        session: Arc<dyn SessionSource>,
        events: mpsc::UnboundedSender<WorkflowEvent>,
        redirect_delay: Duration,
    ) -> Self {
        let (form, _) = watch::channel(UploadForm::default());
        Self {
            backend,
            session,
            form: Arc::new(form),
            events,
            redirect_delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadForm> {
        self.form.subscribe()
    }

    pub fn form(&self) -> UploadForm {
        self.form.borrow().clone()
    }

    /// Takes a picked file. Anything but a PDF is refused and the previous
    /// selection, if any, stays in place.
    pub fn select_file(&self, candidate: ReportFile) -> bool {
        if !candidate.is_pdf() {
            debug!(name = %candidate.name, mime = %candidate.mime, "rejected non-PDF selection");
            self.form
                .send_modify(|f| f.status = UploadStatus::Error(INVALID_PDF_MESSAGE.to_string()));
            return false;
        }
        debug!(name = %candidate.name, bytes = candidate.bytes.len(), "report selected");
        self.form.send_modify(|f| {
            f.selected_file = Some(candidate);
            f.status = UploadStatus::Idle;
        });
        true
    }

    pub fn clear_selection(&self) {
        self.form.send_modify(|f| f.selected_file = None);
    }

    pub fn set_week_input(&self, input: &str) {
        self.form.send_modify(|f| f.week_input = input.to_string());
    }

    /// Back to a blank form, e.g. after logout. Requests already in flight
    /// still clear their own markers, but their outcome and any pending
    /// redirect are dropped.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.form.send_modify(|f| {
            f.selected_file = None;
            f.week_input.clear();
            f.status = UploadStatus::Idle;
        });
    }

    /// Uploads the selected file for `week_number`.
    ///
    /// Does nothing and returns `None` without a selected file, a week number
    /// or a session, or when the form was reset while the request was out.
    /// Otherwise returns the status this attempt ended with.
    pub async fn submit(&self, week_number: Option<WeekNumber>) -> Option<UploadStatus> {
        let file = self.form.borrow().selected_file.clone();
        let (Some(file), Some(week_number), Some(session)) =
            (file, week_number, self.session.current_session())
        else {
            debug!("upload skipped: file, week number or session missing");
            return None;
        };

        let request = match UploadRequest::new(file, session.client_id.clone(), week_number) {
            Ok(request) => request,
            Err(e) => {
                warn!("upload refused before sending: {}", e);
                let status = UploadStatus::Error(INVALID_PDF_MESSAGE.to_string());
                self.form.send_modify(|f| f.status = status.clone());
                return Some(status);
            }
        };

        let generation = self.generation.load(Ordering::SeqCst);
        info!(client_id = %session.client_id, week_number = week_number.get(), "uploading report");
        let status = {
            let _in_flight = InFlight::begin(&self.form);
            let outcome = self.backend.upload_report(&session.token, &request).await;
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(week_number = week_number.get(), "form was reset, dropping upload outcome");
                return None;
            }
            match outcome {
                Ok(receipt) => {
                    info!(
                        week_number = week_number.get(),
                        report_id = ?receipt.report_id,
                        text_length = ?receipt.text_length,
                        "report uploaded"
                    );
                    self.form.send_modify(|f| {
                        f.status = UploadStatus::Success;
                        f.selected_file = None;
                        f.week_input.clear();
                    });
                    self.schedule_redirect(week_number, generation);
                    UploadStatus::Success
                }
                Err(e) => {
                    warn!(week_number = week_number.get(), "upload failed: {}", e);
                    let status = UploadStatus::Error(upload_error_message(e));
                    self.form.send_modify(|f| f.status = status.clone());
                    status
                }
            }
        };
        Some(status)
    }

    fn schedule_redirect(&self, week_number: WeekNumber, generation: u64) {
        let events = self.events.clone();
        let delay = self.redirect_delay;
        let current = self.generation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if current.load(Ordering::SeqCst) != generation {
                debug!(week_number = week_number.get(), "form was reset, redirect cancelled");
                return;
            }
            if events
                .send(WorkflowEvent::UploadSucceeded { week_number })
                .is_err()
            {
                debug!("no view listening for the upload redirect");
            }
        });
    }
}

fn upload_error_message(error: PortError) -> String {
    match error {
        PortError::Transport(_) => NETWORK_ERROR_MESSAGE.to_string(),
        PortError::Rejected {
            message: Some(message),
            ..
        } => message,
        PortError::NotFound(message) if !message.is_empty() => message,
        _ => UPLOAD_FAILED_MESSAGE.to_string(),
    }
}
