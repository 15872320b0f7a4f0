//! An in-process `ReportBackend` with scripted answers, for workflow tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use compare_bot_core::domain::{
    ComparisonQuery, ComparisonResult, LoginGrant, ReportSummary, UploadReceipt, UploadRequest,
};
use compare_bot_core::ports::{PortError, PortResult, ReportBackend};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

pub const DEMO_PASSWORD: &str = "demo123";

/// One scripted answer, optionally held back until its gate is released.
pub struct Scripted<T> {
    result: PortResult<T>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Scripted<T> {
    pub fn now(result: PortResult<T>) -> Self {
        Self { result, gate: None }
    }

    pub fn gated(result: PortResult<T>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                result,
                gate: Some(rx),
            },
            tx,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login { client_id: String },
    Upload { token: String, week_number: u32 },
    Compare { token: String, week_number: Option<u32> },
    List { token: String },
}

#[derive(Default)]
pub struct FakeBackend {
    login_failure: Mutex<Option<PortError>>,
    login_gate: Mutex<Option<oneshot::Receiver<()>>>,
    uploads: Mutex<VecDeque<Scripted<UploadReceipt>>>,
    comparisons: Mutex<VecDeque<Scripted<ComparisonResult>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_logins_with(&self, error: PortError) {
        *self.login_failure.lock().unwrap() = Some(error);
    }

    /// Holds the next login until the returned sender fires.
    pub fn hold_next_login(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.login_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn push_upload(&self, scripted: Scripted<UploadReceipt>) {
        self.uploads.lock().unwrap().push_back(scripted);
    }

    pub fn push_comparison(&self, scripted: Scripted<ComparisonResult>) {
        self.comparisons.lock().unwrap().push_back(scripted);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn comparison(week: u32) -> ComparisonResult {
    ComparisonResult::new(
        format!("Week {week} summary"),
        vec!["Revenue up 12%".to_string()],
        week,
        week - 1,
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
    )
    .unwrap()
}

async fn resolve<T>(scripted: Option<Scripted<T>>) -> PortResult<T> {
    let scripted = scripted.expect("no scripted response left");
    if let Some(gate) = scripted.gate {
        let _ = gate.await;
    }
    scripted.result
}

#[async_trait]
impl ReportBackend for FakeBackend {
    async fn login(&self, client_id: &str, password: &str) -> PortResult<LoginGrant> {
        self.record(Call::Login {
            client_id: client_id.to_string(),
        });
        let gate = self.login_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = self.login_failure.lock().unwrap().clone() {
            return Err(error);
        }
        if password != DEMO_PASSWORD {
            return Err(PortError::Unauthorized);
        }
        Ok(LoginGrant {
            token: format!("token-{client_id}"),
            client_id: client_id.to_string(),
        })
    }

    async fn upload_report(
        &self,
        token: &str,
        request: &UploadRequest,
    ) -> PortResult<UploadReceipt> {
        self.record(Call::Upload {
            token: token.to_string(),
            week_number: request.week_number.get(),
        });
        let next = self.uploads.lock().unwrap().pop_front();
        resolve(next).await
    }

    async fn compare_reports(
        &self,
        token: &str,
        query: &ComparisonQuery,
    ) -> PortResult<ComparisonResult> {
        self.record(Call::Compare {
            token: token.to_string(),
            week_number: query.week_number.map(|w| w.get()),
        });
        let next = self.comparisons.lock().unwrap().pop_front();
        resolve(next).await
    }

    async fn list_reports(&self, token: &str, _client_id: &str) -> PortResult<Vec<ReportSummary>> {
        self.record(Call::List {
            token: token.to_string(),
        });
        Ok(Vec::new())
    }
}
