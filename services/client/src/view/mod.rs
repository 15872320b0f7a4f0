//! services/client/src/view/mod.rs
//!
//! View composition: decides between the login screen and the authenticated
//! dashboard, and between the upload and results tabs inside it.
//!
//! Network work triggered from here runs on spawned tasks so the view keeps
//! rendering while requests are outstanding. `settle` waits for all of them.

pub mod render;

use compare_bot_core::domain::{ComparisonResult, ReportFile, WeekNumber};
use compare_bot_core::ports::SessionSource;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::workflow::{AuthPhase, ClientContext, LoginOutcome, WorkflowEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Upload,
    Results,
}

/// The top-level screen to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The stored session has not been looked at yet.
    Initializing,
    Login,
    Dashboard(Tab),
}

pub struct Dashboard {
    ctx: ClientContext,
    active_tab: Tab,
    search_input: String,
    login_error: Option<String>,
    last_comparison: Option<ComparisonResult>,
    pending: Vec<JoinHandle<()>>,
}

impl Dashboard {
    pub fn new(ctx: ClientContext) -> Self {
        Self {
            ctx,
            active_tab: Tab::default(),
            search_input: String::new(),
            login_error: None,
            last_comparison: None,
            pending: Vec::new(),
        }
    }

    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    /// Restores the stored session and, if there is one, starts the first fetch.
    pub fn start(&mut self) {
        self.ctx.auth.initialize();
        self.on_session_available();
    }

    pub fn screen(&self) -> Screen {
        if self.ctx.auth.is_initializing() {
            Screen::Initializing
        } else if self.ctx.auth.current_session().is_some() {
            Screen::Dashboard(self.active_tab)
        } else {
            Screen::Login
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn login_error(&self) -> Option<&str> {
        self.login_error.as_deref()
    }

    /// The comparison most recently delivered to the dashboard, kept across
    /// tab switches.
    pub fn last_comparison(&self) -> Option<&ComparisonResult> {
        self.last_comparison.as_ref()
    }

    pub async fn login(&mut self, client_id: &str, password: &str) -> bool {
        let outcome = self.ctx.auth.login_with_outcome(client_id, password).await;
        self.after_login(outcome, render::INVALID_CREDENTIALS_MESSAGE)
    }

    pub async fn demo_login(&mut self) -> bool {
        let outcome = self.ctx.auth.demo_login().await;
        self.after_login(outcome, render::DEMO_LOGIN_FAILED_MESSAGE)
    }

    fn after_login(&mut self, outcome: LoginOutcome, failure_message: &str) -> bool {
        if let LoginOutcome::Transport(reason) = &outcome {
            warn!("login did not reach the backend: {}", reason);
        }
        if outcome.is_authenticated() {
            self.login_error = None;
            self.on_session_available();
            true
        } else {
            self.login_error = Some(failure_message.to_string());
            false
        }
    }

    pub fn logout(&mut self) {
        self.ctx.auth.logout();
        self.ctx.upload.reset();
        self.ctx.retrieval.reset();
        self.active_tab = Tab::Upload;
        self.search_input.clear();
        self.last_comparison = None;
    }

    /// Switches tabs. Opening the results tab fetches unless something is
    /// already shown or loading.
    pub fn select_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
        if tab == Tab::Results && !self.ctx.retrieval.is_populated() {
            let fetch = self.ctx.retrieval.fetch(None);
            self.spawn(fetch);
        }
    }

    pub fn select_file(&mut self, file: ReportFile) -> bool {
        self.ctx.upload.select_file(file)
    }

    pub fn set_week_input(&mut self, input: &str) {
        self.ctx.upload.set_week_input(input);
    }

    /// Submits the upload form with whatever week number it holds.
    pub fn submit_upload(&mut self) {
        let week = WeekNumber::parse(&self.ctx.upload.form().week_input).ok();
        let upload = self.ctx.upload.clone();
        self.spawn(async move {
            upload.submit(week).await;
        });
    }

    /// Searches for a specific week. Input that is not a positive number is ignored.
    pub fn search(&mut self, input: &str) {
        self.search_input = input.trim().to_string();
        match WeekNumber::parse(input) {
            Ok(week) => {
                let fetch = self.ctx.retrieval.fetch(Some(week));
                self.spawn(fetch);
            }
            Err(e) => debug!("search ignored: {}", e),
        }
    }

    /// Re-fetches, using the week in the search box if there is one.
    pub fn refresh(&mut self) {
        let week = WeekNumber::parse(&self.search_input).ok();
        let fetch = self.ctx.retrieval.fetch(week);
        self.spawn(fetch);
    }

    pub fn handle_event(&mut self, event: WorkflowEvent) {
        match event {
            WorkflowEvent::UploadSucceeded { week_number } => {
                debug!(week_number = week_number.get(), "switching to results after upload");
                self.active_tab = Tab::Results;
                let fetch = self.ctx.retrieval.fetch(Some(week_number));
                self.spawn(fetch);
            }
            WorkflowEvent::ComparisonLoaded(result) => {
                self.last_comparison = Some(result);
            }
        }
    }

    /// Waits for every request this view has started.
    pub async fn settle(&mut self) {
        for handle in self.pending.drain(..) {
            if let Err(e) = handle.await {
                warn!("view task ended abnormally: {}", e);
            }
        }
    }

    pub fn render(&self) -> String {
        match self.screen() {
            Screen::Initializing => render::initializing(),
            Screen::Login => {
                let busy = self.ctx.auth.state().phase == AuthPhase::Authenticating;
                render::login(self.login_error.as_deref(), busy)
            }
            Screen::Dashboard(tab) => {
                let client_id = self
                    .ctx
                    .auth
                    .current_session()
                    .map(|s| s.client_id)
                    .unwrap_or_default();
                let body = match tab {
                    Tab::Upload => render::upload_form(&self.ctx.upload.form()),
                    Tab::Results => render::retrieval(&self.ctx.retrieval.state()),
                };
                format!("{}\n\n{}", render::header(&client_id, tab), body)
            }
        }
    }

    fn on_session_available(&mut self) {
        if self.ctx.auth.current_session().is_none() {
            return;
        }
        let auto_fetch = self.ctx.retrieval.auto_fetch();
        self.spawn(async move {
            auto_fetch.await;
        });
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::spawn(task));
    }
}
