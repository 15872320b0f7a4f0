//! services/client/src/workflow/auth.rs
//!
//! The auth coordinator: exchanges client credentials for a session token,
//! restores a stored session at startup and tears it down on logout.

use compare_bot_core::domain::Session;
use compare_bot_core::ports::{PortError, ReportBackend, SessionSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::workflow::session_store::SessionStore;

pub const DEMO_CLIENT_ID: &str = "client_001";
pub const DEMO_PASSWORD: &str = "demo123";

//=========================================================================================
// State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// What views observe. While `initializing` is set, nothing has been
/// restored yet and the login screen should not be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub initializing: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            session: None,
            initializing: true,
        }
    }
}

/// Why a login attempt ended the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    InvalidCredentials,
    Transport(String),
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

//=========================================================================================
// Coordinator
//=========================================================================================

pub struct AuthCoordinator {
    backend: Arc<dyn ReportBackend>,
    store: SessionStore,
    state: watch::Sender<AuthState>,
    restored: AtomicBool,
}

impl AuthCoordinator {
    pub fn new(backend: Arc<dyn ReportBackend>, store: SessionStore) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            backend,
            store,
            state,
            restored: AtomicBool::new(false),
        }
    }

    /// Restores the stored session. Only the first call does anything.
    pub fn initialize(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = self.store.restore();
        match &session {
            Some(s) => info!(client_id = %s.client_id, "resumed stored session"),
            None => debug!("no stored session"),
        }
        self.state.send_modify(|state| {
            state.phase = if session.is_some() {
                AuthPhase::Authenticated
            } else {
                AuthPhase::Unauthenticated
            };
            state.session = session;
            state.initializing = false;
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.state.borrow().initializing
    }

    /// Logs in and reports only whether it worked.
    pub async fn login(&self, client_id: &str, password: &str) -> bool {
        self.login_with_outcome(client_id, password)
            .await
            .is_authenticated()
    }

    pub async fn demo_login(&self) -> LoginOutcome {
        self.login_with_outcome(DEMO_CLIENT_ID, DEMO_PASSWORD).await
    }

    pub async fn login_with_outcome(&self, client_id: &str, password: &str) -> LoginOutcome {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return LoginOutcome::InvalidCredentials;
        }

        self.state
            .send_modify(|state| state.phase = AuthPhase::Authenticating);
        info!(client_id, "logging in");

        let outcome = match self.backend.login(client_id, password).await {
            Ok(grant) => {
                if grant.client_id != client_id {
                    debug!(issued_to = %grant.client_id, "token issued under a different client id");
                }
                let session = Session::new(client_id, grant.token);
                self.persist_off_thread(session.clone()).await;
                self.state.send_modify(|state| {
                    state.phase = AuthPhase::Authenticated;
                    state.session = Some(session);
                });
                info!(client_id, "logged in");
                return LoginOutcome::Authenticated;
            }
            Err(PortError::Unauthorized) => {
                warn!(client_id, "login rejected");
                LoginOutcome::InvalidCredentials
            }
            Err(PortError::Rejected { status, message }) => {
                warn!(client_id, status, message = ?message, "login failed");
                LoginOutcome::InvalidCredentials
            }
            Err(e) => {
                error!(client_id, "login request failed: {}", e);
                LoginOutcome::Transport(e.to_string())
            }
        };

        self.state.send_modify(|state| {
            state.phase = if state.session.is_some() {
                AuthPhase::Authenticated
            } else {
                AuthPhase::Unauthenticated
            };
        });
        outcome
    }

    /// Writes the session on the blocking pool so a slow disk never stalls
    /// the runtime. A failed write only costs durability.
    async fn persist_off_thread(&self, session: Session) {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.persist(&session)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("session will not survive a restart: {}", e),
            Err(e) => warn!("session write task failed: {}", e),
        }
    }

    /// Drops the session everywhere. Safe to call when already logged out.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            error!("failed to clear stored session: {}", e);
        }
        self.state.send_modify(|state| {
            if let Some(session) = state.session.take() {
                info!(client_id = %session.client_id, "logged out");
            }
            state.phase = AuthPhase::Unauthenticated;
        });
    }
}

impl SessionSource for AuthCoordinator {
    fn current_session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }
}
