//! services/client/src/workflow/retrieval.rs
//!
//! The comparison retrieval workflow. Every fetch takes a sequence number
//! when it starts; a response is applied only if no newer fetch (or reset)
//! has started since, so a slow early response can never overwrite a later
//! one.

use compare_bot_core::domain::{ComparisonQuery, RetrievalState, Session, WeekNumber};
use compare_bot_core::ports::{PortError, ReportBackend, SessionSource};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::workflow::{WorkflowEvent, FETCH_FAILED_MESSAGE, NETWORK_ERROR_MESSAGE};

/// The published state together with the sequence number of the newest
/// fetch that has been started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalSnapshot {
    pub seq: u64,
    pub state: RetrievalState,
}

#[derive(Clone)]
pub struct ComparisonRetrieval {
    backend: Arc<dyn ReportBackend>,
    session: Arc<dyn SessionSource>,
    slot: Arc<watch::Sender<RetrievalSnapshot>>,
    events: mpsc::UnboundedSender<WorkflowEvent>,
    auto_fetch_armed: Arc<AtomicBool>,
}

impl ComparisonRetrieval {
    pub fn new(
        backend: Arc<dyn ReportBackend>,
        session: Arc<dyn SessionSource>,
        events: mpsc::UnboundedSender<WorkflowEvent>,
    ) -> Self {
        let (slot, _) = watch::channel(RetrievalSnapshot::default());
        Self {
            backend,
            session,
            slot: Arc::new(slot),
            events,
            auto_fetch_armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RetrievalSnapshot> {
        self.slot.subscribe()
    }

    pub fn state(&self) -> RetrievalState {
        self.slot.borrow().state.clone()
    }

    /// True once something worth keeping is on screen or on its way.
    pub fn is_populated(&self) -> bool {
        matches!(
            self.slot.borrow().state,
            RetrievalState::Loading | RetrievalState::Loaded(_)
        )
    }

    /// Fetches once per session: the first call after a session appears
    /// issues a fetch for the latest pair, later calls do nothing until
    /// [`reset`](Self::reset). Resolves to whether a fetch was issued.
    pub fn auto_fetch(&self) -> impl Future<Output = bool> + Send + 'static {
        let fetch = if self.session.current_session().is_some()
            && self.auto_fetch_armed.swap(false, Ordering::SeqCst)
        {
            debug!("auto-fetching latest comparison");
            Some(self.fetch(None))
        } else {
            None
        };
        async move {
            match fetch {
                Some(fetch) => {
                    fetch.await;
                    true
                }
                None => false,
            }
        }
    }

    /// Back to `Empty`, discarding any response still on its way, and
    /// re-arms the auto-fetch.
    pub fn reset(&self) {
        self.slot.send_modify(|slot| {
            slot.seq += 1;
            slot.state = RetrievalState::Empty;
        });
        self.auto_fetch_armed.store(true, Ordering::SeqCst);
    }

    /// Fetches the comparison for `week_number`, or the latest pair when
    /// `None`. No-op without a session.
    ///
    /// `Loading` is published before this returns; the returned future sends
    /// the request and applies the response.
    pub fn fetch(
        &self,
        week_number: Option<WeekNumber>,
    ) -> impl Future<Output = ()> + Send + 'static {
        let started = self.begin(week_number);
        let this = self.clone();
        async move {
            if let Some((seq, session, query)) = started {
                this.complete(seq, session, query).await;
            }
        }
    }

    fn begin(
        &self,
        week_number: Option<WeekNumber>,
    ) -> Option<(u64, Session, ComparisonQuery)> {
        let Some(session) = self.session.current_session() else {
            debug!("comparison fetch skipped: no session");
            return None;
        };

        let mut seq = 0;
        self.slot.send_modify(|slot| {
            slot.seq += 1;
            seq = slot.seq;
            slot.state = RetrievalState::Loading;
        });
        info!(
            client_id = %session.client_id,
            week_number = ?week_number.map(WeekNumber::get),
            seq,
            "fetching comparison"
        );

        let query = ComparisonQuery {
            client_id: session.client_id.clone(),
            week_number,
        };
        Some((seq, session, query))
    }

    async fn complete(&self, seq: u64, session: Session, query: ComparisonQuery) {
        let next = match self.backend.compare_reports(&session.token, &query).await {
            Ok(result) => RetrievalState::Loaded(result),
            Err(PortError::NotFound(detail)) => {
                debug!(seq, detail = %detail, "no comparable pair");
                RetrievalState::NotFound
            }
            Err(e) => {
                warn!(seq, "comparison fetch failed: {}", e);
                RetrievalState::Failed(fetch_error_message(e))
            }
        };

        let applied = self.slot.send_if_modified(|slot| {
            if slot.seq != seq {
                return false;
            }
            slot.state = next.clone();
            true
        });
        if !applied {
            debug!(seq, "discarding stale comparison response");
            return;
        }

        if let RetrievalState::Loaded(result) = next {
            info!(
                seq,
                week_number = result.week_number(),
                previous_week_number = result.previous_week_number(),
                "comparison loaded"
            );
            if self.events.send(WorkflowEvent::ComparisonLoaded(result)).is_err() {
                debug!("no view listening for loaded comparisons");
            }
        }
    }
}

fn fetch_error_message(error: PortError) -> String {
    match error {
        PortError::Transport(_) | PortError::Malformed(_) => NETWORK_ERROR_MESSAGE.to_string(),
        PortError::Rejected {
            message: Some(message),
            ..
        } => message,
        _ => FETCH_FAILED_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fake::{comparison, Call, FakeBackend, Scripted};
    use compare_bot_core::domain::Session;
    use std::sync::Mutex;

    struct FixedSession(Mutex<Option<Session>>);

    impl SessionSource for FixedSession {
        fn current_session(&self) -> Option<Session> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Harness {
        retrieval: ComparisonRetrieval,
        backend: Arc<FakeBackend>,
        session: Arc<FixedSession>,
        events: mpsc::UnboundedReceiver<WorkflowEvent>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let session = Arc::new(FixedSession(Mutex::new(Some(Session::new(
            "client_001",
            "jwt",
        )))));
        let (tx, events) = mpsc::unbounded_channel();
        let retrieval = ComparisonRetrieval::new(backend.clone(), session.clone(), tx);
        Harness {
            retrieval,
            backend,
            session,
            events,
        }
    }

    fn week(n: u32) -> Option<WeekNumber> {
        WeekNumber::new(n)
    }

    #[tokio::test]
    async fn starts_empty_and_loads() {
        let mut h = harness();
        assert_eq!(h.retrieval.state(), RetrievalState::Empty);

        h.backend.push_comparison(Scripted::now(Ok(comparison(16))));
        h.retrieval.fetch(week(16)).await;

        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));
        assert_eq!(
            h.events.try_recv().unwrap(),
            WorkflowEvent::ComparisonLoaded(comparison(16))
        );
        assert_eq!(
            h.backend.calls(),
            vec![Call::Compare {
                token: "jwt".into(),
                week_number: Some(16)
            }]
        );
    }

    #[tokio::test]
    async fn not_found_is_not_a_failure() {
        let h = harness();
        h.backend.push_comparison(Scripted::now(Err(PortError::NotFound(
            "No report found for week 15".into(),
        ))));
        h.retrieval.fetch(week(16)).await;
        assert_eq!(h.retrieval.state(), RetrievalState::NotFound);
    }

    #[tokio::test]
    async fn failures_map_to_messages() {
        let h = harness();
        h.backend.push_comparison(Scripted::now(Err(PortError::Rejected {
            status: 500,
            message: Some("Error generating comparison".into()),
        })));
        h.backend.push_comparison(Scripted::now(Err(PortError::Rejected {
            status: 422,
            message: None,
        })));
        h.backend
            .push_comparison(Scripted::now(Err(PortError::Transport("refused".into()))));
        h.backend
            .push_comparison(Scripted::now(Err(PortError::Malformed("eof".into()))));

        h.retrieval.fetch(week(16)).await;
        assert_eq!(
            h.retrieval.state(),
            RetrievalState::Failed("Error generating comparison".into())
        );
        h.retrieval.fetch(None).await;
        assert_eq!(
            h.retrieval.state(),
            RetrievalState::Failed(FETCH_FAILED_MESSAGE.into())
        );
        h.retrieval.fetch(None).await;
        assert_eq!(
            h.retrieval.state(),
            RetrievalState::Failed(NETWORK_ERROR_MESSAGE.into())
        );
        h.retrieval.fetch(None).await;
        assert_eq!(
            h.retrieval.state(),
            RetrievalState::Failed(NETWORK_ERROR_MESSAGE.into())
        );
    }

    #[tokio::test]
    async fn loading_replaces_previous_result() {
        let h = harness();
        h.backend.push_comparison(Scripted::now(Ok(comparison(15))));
        h.retrieval.fetch(week(15)).await;

        let (scripted, release) = Scripted::gated(Ok(comparison(16)));
        h.backend.push_comparison(scripted);
        let mut rx = h.retrieval.subscribe();
        let retrieval = h.retrieval.clone();
        let task = tokio::spawn(async move { retrieval.fetch(week(16)).await });

        let snapshot = rx.wait_for(|s| s.state.is_loading()).await.unwrap().clone();
        assert_eq!(snapshot.state, RetrievalState::Loading);
        assert!(h.retrieval.state().result().is_none());

        release.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));
    }

    #[tokio::test]
    async fn late_response_from_older_fetch_is_discarded() {
        let mut h = harness();
        let (first, release_first) = Scripted::gated(Ok(comparison(15)));
        let (second, release_second) = Scripted::gated(Ok(comparison(16)));
        h.backend.push_comparison(first);
        h.backend.push_comparison(second);

        let older = h.retrieval.clone();
        let newer = h.retrieval.clone();
        let older_task = tokio::spawn(async move { older.fetch(week(15)).await });
        let mut rx = h.retrieval.subscribe();
        rx.wait_for(|s| s.seq == 1).await.unwrap();
        let newer_task = tokio::spawn(async move { newer.fetch(week(16)).await });
        rx.wait_for(|s| s.seq == 2).await.unwrap();

        // The later-issued request resolves first, the older one last.
        release_second.send(()).unwrap();
        newer_task.await.unwrap();
        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));

        release_first.send(()).unwrap();
        older_task.await.unwrap();
        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));

        assert_eq!(
            h.events.try_recv().unwrap(),
            WorkflowEvent::ComparisonLoaded(comparison(16))
        );
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn in_order_overlap_keeps_latest() {
        let h = harness();
        let (first, release_first) = Scripted::gated(Ok(comparison(15)));
        let (second, release_second) = Scripted::gated(Ok(comparison(16)));
        h.backend.push_comparison(first);
        h.backend.push_comparison(second);

        let (older, newer) = (h.retrieval.clone(), h.retrieval.clone());
        let mut rx = h.retrieval.subscribe();
        let older_task = tokio::spawn(async move { older.fetch(week(15)).await });
        rx.wait_for(|s| s.seq == 1).await.unwrap();
        let newer_task = tokio::spawn(async move { newer.fetch(week(16)).await });
        rx.wait_for(|s| s.seq == 2).await.unwrap();

        release_first.send(()).unwrap();
        older_task.await.unwrap();
        // The older response landed after a newer fetch began: still loading.
        assert_eq!(h.retrieval.state(), RetrievalState::Loading);

        release_second.send(()).unwrap();
        newer_task.await.unwrap();
        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));
    }

    #[tokio::test]
    async fn reset_discards_in_flight_response() {
        let h = harness();
        let (scripted, release) = Scripted::gated(Ok(comparison(16)));
        h.backend.push_comparison(scripted);

        let retrieval = h.retrieval.clone();
        let mut rx = h.retrieval.subscribe();
        let task = tokio::spawn(async move { retrieval.fetch(week(16)).await });
        rx.wait_for(|s| s.state.is_loading()).await.unwrap();

        h.retrieval.reset();
        release.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(h.retrieval.state(), RetrievalState::Empty);
    }

    #[tokio::test]
    async fn no_session_means_no_fetch() {
        let h = harness();
        *h.session.0.lock().unwrap() = None;
        h.retrieval.fetch(week(16)).await;
        assert!(!h.retrieval.auto_fetch().await);
        assert_eq!(h.retrieval.state(), RetrievalState::Empty);
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn loading_is_visible_before_the_request_runs() {
        let h = harness();
        h.backend.push_comparison(Scripted::now(Ok(comparison(16))));

        let pending = h.retrieval.fetch(None);
        assert!(h.retrieval.is_populated());
        assert_eq!(h.retrieval.state(), RetrievalState::Loading);
        assert!(h.backend.calls().is_empty());

        pending.await;
        assert_eq!(h.retrieval.state(), RetrievalState::Loaded(comparison(16)));
    }

    #[tokio::test]
    async fn auto_fetch_fires_once_per_session() {
        let h = harness();
        h.backend.push_comparison(Scripted::now(Ok(comparison(16))));
        h.backend.push_comparison(Scripted::now(Ok(comparison(16))));

        assert!(h.retrieval.auto_fetch().await);
        assert!(!h.retrieval.auto_fetch().await);
        assert_eq!(h.backend.calls().len(), 1);
        assert_eq!(
            h.backend.calls()[0],
            Call::Compare {
                token: "jwt".into(),
                week_number: None
            }
        );

        h.retrieval.reset();
        assert!(h.retrieval.auto_fetch().await);
        assert_eq!(h.backend.calls().len(), 2);
    }
}
