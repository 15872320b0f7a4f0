//! services/client/src/workflow/session_store.rs
//!
//! Persists the authenticated session across restarts.

use compare_bot_core::domain::Session;
use compare_bot_core::ports::{KeyValueStore, KvOp, PortResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key for the bearer token.
pub const TOKEN_KEY: &str = "compare_bot_token";
/// Storage key for the client id the token was issued to.
pub const CLIENT_ID_KEY: &str = "compare_bot_client_id";

/// Keeps the two session keys in lock-step inside a [`KeyValueStore`].
///
/// Both keys are always written or removed in a single batch, so the store
/// never holds a token without its client id or the other way round.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the stored session, or `None` if either key is missing, empty
    /// or unreadable. Never touches the network.
    pub fn restore(&self) -> Option<Session> {
        let token = self.read(TOKEN_KEY)?;
        let client_id = self.read(CLIENT_ID_KEY)?;
        debug!(client_id = %client_id, "restored stored session");
        Some(Session::new(client_id, token))
    }

    pub fn persist(&self, session: &Session) -> PortResult<()> {
        self.store.apply(&[
            KvOp::Put {
                key: TOKEN_KEY.to_string(),
                value: session.token.clone(),
            },
            KvOp::Put {
                key: CLIENT_ID_KEY.to_string(),
                value: session.client_id.clone(),
            },
        ])
    }

    pub fn clear(&self) -> PortResult<()> {
        self.store.apply(&[
            KvOp::Delete {
                key: TOKEN_KEY.to_string(),
            },
            KvOp::Delete {
                key: CLIENT_ID_KEY.to_string(),
            },
        ])
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(key, "could not read session storage: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FileKeyValueStore, MemoryKeyValueStore};

    #[test]
    fn persist_then_restore_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::new(Arc::new(FileKeyValueStore::new(&path)))
            .persist(&Session::new("c1", "t1"))
            .unwrap();

        // A fresh store over the same file plays the part of a page reload.
        let reloaded = SessionStore::new(Arc::new(FileKeyValueStore::new(&path)));
        assert_eq!(reloaded.restore(), Some(Session::new("c1", "t1")));

        reloaded.clear().unwrap();
        let reloaded_again = SessionStore::new(Arc::new(FileKeyValueStore::new(&path)));
        assert_eq!(reloaded_again.restore(), None);
    }

    #[test]
    fn half_a_session_restores_as_none() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        kv.apply(&[KvOp::Put {
            key: TOKEN_KEY.into(),
            value: "orphan".into(),
        }])
        .unwrap();
        assert_eq!(SessionStore::new(kv.clone()).restore(), None);

        kv.apply(&[KvOp::Put {
            key: CLIENT_ID_KEY.into(),
            value: String::new(),
        }])
        .unwrap();
        assert_eq!(SessionStore::new(kv).restore(), None);
    }

    #[test]
    fn clear_removes_both_keys() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let store = SessionStore::new(kv.clone());
        store.persist(&Session::new("c1", "t1")).unwrap();
        assert_eq!(kv.len(), 2);
        store.clear().unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn unreadable_storage_restores_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"garbage").unwrap();
        let store = SessionStore::new(Arc::new(FileKeyValueStore::new(&path)));
        assert_eq!(store.restore(), None);
    }
}
