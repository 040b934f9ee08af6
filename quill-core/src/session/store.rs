//! Session handles and the pluggable store contract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::event::Event;
use super::filter::filter_compacted;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{name}' for user '{user_id}' already exists")]
    AlreadyExists { user_id: String, name: String },

    #[error("session '{name}' for user '{user_id}' not found")]
    NotFound { user_id: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    user_id: String,
    name: String,
}

/// One conversation log. The session exclusively owns its events; appends
/// serialise on the event lock, so they are linearisable per session while
/// different sessions stay independent.
pub struct Session {
    user_id: String,
    name: String,
    created_at: DateTime<Utc>,
    events: Mutex<Vec<Event>>,
}

impl Session {
    fn new(user_id: String, name: String) -> Self {
        Self {
            user_id,
            name,
            created_at: Utc::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append an event, filling id and timestamp when absent. Returns the
    /// stored form.
    pub async fn append_event(&self, mut event: Event) -> Event {
        if event.id.is_empty() {
            event.id = Uuid::new_v4().to_string();
        }
        if event.timestamp.is_none() {
            event.timestamp = Some(Utc::now());
        }
        let mut events = self.events.lock().await;
        events.push(event.clone());
        event
    }

    /// The filtered view: compacted spans are hidden, compaction summaries
    /// remain visible.
    pub async fn events(&self) -> Vec<Event> {
        let events = self.events.lock().await;
        filter_compacted(&events)
    }

    /// The unfiltered log, used by the compaction engine.
    pub async fn events_raw(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

/// Store contract consumed by the core. Persistence is pluggable; the
/// in-memory implementation below is the reference.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_id: &str, name: &str) -> Result<Arc<Session>, SessionError>;
    async fn get(&self, user_id: &str, name: &str) -> Result<Arc<Session>, SessionError>;
    async fn delete(&self, user_id: &str, name: &str) -> Result<(), SessionError>;
}

/// Reference store keeping sessions in process memory.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: &str, name: &str) -> Result<Arc<Session>, SessionError> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            name: name.to_string(),
        };
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&key) {
            return Err(SessionError::AlreadyExists {
                user_id: user_id.to_string(),
                name: name.to_string(),
            });
        }
        let session = Arc::new(Session::new(user_id.to_string(), name.to_string()));
        sessions.insert(key, session.clone());
        Ok(session)
    }

    async fn get(&self, user_id: &str, name: &str) -> Result<Arc<Session>, SessionError> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            name: name.to_string(),
        };
        self.sessions
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| SessionError::NotFound {
                user_id: user_id.to_string(),
                name: name.to_string(),
            })
    }

    async fn delete(&self, user_id: &str, name: &str) -> Result<(), SessionError> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            name: name.to_string(),
        };
        // Deleting the session removes every event it owns.
        self.sessions
            .write()
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound {
                user_id: user_id.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::content::Content;
    use crate::session::event::EventAuthor;

    #[tokio::test]
    async fn create_get_delete_lifecycle() {
        let store = InMemorySessionStore::new();
        store.create("u1", "main").await.unwrap();
        assert!(matches!(
            store.create("u1", "main").await,
            Err(SessionError::AlreadyExists { .. })
        ));

        let session = store.get("u1", "main").await.unwrap();
        assert_eq!(session.name(), "main");

        store.delete("u1", "main").await.unwrap();
        assert!(matches!(
            store.get("u1", "main").await,
            Err(SessionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn append_fills_id_and_timestamp_and_preserves_order() {
        let store = InMemorySessionStore::new();
        let session = store.create("u1", "s").await.unwrap();

        for i in 0..5 {
            let stored = session
                .append_event(Event::new(
                    format!("inv-{i}"),
                    EventAuthor::User,
                    Content::user_text(format!("msg {i}")),
                ))
                .await;
            assert!(!stored.id.is_empty());
            assert!(stored.timestamp.is_some());
        }

        let raw = session.events_raw().await;
        assert_eq!(raw.len(), 5);
        for (i, event) in raw.iter().enumerate() {
            assert_eq!(event.invocation_id, format!("inv-{i}"));
        }
    }

    #[tokio::test]
    async fn concurrent_appends_serialise() {
        let store = InMemorySessionStore::new();
        let session = store.create("u1", "s").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session
                    .append_event(Event::new(
                        format!("inv-{i}"),
                        EventAuthor::User,
                        Content::user_text("x"),
                    ))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(session.events_raw().await.len(), 20);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = InMemorySessionStore::new();
        let a = store.create("u1", "a").await.unwrap();
        let b = store.create("u1", "b").await.unwrap();

        a.append_event(Event::new("i", EventAuthor::User, Content::user_text("x")))
            .await;
        assert_eq!(a.events_raw().await.len(), 1);
        assert_eq!(b.events_raw().await.len(), 0);
    }
}
