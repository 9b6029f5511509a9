//! Per-browser session storage and message dispatch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rag_core::{update, AppViewModel, Effect, Msg, SessionContext};
use rag_engine::UrlKnowledge;
use rag_logging::{rag_debug, rag_info};
use uuid::Uuid;

pub type SessionId = Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session {0}")]
    Unknown(SessionId),
}

/// Session state plus the live knowledge handle the core only knows by summary.
#[derive(Default)]
pub struct SessionEntry {
    pub state: SessionContext,
    pub knowledge: Option<Arc<UrlKnowledge>>,
}

/// Result of applying one message.
#[derive(Debug)]
pub struct Dispatched {
    pub view: AppViewModel,
    pub effects: Vec<Effect>,
    pub changed: bool,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<SessionId, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self) -> SessionId {
        let id = Uuid::new_v4();
        let active = {
            let mut sessions = self.lock();
            sessions.insert(id, SessionEntry::default());
            sessions.len()
        };
        rag_info!("session {} started ({} active)", id, active);
        id
    }

    pub fn remove(&self, id: SessionId) -> Result<(), SessionError> {
        match self.lock().remove(&id) {
            Some(_) => {
                rag_info!("session {} ended", id);
                Ok(())
            }
            None => Err(SessionError::Unknown(id)),
        }
    }

    pub fn view(&self, id: SessionId) -> Result<AppViewModel, SessionError> {
        self.with_entry(id, |entry| entry.state.view())
    }

    /// Runs `update` for one message. The lock is released before returning.
    pub fn dispatch(&self, id: SessionId, msg: Msg) -> Result<Dispatched, SessionError> {
        self.with_entry(id, |entry| {
            rag_debug!("session {} <- {:?}", id, msg);
            let state = std::mem::take(&mut entry.state);
            let (mut state, effects) = update(state, msg);
            let changed = state.consume_dirty();
            let view = state.view();
            entry.state = state;
            Dispatched {
                view,
                effects,
                changed,
            }
        })
    }

    pub fn knowledge(&self, id: SessionId) -> Result<Option<Arc<UrlKnowledge>>, SessionError> {
        self.with_entry(id, |entry| entry.knowledge.clone())
    }

    pub fn set_knowledge(
        &self,
        id: SessionId,
        knowledge: Arc<UrlKnowledge>,
    ) -> Result<(), SessionError> {
        self.with_entry(id, |entry| entry.knowledge = Some(knowledge))
    }

    fn with_entry<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut SessionEntry) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.lock();
        let entry = sessions.get_mut(&id).ok_or(SessionError::Unknown(id))?;
        Ok(f(entry))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rag_core::{Effect, Msg};

    use super::*;

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();

        store
            .dispatch(a, Msg::UrlEdited { index: 0, text: "https://a.example".into() })
            .unwrap();

        assert_eq!(store.view(a).unwrap().url_entries, vec!["https://a.example"]);
        assert_eq!(store.view(b).unwrap().url_entries, vec![""]);
    }

    #[test]
    fn dispatch_returns_effects_and_view() {
        let store = SessionStore::new();
        let id = store.create();
        store
            .dispatch(id, Msg::UrlEdited { index: 0, text: "https://a.example".into() })
            .unwrap();

        let dispatched = store.dispatch(id, Msg::LoadClicked).unwrap();

        assert_eq!(
            dispatched.effects,
            vec![Effect::LoadKnowledgeBase {
                urls: vec!["https://a.example".into()]
            }]
        );
        assert!(dispatched.view.load_in_progress);
        assert!(dispatched.changed);
    }

    #[test]
    fn unknown_and_removed_sessions_are_errors() {
        let store = SessionStore::new();
        let id = store.create();
        assert!(store.view(id).is_ok());

        store.remove(id).unwrap();

        assert_eq!(store.view(id).unwrap_err(), SessionError::Unknown(id));
        assert_eq!(store.remove(id), Err(SessionError::Unknown(id)));
        assert!(matches!(
            store.dispatch(id, Msg::NoOp),
            Err(SessionError::Unknown(_))
        ));
    }
}
