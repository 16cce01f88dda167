//! Per-client conversation state.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::debug;

use super::prompts::{ACKNOWLEDGEMENT, Language};
use crate::llm::{ChatBackend, Conversation, Turn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Identifies a client. Derived from the peer IP, so every client behind one
/// address shares its conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Used when the peer address is unknown.
    pub fn anonymous() -> Self {
        Self("anonymous".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for SessionKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type Sessions = HashMap<SessionKey, HashMap<Language, Arc<Conversation>>>;

/// Maps each session and language to its conversation.
///
/// Creation happens under a synchronous lock that is never held across an
/// await, so concurrent first messages for one session and language end up on
/// the same conversation. Nothing is evicted.
pub struct SessionStore {
    backend: Arc<dyn ChatBackend>,
    sessions: Mutex<Sessions>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the conversation for `key` and `language`, seeding a new one with
    /// the language's system prompt if there is none.
    pub fn get_or_create(
        &self,
        key: &SessionKey,
        language: Language,
    ) -> Result<Arc<Conversation>, StoreError> {
        let mut sessions = self.lock()?;
        let conversations = sessions.entry(key.clone()).or_default();

        if let Some(conversation) = conversations.get(&language) {
            return Ok(Arc::clone(conversation));
        }

        debug!(session = %key, %language, "starting conversation");
        let seed = vec![
            Turn::user(language.system_prompt()),
            Turn::model(ACKNOWLEDGEMENT),
        ];
        let conversation = Arc::new(Conversation::new(Arc::clone(&self.backend), seed));
        conversations.insert(language, Arc::clone(&conversation));
        Ok(conversation)
    }

    /// Drops every conversation of `key`. Returns whether there was any.
    ///
    /// A reply still streaming keeps its own handle and finishes normally; its
    /// turn lands in the dropped conversation.
    pub fn clear(&self, key: &SessionKey) -> Result<bool, StoreError> {
        let removed = self.lock()?.remove(key);
        Ok(removed.is_some_and(|conversations| !conversations.is_empty()))
    }

    pub fn session_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn conversation_count(&self, key: &SessionKey) -> Result<usize, StoreError> {
        Ok(self.lock()?.get(key).map_or(0, HashMap::len))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Sessions>, StoreError> {
        self.sessions.lock().map_err(|_| StoreError::Poisoned)
    }
}
