//! Session types: the request-local view of one stored session.
//!
//! A [`Session`] is created fresh for every request. It is owned by the
//! handler for the duration of that request and never shared, so it needs
//! no locking. The backend document is the source of truth; the session is
//! a working copy that [`SessionStore::save`](crate::SessionStore::save)
//! writes back as one unit.

use std::collections::HashMap;
use std::fmt;

use cellar_codec::CodecError;
use cellar_token::SessionOptions;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::SessionId;

/// Reserved value key older payloads used to carry the access time.
///
/// The access time now lives in [`Session::last_accessed`]. A value under
/// this key is still honoured on save, and must be a UTC timestamp: it is
/// stored instead of the current time.
pub const LAST_ACCESSED_KEY: &str = "lastAccessed";

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its per-request lifecycle.
///
/// ```text
///   New ──(load)──→ Loaded ──(save)──→ Saved
///    │                 │
///    └────(save)───────┴──(save, max_age < 0)──→ Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stored document backs this session (yet).
    New,
    /// Values were read from a stored document.
    Loaded,
    /// Values were written to the backend during this request.
    Saved,
    /// The stored document was deleted and the client token cleared.
    Destroyed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Loaded => write!(f, "Loaded"),
            Self::Saved => write!(f, "Saved"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One session's values and metadata for the current request.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) name: String,
    pub(crate) id: Option<SessionId>,
    pub(crate) values: HashMap<String, Value>,
    pub(crate) is_new: bool,
    pub(crate) state: SessionState,
    pub(crate) user_id: Option<i64>,
    pub(crate) last_accessed: Option<DateTime<Utc>>,

    /// Token attributes and lifetime for this session. Starts as a copy of
    /// the store's options; change it to affect only this session.
    pub options: SessionOptions,
}

impl Session {
    /// Creates an empty, unsaved session.
    pub fn new(name: impl Into<String>, options: SessionOptions) -> Self {
        Self {
            name: name.into(),
            id: None,
            values: HashMap::new(),
            is_new: true,
            state: SessionState::New,
            user_id: None,
            last_accessed: None,
            options,
        }
    }

    /// The token name this session travels under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier, once one has been recovered or assigned by a save.
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    /// `true` unless the session was recovered from a stored document.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Associates the session with an application user. Stored alongside
    /// the sealed values, in the clear, so the backend can be queried by it.
    pub fn set_user_id(&mut self, user_id: Option<i64>) {
        self.user_id = user_id;
    }

    /// When the stored document was last accessed, as of the last load or
    /// save. Every save stamps a new time unless [`LAST_ACCESSED_KEY`]
    /// pins one.
    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    /// Forgets the access time, including any value pinned under
    /// [`LAST_ACCESSED_KEY`], so the next save stamps the current time.
    pub fn touch(&mut self) {
        self.last_accessed = None;
        self.values.remove(LAST_ACCESSED_KEY);
    }

    /// Marks the session for destruction: the next save deletes the stored
    /// document and clears the client token.
    pub fn invalidate(&mut self) {
        self.options.max_age = -1;
    }

    // -- Values -----------------------------------------------------------

    /// Reads and deserializes a value. `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Reads a value without deserializing it.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Serializes and stores a value, returning the one it replaced.
    ///
    /// # Errors
    /// Returns [`CodecError::Encode`] if `value` has no JSON form.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>, CodecError> {
        let value = serde_json::to_value(value).map_err(CodecError::Encode)?;
        Ok(self.values.insert(key.into(), value))
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut HashMap<String, Value> {
        &mut self.values
    }

    /// Drops everything recovered from a token or document, back to a
    /// fresh `New` session. Options are kept.
    pub(crate) fn reset(&mut self) {
        self.id = None;
        self.values.clear();
        self.is_new = true;
        self.state = SessionState::New;
        self.user_id = None;
        self.last_accessed = None;
    }
}
