//! The session store: ties token transport, sealing and persistence into
//! the session lifecycle.
//!
//! # Request flow
//!
//! ```text
//! load:  request ─(TokenProvider)→ sealed id ─(Codec)→ SessionId
//!                ─(Backend)→ SessionDocument ─(Codec)→ values
//!
//! save:  values ─(Codec)→ payload ─(Backend upsert)→ stored
//!        SessionId ─(Codec)→ sealed id ─(TokenProvider)→ response
//! ```
//!
//! The store holds only immutable configuration (codecs, options, backend
//! handle), so one instance serves any number of concurrent requests.
//! Each [`Session`] belongs to a single request.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cellar_codec::{Codec, CodecSet, KeyPair};
use cellar_token::{CookieToken, SessionOptions, TokenProvider};
use chrono::{DateTime, Utc};
use http::{Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::LAST_ACCESSED_KEY;
use crate::{
    Clock, LoadFailure, Session, SessionBackend, SessionDocument, SessionId,
    SessionState, StoreError, SystemClock,
};

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Options copied into every session the store hands out.
    pub options: SessionOptions,

    /// Deadline for each individual backend call. `None` waits as long as
    /// the backend client does. Dropping the store's future cancels the
    /// in-flight call either way.
    pub operation_timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Persists sealed session values in a document backend and correlates
/// them with a sealed token held by the client.
///
/// ## Type parameters
///
/// - `B`: where documents live ([`MemoryBackend`](crate::MemoryBackend),
///   `MongoBackend`, or your own)
/// - `T`: how the token travels (defaults to [`CookieToken`])
/// - `C`: how values are sealed (defaults to [`CodecSet`])
pub struct SessionStore<B, T = CookieToken, C = CodecSet> {
    backend: B,
    token: T,
    codec: C,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl<B: SessionBackend> SessionStore<B> {
    /// Builds a cookie-based store sealing with the given key pairs,
    /// primary first.
    ///
    /// # Errors
    /// - [`StoreError::Codec`] if a key pair is malformed
    /// - [`StoreError::Token`] if the configured options are invalid
    pub fn new(
        backend: B,
        config: StoreConfig,
        key_pairs: &[KeyPair],
    ) -> Result<Self, StoreError> {
        let codec = CodecSet::from_pairs(key_pairs)?;
        Self::with_parts(backend, CookieToken, codec, config)
    }
}

impl<B, T, C> SessionStore<B, T, C>
where
    B: SessionBackend,
    T: TokenProvider,
    C: Codec,
{
    /// Builds a store from explicit parts.
    ///
    /// # Errors
    /// Returns [`StoreError::Token`] if the configured options are invalid.
    pub fn with_parts(
        backend: B,
        token: T,
        codec: C,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        config.options.validate()?;
        Ok(Self {
            backend,
            token,
            codec,
            config,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the session named `name` for this request.
    ///
    /// Same as [`new_session`](Self::new_session); use a
    /// [`Registry`](crate::Registry) to share one session across several
    /// lookups in the same request.
    pub async fn get<Rq>(
        &self,
        request: &Request<Rq>,
        name: &str,
    ) -> Result<Session, LoadFailure> {
        self.new_session(request, name).await
    }

    /// Creates the session for this request, recovering the stored one if
    /// the client presents a valid token.
    ///
    /// - No token: a fresh session, no backend call.
    /// - Token opens to an id with a stored document: the loaded session,
    ///   `is_new() == false`.
    /// - Token opens to an id with no document: a fresh session.
    ///
    /// # Errors
    /// A bad token (tampered, expired, malformed id), an unreadable
    /// document or a backend failure yields [`LoadFailure`], which still
    /// carries a fresh session.
    pub async fn new_session<Rq>(
        &self,
        request: &Request<Rq>,
        name: &str,
    ) -> Result<Session, LoadFailure> {
        let mut session = Session::new(name, self.config.options.clone());

        let token = match self.token.get_token(request, name) {
            Ok(token) => token,
            Err(e) => {
                tracing::trace!(name, reason = %e, "no session token");
                return Ok(session);
            }
        };

        let raw_id: String = match self.codec.open(name, &token) {
            Ok(raw_id) => raw_id,
            Err(e) => {
                tracing::warn!(name, error = %e, "rejected session token");
                return Err(LoadFailure::new(session, e.into()));
            }
        };
        let id = match raw_id.parse::<SessionId>() {
            Ok(id) => id,
            Err(e) => return Err(LoadFailure::new(session, e)),
        };

        session.id = Some(id);
        match self.load(&mut session).await {
            Ok(()) => Ok(session),
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(name, session_id = %id, "no stored session, starting fresh");
                session.reset();
                Ok(session)
            }
            Err(e) => {
                tracing::debug!(name, session_id = %id, error = %e, "session load failed");
                session.reset();
                Err(LoadFailure::new(session, e))
            }
        }
    }

    /// Reads the stored document for `session.id()` into the session.
    ///
    /// On failure the session's values are left untouched.
    ///
    /// # Errors
    /// - [`StoreError::InvalidIdentifier`] if the session has no id
    ///   (checked before any backend call)
    /// - [`StoreError::NotFound`] if no document exists
    /// - [`StoreError::Codec`] if the payload is tampered or unreadable
    /// - [`StoreError::Backend`] / [`StoreError::Timeout`] from the backend
    pub async fn load(&self, session: &mut Session) -> Result<(), StoreError> {
        let id = session.id.ok_or_else(missing_id)?;

        let document = self
            .call(self.backend.find_one(&id))
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let values: HashMap<String, Value> =
            self.codec.open(&session.name, &document.payload)?;

        session.values = values;
        session.user_id = document.user_id;
        session.last_accessed = Some(document.last_accessed);
        session.is_new = false;
        session.state = SessionState::Loaded;

        tracing::debug!(name = %session.name, session_id = %id, "session loaded");
        Ok(())
    }

    /// Persists or destroys the session, depending on the sign of
    /// `session.options.max_age`.
    ///
    /// **Destroy** (`max_age < 0`): deletes the stored document and clears
    /// the client token. Destroying an already-deleted session succeeds.
    ///
    /// **Persist** (`max_age >= 0`): assigns an id if the session has none,
    /// stamps the current time as the access time (unless the reserved
    /// `lastAccessed` value pins one), seals the values, upserts the
    /// document, then writes the sealed id to the response. If the upsert
    /// fails no token is written. The session only moves to
    /// [`SessionState::Saved`] once the token is written.
    ///
    /// # Errors
    /// - [`StoreError::InvalidIdentifier`] when destroying a session that
    ///   was never saved
    /// - [`StoreError::Token`] if the session's options were changed to
    ///   something a token cannot carry (checked before the upsert)
    /// - [`StoreError::InvalidLastAccessedTime`] if the reserved
    ///   `lastAccessed` value is not a timestamp (nothing is written)
    /// - [`StoreError::Codec`], [`StoreError::Token`], [`StoreError::Backend`],
    ///   [`StoreError::Timeout`]
    pub async fn save<Rs>(
        &self,
        response: &mut Response<Rs>,
        session: &mut Session,
    ) -> Result<(), StoreError> {
        if session.options.is_destroy() {
            return self.destroy(response, session).await;
        }
        session.options.validate()?;

        // Only an explicit reserved value pins the access time. The time
        // read back from the document is not reused.
        let pinned = reserved_last_accessed(&session.values)?;
        let last_accessed = pinned.unwrap_or_else(|| self.clock.now());
        if pinned.is_some() {
            session.values.remove(LAST_ACCESSED_KEY);
        }

        let id = match session.id {
            Some(id) => id,
            None => SessionId::generate_at(self.clock.now()),
        };

        let payload = self.codec.seal(&session.name, &session.values)?;
        let token = self.codec.seal(&session.name, &id.to_string())?;

        let document = SessionDocument {
            id,
            user_id: session.user_id,
            payload,
            last_accessed,
        };
        self.call(self.backend.upsert_one(&document)).await?;

        self.token
            .set_token(response, &session.name, &token, &session.options)?;

        if session.id.is_none() {
            tracing::info!(name = %session.name, session_id = %id, "session created");
        }
        session.id = Some(id);
        session.last_accessed = Some(last_accessed);
        session.state = SessionState::Saved;

        tracing::debug!(name = %session.name, session_id = %id, "session saved");
        Ok(())
    }

    /// Recovers the session and, if it already existed, saves it with a
    /// fresh access time. A session with no stored document is returned
    /// unsaved.
    ///
    /// # Errors
    /// Any failure from [`get`](Self::get) or [`save`](Self::save).
    pub async fn get_and_touch<Rq, Rs>(
        &self,
        request: &Request<Rq>,
        response: &mut Response<Rs>,
        name: &str,
    ) -> Result<Session, StoreError> {
        let mut session = self.get(request, name).await?;
        if session.is_new() {
            return Ok(session);
        }

        session.touch();
        self.save(response, &mut session).await?;
        Ok(session)
    }

    async fn destroy<Rs>(
        &self,
        response: &mut Response<Rs>,
        session: &mut Session,
    ) -> Result<(), StoreError> {
        let id = session.id.ok_or_else(missing_id)?;

        self.call(self.backend.delete_one(&id)).await?;
        self.token
            .set_token(response, &session.name, "", &session.options)?;

        session.state = SessionState::Destroyed;
        tracing::info!(name = %session.name, session_id = %id, "session destroyed");
        Ok(())
    }

    /// Runs one backend call under the configured deadline.
    async fn call<F, R, E>(&self, operation: F) -> Result<R, StoreError>
    where
        F: Future<Output = Result<R, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let result = match self.config.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| {
                    tracing::warn!(?limit, "backend call timed out");
                    StoreError::Timeout(limit)
                })?,
            None => operation.await,
        };
        result.map_err(|e| StoreError::Backend(Box::new(e)))
    }
}

fn missing_id() -> StoreError {
    StoreError::InvalidIdentifier(String::new())
}

/// Reads the reserved access-time value, if the application set one.
fn reserved_last_accessed(
    values: &HashMap<String, Value>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    values
        .get(LAST_ACCESSED_KEY)
        .map(|raw| {
            DateTime::<Utc>::deserialize(raw)
                .map_err(|_| StoreError::InvalidLastAccessedTime)
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use cellar_codec::CodecError;
    use http::header::{COOKIE, SET_COOKIE};

    use super::*;
    use crate::MemoryBackend;

    fn store() -> SessionStore<MemoryBackend> {
        SessionStore::new(
            MemoryBackend::new(),
            StoreConfig::default(),
            &[KeyPair::new(vec![3u8; 32], [4u8; 32])],
        )
        .expect("valid store")
    }

    fn empty_request() -> Request<()> {
        Request::new(())
    }

    /// Turns the `Set-Cookie` header of a response into the request a
    /// browser would send next.
    fn follow_up(response: &Response<()>) -> Request<()> {
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .expect("token written")
            .to_str()
            .unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        Request::builder().header(COOKIE, pair).body(()).unwrap()
    }

    // =====================================================================
    // new() / with_parts()
    // =====================================================================

    #[test]
    fn test_new_rejects_invalid_options() {
        let config = StoreConfig {
            options: SessionOptions {
                path: "relative".into(),
                ..Default::default()
            },
            ..Default::default()
        };

        let result = SessionStore::new(
            MemoryBackend::new(),
            config,
            &[KeyPair::signing_only(b"k".to_vec())],
        );

        assert!(matches!(result, Err(StoreError::Token(_))));
    }

    #[test]
    fn test_new_rejects_bad_key_pair() {
        let result = SessionStore::new(
            MemoryBackend::new(),
            StoreConfig::default(),
            &[KeyPair::new(b"k".to_vec(), [0u8; 7])],
        );

        assert!(matches!(result, Err(StoreError::Codec(CodecError::InvalidKey(_)))));
    }

    // =====================================================================
    // new_session() / save()
    // =====================================================================

    #[tokio::test]
    async fn test_new_session_without_token_is_new() {
        let store = store();

        let session = store
            .new_session(&empty_request(), "sid")
            .await
            .expect("no error");

        assert!(session.is_new());
        assert!(session.values().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_new_session_recovers_values() {
        let store = store();
        let mut session = store.new_session(&empty_request(), "sid").await.unwrap();
        session.insert("user", "ada").unwrap();
        session.set_user_id(Some(42));
        let mut response = Response::new(());

        store.save(&mut response, &mut session).await.expect("saved");

        let loaded = store
            .new_session(&follow_up(&response), "sid")
            .await
            .expect("loaded");
        assert!(!loaded.is_new());
        assert_eq!(loaded.state(), SessionState::Loaded);
        assert_eq!(loaded.id(), session.id());
        assert_eq!(loaded.get::<String>("user").as_deref(), Some("ada"));
        assert_eq!(loaded.user_id(), Some(42));
    }

    #[tokio::test]
    async fn test_load_without_id_returns_invalid_identifier() {
        let store = store();
        let mut session = Session::new("sid", SessionOptions::default());

        let result = store.load(&mut session).await;

        assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn test_save_reserved_timestamp_is_lifted_into_field() {
        let store = store();
        let pinned = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        let mut session = Session::new("sid", SessionOptions::default());
        session.insert(LAST_ACCESSED_KEY, pinned).unwrap();

        store.save(&mut Response::new(()), &mut session).await.unwrap();

        assert_eq!(session.last_accessed(), Some(pinned));
        assert!(!session.contains_key(LAST_ACCESSED_KEY));
        let id = session.id().unwrap();
        let stored = store.backend().get(&id).await.unwrap();
        assert_eq!(stored.last_accessed, pinned);
    }

    #[test]
    fn test_reserved_last_accessed_absent_is_none() {
        let values = HashMap::new();
        assert!(matches!(reserved_last_accessed(&values), Ok(None)));
    }

    #[test]
    fn test_reserved_last_accessed_wrong_type_is_error() {
        let values =
            HashMap::from([(LAST_ACCESSED_KEY.to_string(), serde_json::json!(17))]);
        assert!(matches!(
            reserved_last_accessed(&values),
            Err(StoreError::InvalidLastAccessedTime)
        ));
    }
}
