//! Error types for the store layer.

use std::time::Duration;

use cellar_codec::CodecError;
use cellar_token::TokenError;

use crate::{Session, SessionId};

/// Errors that can occur during the session lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier is missing or not a 24-character hex object id.
    /// Raised before any backend call.
    #[error("invalid session identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The backend holds no document for this identifier.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The reserved `lastAccessed` value is present but is not a UTC
    /// timestamp. Nothing was written.
    #[error("invalid last accessed time")]
    InvalidLastAccessedTime,

    /// Sealing or opening a token or payload failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reading or writing the client token failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The backend call failed. Passed through untouched.
    #[error("backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    /// The backend call did not finish within the configured deadline.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Returns `true` if the client presented something we did not issue,
    /// or no longer accept. Treat these as "not logged in", not as a
    /// server fault.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Codec(CodecError::Authentication | CodecError::Expired)
        )
    }
}

/// A failed session lookup that still hands back a usable, empty session.
///
/// [`SessionStore::new_session`](crate::SessionStore::new_session) never
/// leaves the caller without a session: a bad token or a broken backend
/// still yields a fresh one, alongside the reason the old one could not be
/// recovered.
///
/// ```rust,ignore
/// let session = match store.new_session(&request, "sid").await {
///     Ok(session) => session,
///     Err(failure) => {
///         tracing::warn!(error = %failure, "starting a fresh session");
///         failure.into_session()
///     }
/// };
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct LoadFailure {
    session: Session,
    #[source]
    error: StoreError,
}

impl LoadFailure {
    pub(crate) fn new(session: Session, error: StoreError) -> Self {
        Self { session, error }
    }

    /// The fresh session handed out in place of the one that failed.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Why the previous session could not be recovered.
    pub fn error(&self) -> &StoreError {
        &self.error
    }

    /// Discards the error and keeps the fresh session.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Discards the fresh session and keeps the error.
    pub fn into_error(self) -> StoreError {
        self.error
    }

    pub fn into_parts(self) -> (Session, StoreError) {
        (self.session, self.error)
    }
}

impl From<LoadFailure> for StoreError {
    fn from(failure: LoadFailure) -> Self {
        failure.error
    }
}
