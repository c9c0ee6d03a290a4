//! # Cellar
//!
//! Server-side sessions for HTTP services.
//!
//! The client holds only a sealed session id (in a cookie by default).
//! The session's values live in a document store, sealed with the same
//! keys. Keys rotate by prepending a new pair: the first pair seals, every
//! pair opens.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cellar::prelude::*;
//!
//! # async fn handle(request: http::Request<()>) -> Result<http::Response<()>, CellarError> {
//! let store = SessionStore::new(
//!     MemoryBackend::new(),
//!     StoreConfig::default(),
//!     &[KeyPair::new(b"32-byte-or-longer-signing-key....".to_vec(), [7u8; 32])],
//! )?;
//!
//! let mut session = match store.get(&request, "sid").await {
//!     Ok(session) => session,
//!     Err(failure) => failure.into_session(),
//! };
//! let visits = session.get::<u64>("visits").unwrap_or(0) + 1;
//! session.insert("visits", visits)?;
//!
//! let mut response = http::Response::new(());
//! store.save(&mut response, &mut session).await?;
//! # Ok(response)
//! # }
//! ```
//!
//! ## Crates
//!
//! | Layer | Crate | Provides |
//! |-------|-------|----------|
//! | Transport | `cellar-token` | [`TokenProvider`], [`CookieToken`], [`SessionOptions`] |
//! | Sealing | `cellar-codec` | [`Codec`], [`SecureCodec`], [`CodecSet`], [`KeyPair`] |
//! | Lifecycle | `cellar-store` | [`SessionStore`], [`Session`], [`SessionBackend`] |

mod error;

pub use error::CellarError;

pub use cellar_codec::{
    BLOCK_KEY_LEN, Codec, CodecError, CodecSet, DEFAULT_MAX_LENGTH, KeyPair, SecureCodec,
};
#[cfg(feature = "mongodb")]
pub use cellar_store::{MongoBackend, MongoBackendError};
pub use cellar_store::{
    Clock, LAST_ACCESSED_KEY, LoadFailure, MemoryBackend, Registry, SESSION_ID_LEN,
    Session, SessionBackend, SessionDocument, SessionId, SessionState, SessionStore,
    StoreConfig, StoreError, SystemClock,
};
pub use cellar_token::{
    CookieToken, DEFAULT_MAX_AGE, SameSite, SessionOptions, TokenError, TokenProvider,
};

/// The types most handlers need.
pub mod prelude {
    pub use crate::CellarError;
    pub use cellar_codec::{Codec, CodecSet, KeyPair};
    pub use cellar_store::{
        LoadFailure, MemoryBackend, Registry, Session, SessionBackend, SessionId,
        SessionStore, StoreConfig, StoreError,
    };
    pub use cellar_token::{CookieToken, SameSite, SessionOptions, TokenProvider};
}
