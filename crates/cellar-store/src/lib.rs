//! Document-backed session store for Cellar.
//!
//! The client holds a sealed session id in a token (a cookie by default);
//! the server holds the session's sealed values in a document keyed by
//! that id.
//!
//! 1. **Lifecycle**: [`SessionStore`] implements new / load / save /
//!    get-and-touch, with `max_age < 0` meaning "destroy on save"
//! 2. **Sessions**: [`Session`] is the request-local working copy
//! 3. **Persistence**: [`SessionBackend`] (three keyed operations),
//!    [`MemoryBackend`], and `MongoBackend` behind the `mongodb` feature
//!
//! # How it fits in the stack
//!
//! ```text
//! Application handlers (above)  ← read and write session values
//!     ↕
//! Session store (this crate)    ← lifecycle, ids, access times
//!     ↕                   ↕
//! cellar-token           cellar-codec
//! (cookie transport)     (sealing, key rotation)
//! ```

mod backend;
mod clock;
mod document;
mod error;
mod id;
#[cfg(feature = "mongodb")]
mod mongo;
mod registry;
mod session;
mod store;

pub use backend::{MemoryBackend, SessionBackend};
pub use clock::{Clock, SystemClock};
pub use document::SessionDocument;
pub use error::{LoadFailure, StoreError};
pub use id::{SESSION_ID_LEN, SessionId};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoBackend, MongoBackendError};
pub use registry::Registry;
pub use session::{LAST_ACCESSED_KEY, Session, SessionState};
pub use store::{SessionStore, StoreConfig};
