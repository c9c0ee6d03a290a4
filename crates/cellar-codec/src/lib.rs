//! Value sealing for Cellar.
//!
//! - **Codec** ([`Codec`] trait): seal a value into an opaque string,
//!   open it back into a value.
//! - **SecureCodec**: HMAC-SHA256 authentication plus optional
//!   AES-256-GCM encryption, built from one [`KeyPair`].
//! - **CodecSet**: several codecs in priority order, for key rotation.
//! - **Errors** ([`CodecError`]): authentication vs. decoding vs. encoding.
//!
//! The session store seals two things with the same codec: the session id
//! that travels in the client's token, and the session values stored in
//! the database.

mod codec;
mod error;
mod multi;
mod secure;

pub use codec::Codec;
pub use error::CodecError;
pub use multi::CodecSet;
pub use secure::{
    BLOCK_KEY_LEN, DEFAULT_MAX_AGE, DEFAULT_MAX_LENGTH, KeyPair, SecureCodec,
};
