//! The [`Codec`] trait: sealing values into opaque strings and back.
//!
//! A "sealed" value is safe to hand to an untrusted party (a browser, a
//! database row that other services can read). Whoever holds it can carry
//! it around, but only a holder of the keys can open it, and any change to
//! it is detected on open.
//!
//! The store depends on the trait, not on [`SecureCodec`](crate::SecureCodec),
//! so tests can substitute a transparent codec when they want to inspect
//! what was written.

use serde::{Serialize, de::DeserializeOwned};

use crate::CodecError;

/// Seals values into authenticated strings and opens them again.
///
/// ## The `name` argument
///
/// Every seal is bound to a name (the cookie or session name). A value
/// sealed under `"session"` will not open under `"admin"`, even with the
/// same keys. This stops a client from copying a token from one cookie
/// into another.
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` because one codec is shared by every request a
/// store serves, on whatever thread the runtime picks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes and seals `value`.
    ///
    /// # Errors
    /// - [`CodecError::Encode`] if `value` cannot be serialized
    /// - [`CodecError::TooLong`] if the result exceeds the length limit
    /// - [`CodecError::NoCodecs`] if there is no key to seal with
    fn seal<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<String, CodecError>;

    /// Verifies and opens a sealed value.
    ///
    /// # Errors
    /// - [`CodecError::Authentication`] if no key verifies `sealed`
    /// - [`CodecError::Expired`] if the embedded timestamp is too old
    /// - [`CodecError::Decode`] if the verified body is not a `T`
    fn open<T: DeserializeOwned>(
        &self,
        name: &str,
        sealed: &str,
    ) -> Result<T, CodecError>;
}
