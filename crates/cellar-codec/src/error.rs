//! Error types for the codec layer.

/// Errors that can occur while sealing or opening a value.
///
/// The split matters to callers: [`Authentication`](Self::Authentication)
/// means "this did not come from us" and should be treated as an
/// unauthenticated client, while [`Decode`](Self::Decode) means the value
/// is genuine but no longer matches the expected shape.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serializing the value failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The sealed value verified but could not be deserialized.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// No configured key verifies the sealed value. Covers tampering,
    /// a value sealed under another name, and keys rotated out.
    #[error("sealed value failed authentication")]
    Authentication,

    /// The value verified but its embedded timestamp is older than the
    /// codec's max age.
    #[error("sealed value expired")]
    Expired,

    /// The sealed value exceeds the configured length limit.
    #[error("sealed value is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    /// Encrypting the body failed.
    #[error("encryption failed")]
    Encryption,

    /// A key has the wrong shape (empty hash key, block key not 32 bytes).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The codec set holds no key pairs.
    #[error("no codecs configured")]
    NoCodecs,
}
