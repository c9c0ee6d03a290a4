//! Unified error type for Cellar.

use cellar_codec::CodecError;
use cellar_store::{LoadFailure, StoreError};
use cellar_token::TokenError;

/// Top-level error that wraps all crate-specific errors.
///
/// Handlers using the `cellar` crate can return this one type and let `?`
/// convert whatever the layer below produced.
#[derive(Debug, thiserror::Error)]
pub enum CellarError {
    /// Reading or writing the client token failed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Sealing or opening a value failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A session lifecycle operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CellarError {
    /// Returns `true` if the client presented a token or payload we did not
    /// issue or no longer accept.
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Codec(e) => matches!(e, CodecError::Authentication | CodecError::Expired),
            Self::Store(e) => e.is_unauthenticated(),
            Self::Token(_) => false,
        }
    }
}

impl From<LoadFailure> for CellarError {
    fn from(failure: LoadFailure) -> Self {
        Self::Store(failure.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token_error() {
        let err = TokenError::NotFound("sid".into());
        let cellar_err: CellarError = err.into();
        assert!(matches!(cellar_err, CellarError::Token(_)));
        assert!(cellar_err.to_string().contains("sid"));
    }

    #[test]
    fn test_from_codec_error() {
        let err = CodecError::Authentication;
        let cellar_err: CellarError = err.into();
        assert!(matches!(cellar_err, CellarError::Codec(_)));
        assert!(cellar_err.is_unauthenticated());
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::InvalidIdentifier("zz".into());
        let cellar_err: CellarError = err.into();
        assert!(matches!(cellar_err, CellarError::Store(_)));
        assert!(!cellar_err.is_unauthenticated());
    }

    #[test]
    fn test_store_wrapped_codec_error_is_unauthenticated() {
        let err = StoreError::Codec(CodecError::Expired);
        let cellar_err: CellarError = err.into();
        assert!(cellar_err.is_unauthenticated());
    }
}
