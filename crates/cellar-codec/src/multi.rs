//! [`CodecSet`]: an ordered list of codecs for key rotation.
//!
//! Rotation works like this:
//!
//! ```text
//! before:  [K1]          seal with K1, open with K1
//! rotate:  [K2, K1]      seal with K2, open with K2 or K1
//! retire:  [K2]          (once every K1 value has expired)
//! ```
//!
//! Values issued under K1 keep working while K2 takes over, so there is no
//! moment where every logged-in user is thrown out.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Codec, CodecError, KeyPair, SecureCodec};

/// Codecs in priority order. The first one seals; all of them open.
#[derive(Debug, Clone, Default)]
pub struct CodecSet {
    codecs: Vec<SecureCodec>,
}

impl CodecSet {
    /// Wraps already-built codecs, primary first.
    pub fn new(codecs: Vec<SecureCodec>) -> Self {
        Self { codecs }
    }

    /// Builds one codec per key pair, primary first.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidKey`] for the first malformed pair.
    pub fn from_pairs(pairs: &[KeyPair]) -> Result<Self, CodecError> {
        let codecs = pairs
            .iter()
            .map(SecureCodec::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    /// Applies a freshness window to every codec. `0` disables it.
    pub fn max_age(self, seconds: i64) -> Self {
        self.map(|codec| codec.max_age(seconds))
    }

    /// Applies a length limit to every codec. `0` disables it.
    pub fn max_length(self, bytes: usize) -> Self {
        self.map(|codec| codec.max_length(bytes))
    }

    /// The codec used for sealing, if any.
    pub fn primary(&self) -> Option<&SecureCodec> {
        self.codecs.first()
    }

    /// Number of key pairs in the set.
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Returns `true` if the set holds no key pairs.
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    fn map(self, f: impl Fn(SecureCodec) -> SecureCodec) -> Self {
        Self {
            codecs: self.codecs.into_iter().map(f).collect(),
        }
    }
}

impl Codec for CodecSet {
    fn seal<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<String, CodecError> {
        self.primary().ok_or(CodecError::NoCodecs)?.seal(name, value)
    }

    /// Tries each codec in order.
    ///
    /// A codec whose MAC does not match hands over to the next one. Once a
    /// MAC matches, the value is ours, so an expiry or decode failure from
    /// that codec is final.
    fn open<T: DeserializeOwned>(
        &self,
        name: &str,
        sealed: &str,
    ) -> Result<T, CodecError> {
        if self.codecs.is_empty() {
            return Err(CodecError::NoCodecs);
        }

        for (index, codec) in self.codecs.iter().enumerate() {
            match codec.open(name, sealed) {
                Ok(value) => {
                    if index > 0 {
                        tracing::debug!(
                            name,
                            key_index = index,
                            "opened value sealed with a retired key"
                        );
                    }
                    return Ok(value);
                }
                Err(CodecError::Authentication) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(CodecError::Authentication)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(tag: u8) -> KeyPair {
        KeyPair::new(vec![tag; 32], [tag; 32])
    }

    fn set(pairs: &[KeyPair]) -> CodecSet {
        CodecSet::from_pairs(pairs).expect("valid keys")
    }

    #[test]
    fn test_from_pairs_keeps_order_and_count() {
        let codecs = set(&[pair(1), pair(2), pair(3)]);
        assert_eq!(codecs.len(), 3);
        assert!(!codecs.is_empty());
        assert!(codecs.primary().is_some());
    }

    #[test]
    fn test_from_pairs_rejects_bad_pair() {
        let bad = KeyPair::new(vec![1; 32], vec![1; 5]);
        let result = CodecSet::from_pairs(&[pair(1), bad]);
        assert!(matches!(result, Err(CodecError::InvalidKey(_))));
    }

    #[test]
    fn test_empty_set_seal_and_open_return_no_codecs() {
        let codecs = CodecSet::default();

        assert!(matches!(codecs.seal("s", &1), Err(CodecError::NoCodecs)));
        let opened: Result<i32, _> = codecs.open("s", "anything");
        assert!(matches!(opened, Err(CodecError::NoCodecs)));
    }

    #[test]
    fn test_open_retained_key_after_rotation_succeeds() {
        let old = set(&[pair(1)]);
        let sealed = old.seal("session", &"still valid").unwrap();

        let rotated = set(&[pair(2), pair(1)]);
        let opened: String = rotated.open("session", &sealed).expect("K1 kept");

        assert_eq!(opened, "still valid");
    }

    #[test]
    fn test_open_retired_key_returns_authentication() {
        let sealed = set(&[pair(1)]).seal("session", &"old").unwrap();

        let result: Result<String, _> = set(&[pair(2)]).open("session", &sealed);

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_seal_uses_primary_key() {
        let rotated = set(&[pair(2), pair(1)]);
        let sealed = rotated.seal("session", &42).unwrap();

        // Only K2 on its own can open it.
        let k2_only: i32 = set(&[pair(2)]).open("session", &sealed).unwrap();
        let k1_only: Result<i32, _> = set(&[pair(1)]).open("session", &sealed);

        assert_eq!(k2_only, 42);
        assert!(matches!(k1_only, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_open_verified_decode_failure_is_final() {
        let codecs = set(&[pair(1), pair(2)]);
        let sealed = codecs.seal("s", &"text").unwrap();

        let result: Result<Vec<u8>, _> = codecs.open("s", &sealed);

        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_max_length_applies_to_every_codec() {
        let codecs = set(&[pair(1), pair(2)]).max_length(16);
        let result = codecs.seal("s", &"a value longer than sixteen bytes");
        assert!(matches!(result, Err(CodecError::TooLong { .. })));
    }
}
