//! [`SecureCodec`]: HMAC-SHA256 authentication with optional AES-256-GCM
//! encryption, built from one [`KeyPair`].
//!
//! # Wire format
//!
//! ```text
//! body   = base64url(json(value))                       (signing only)
//!        | base64url(nonce || aes_gcm(json(value)))     (with block key)
//! mac    = hmac_sha256(hash_key, name "|" ts "|" body)
//! sealed = base64url(ts "|" body "|" mac)
//! ```
//!
//! `ts` is the unix time of sealing, in seconds. The name is covered by
//! the MAC but not stored, so the reader must supply the same name.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::{Codec, CodecError};

type HmacSha256 = Hmac<Sha256>;

/// Length of an AES-256 key in bytes.
pub const BLOCK_KEY_LEN: usize = 32;

/// Default freshness window for sealed values: thirty days.
pub const DEFAULT_MAX_AGE: i64 = 86_400 * 30;

/// Default limit on a sealed value's length. Browsers drop cookies larger
/// than about 4 KiB.
pub const DEFAULT_MAX_LENGTH: usize = 4096;

const NONCE_LEN: usize = 12;

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A hash key and an optional block key.
///
/// The hash key authenticates; any non-empty length works, 32 or 64 random
/// bytes are typical. The block key, when present, encrypts the body and
/// must be exactly [`BLOCK_KEY_LEN`] bytes.
#[derive(Clone)]
pub struct KeyPair {
    pub hash_key: Vec<u8>,
    pub block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// A pair that authenticates and encrypts.
    pub fn new(hash_key: impl Into<Vec<u8>>, block_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: Some(block_key.into()),
        }
    }

    /// A pair that only authenticates. The body stays readable.
    pub fn signing_only(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"<redacted>")
            .field("encrypted", &self.block_key.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SecureCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by a single key pair.
#[derive(Clone)]
pub struct SecureCodec {
    mac: HmacSha256,
    cipher: Option<Arc<Aes256Gcm>>,
    max_age: i64,
    max_length: usize,
}

impl SecureCodec {
    /// Builds a codec from a key pair.
    ///
    /// # Errors
    /// Returns [`CodecError::InvalidKey`] if the hash key is empty or the
    /// block key is not [`BLOCK_KEY_LEN`] bytes.
    pub fn new(pair: &KeyPair) -> Result<Self, CodecError> {
        if pair.hash_key.is_empty() {
            return Err(CodecError::InvalidKey("hash key is empty".into()));
        }
        let mac = <HmacSha256 as Mac>::new_from_slice(&pair.hash_key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;

        let cipher = match &pair.block_key {
            Some(key) if key.len() != BLOCK_KEY_LEN => {
                return Err(CodecError::InvalidKey(format!(
                    "block key must be {BLOCK_KEY_LEN} bytes, got {}",
                    key.len()
                )));
            }
            Some(key) => Some(Arc::new(
                Aes256Gcm::new_from_slice(key)
                    .map_err(|e| CodecError::InvalidKey(e.to_string()))?,
            )),
            None => None,
        };

        Ok(Self {
            mac,
            cipher,
            max_age: DEFAULT_MAX_AGE,
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Sets how many seconds a sealed value stays valid. `0` disables the
    /// check, and so does any negative value.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds.max(0);
        self
    }

    /// Sets the maximum sealed length in bytes. `0` disables the check.
    pub fn max_length(mut self, bytes: usize) -> Self {
        self.max_length = bytes;
        self
    }

    /// Returns `true` if this codec encrypts bodies.
    pub fn is_encrypting(&self) -> bool {
        self.cipher.is_some()
    }

    /// Seals `value` as if the current time were `now` (unix seconds).
    pub fn seal_at<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        now: i64,
    ) -> Result<String, CodecError> {
        let body = serde_json::to_vec(value).map_err(CodecError::Encode)?;
        let body = match &self.cipher {
            Some(cipher) => encrypt(cipher, &body)?,
            None => body,
        };
        let body = URL_SAFE_NO_PAD.encode(body);
        let ts = now.to_string();
        let tag = self.tag(name, ts.as_bytes(), body.as_bytes());

        let mut raw = Vec::with_capacity(ts.len() + body.len() + tag.len() + 2);
        raw.extend_from_slice(ts.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(body.as_bytes());
        raw.push(b'|');
        raw.extend_from_slice(&tag);

        let sealed = URL_SAFE_NO_PAD.encode(raw);
        self.check_length(sealed.len())?;
        Ok(sealed)
    }

    /// Opens `sealed` as if the current time were `now` (unix seconds).
    pub fn open_at<T: DeserializeOwned>(
        &self,
        name: &str,
        sealed: &str,
        now: i64,
    ) -> Result<T, CodecError> {
        self.check_length(sealed.len())?;
        let raw = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|_| CodecError::Authentication)?;

        // The tag is raw bytes and may itself contain '|', so stop after
        // the second separator.
        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(ts), Some(body), Some(tag)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Authentication);
        };

        self.keyed_mac(name, ts, body)
            .verify_slice(tag)
            .map_err(|_| CodecError::Authentication)?;

        let ts: i64 = std::str::from_utf8(ts)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CodecError::Authentication)?;
        if self.max_age != 0 && ts < now.saturating_sub(self.max_age) {
            return Err(CodecError::Expired);
        }

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| CodecError::Authentication)?;
        let body = match &self.cipher {
            Some(cipher) => decrypt(cipher, &body)?,
            None => body,
        };
        serde_json::from_slice(&body).map_err(CodecError::Decode)
    }

    fn tag(&self, name: &str, ts: &[u8], body: &[u8]) -> Vec<u8> {
        self.keyed_mac(name, ts, body).finalize().into_bytes().to_vec()
    }

    fn keyed_mac(&self, name: &str, ts: &[u8], body: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(ts);
        mac.update(b"|");
        mac.update(body);
        mac
    }

    fn check_length(&self, len: usize) -> Result<(), CodecError> {
        if self.max_length != 0 && len > self.max_length {
            return Err(CodecError::TooLong {
                len,
                max: self.max_length,
            });
        }
        Ok(())
    }
}

impl Codec for SecureCodec {
    fn seal<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<String, CodecError> {
        self.seal_at(name, value, chrono::Utc::now().timestamp())
    }

    fn open<T: DeserializeOwned>(
        &self,
        name: &str,
        sealed: &str,
    ) -> Result<T, CodecError> {
        self.open_at(name, sealed, chrono::Utc::now().timestamp())
    }
}

impl fmt::Debug for SecureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCodec")
            .field("encrypted", &self.is_encrypting())
            .field("max_age", &self.max_age)
            .field("max_length", &self.max_length)
            .finish()
    }
}

/// Output layout: `nonce (12 bytes) || ciphertext`.
fn encrypt(cipher: &Aes256Gcm, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CodecError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn decrypt(cipher: &Aes256Gcm, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < NONCE_LEN {
        return Err(CodecError::Authentication);
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CodecError::Authentication)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signing_codec() -> SecureCodec {
        SecureCodec::new(&KeyPair::signing_only(b"hash-key-one".to_vec()))
            .expect("valid key")
    }

    fn encrypting_codec() -> SecureCodec {
        SecureCodec::new(&KeyPair::new(b"hash-key-one".to_vec(), [7u8; 32]))
            .expect("valid key")
    }

    fn sample_values() -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("user".to_string(), serde_json::json!("ada")),
            ("visits".to_string(), serde_json::json!(3)),
        ])
    }

    /// Flips one byte inside the decoded form and re-encodes it.
    fn tamper(sealed: &str, index: usize) -> String {
        let mut raw = URL_SAFE_NO_PAD.decode(sealed).expect("valid base64");
        raw[index] ^= 0x01;
        URL_SAFE_NO_PAD.encode(raw)
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_empty_hash_key_returns_invalid_key() {
        let result = SecureCodec::new(&KeyPair::signing_only(Vec::new()));
        assert!(matches!(result, Err(CodecError::InvalidKey(_))));
    }

    #[test]
    fn test_new_short_block_key_returns_invalid_key() {
        let result = SecureCodec::new(&KeyPair::new(b"hash".to_vec(), [1u8; 16]));
        assert!(matches!(result, Err(CodecError::InvalidKey(_))));
    }

    #[test]
    fn test_key_pair_debug_hides_keys() {
        let pair = KeyPair::new(b"super-secret".to_vec(), [9u8; 32]);
        let printed = format!("{pair:?}");
        assert!(!printed.contains("super"));
        assert!(printed.contains("redacted"));
    }

    // =====================================================================
    // seal_at() / open_at()
    // =====================================================================

    #[test]
    fn test_open_signed_value_returns_original() {
        let codec = signing_codec();
        let sealed = codec.seal_at("session", &sample_values(), NOW).unwrap();

        let opened: HashMap<String, serde_json::Value> =
            codec.open_at("session", &sealed, NOW).expect("should open");

        assert_eq!(opened, sample_values());
    }

    #[test]
    fn test_open_encrypted_value_returns_original() {
        let codec = encrypting_codec();
        let sealed = codec.seal_at("session", &sample_values(), NOW).unwrap();

        let opened: HashMap<String, serde_json::Value> =
            codec.open_at("session", &sealed, NOW).expect("should open");

        assert_eq!(opened, sample_values());
    }

    #[test]
    fn test_seal_encrypted_hides_plaintext() {
        let codec = encrypting_codec();
        let sealed = codec.seal_at("session", &"visible-marker", NOW).unwrap();

        let raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let body = raw.split(|b| *b == b'|').nth(1).unwrap();
        let body = URL_SAFE_NO_PAD.decode(body).unwrap();

        assert!(!String::from_utf8_lossy(&body).contains("visible-marker"));
    }

    #[test]
    fn test_seal_same_value_twice_differs_when_encrypting() {
        // Fresh nonce per seal.
        let codec = encrypting_codec();
        let a = codec.seal_at("s", &"x", NOW).unwrap();
        let b = codec.seal_at("s", &"x", NOW).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_tampered_body_returns_authentication() {
        let codec = signing_codec();
        let sealed = codec.seal_at("session", &"hello", NOW).unwrap();
        // Index 12 lands inside the body: "1700000000|" is 11 bytes.
        let tampered = tamper(&sealed, 12);

        let result: Result<String, _> = codec.open_at("session", &tampered, NOW);

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_open_tampered_timestamp_returns_authentication() {
        let codec = signing_codec();
        let sealed = codec.seal_at("session", &"hello", NOW).unwrap();
        let tampered = tamper(&sealed, 0);

        let result: Result<String, _> = codec.open_at("session", &tampered, NOW);

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_open_under_other_name_returns_authentication() {
        let codec = signing_codec();
        let sealed = codec.seal_at("session", &"hello", NOW).unwrap();

        let result: Result<String, _> = codec.open_at("admin", &sealed, NOW);

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_open_with_other_hash_key_returns_authentication() {
        let sealed = signing_codec().seal_at("s", &"hello", NOW).unwrap();
        let other =
            SecureCodec::new(&KeyPair::signing_only(b"hash-key-two".to_vec()))
                .unwrap();

        let result: Result<String, _> = other.open_at("s", &sealed, NOW);

        assert!(matches!(result, Err(CodecError::Authentication)));
    }

    #[test]
    fn test_open_garbage_returns_authentication() {
        let codec = signing_codec();

        for input in ["", "not base64 at all!", "bm8tc2VwYXJhdG9ycw"] {
            let result: Result<String, _> = codec.open_at("s", input, NOW);
            assert!(
                matches!(result, Err(CodecError::Authentication)),
                "input {input:?} should fail authentication"
            );
        }
    }

    #[test]
    fn test_open_wrong_shape_returns_decode() {
        let codec = signing_codec();
        let sealed = codec.seal_at("s", &"a string", NOW).unwrap();

        let result: Result<u64, _> = codec.open_at("s", &sealed, NOW);

        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_open_after_max_age_returns_expired() {
        let codec = signing_codec().max_age(60);
        let sealed = codec.seal_at("s", &1u8, NOW).unwrap();

        let fresh: Result<u8, _> = codec.open_at("s", &sealed, NOW + 60);
        let stale: Result<u8, _> = codec.open_at("s", &sealed, NOW + 61);

        assert_eq!(fresh.unwrap(), 1);
        assert!(matches!(stale, Err(CodecError::Expired)));
    }

    #[test]
    fn test_open_zero_max_age_never_expires() {
        let codec = signing_codec().max_age(0);
        let sealed = codec.seal_at("s", &1u8, 0).unwrap();

        let opened: u8 = codec.open_at("s", &sealed, NOW).expect("no expiry");

        assert_eq!(opened, 1);
    }

    #[test]
    fn test_open_negative_max_age_never_expires() {
        let codec = signing_codec().max_age(i64::MIN);
        let sealed = codec.seal_at("s", &1u8, 0).unwrap();

        let opened: u8 = codec.open_at("s", &sealed, i64::MAX).expect("no expiry");

        assert_eq!(opened, 1);
    }

    #[test]
    fn test_open_huge_max_age_does_not_overflow() {
        let codec = signing_codec().max_age(i64::MAX);
        let sealed = codec.seal_at("s", &1u8, NOW).unwrap();

        let opened: u8 = codec.open_at("s", &sealed, -NOW).expect("fresh");

        assert_eq!(opened, 1);
    }

    #[test]
    fn test_seal_over_max_length_returns_too_long() {
        let codec = signing_codec().max_length(64);
        let big = "x".repeat(200);

        let result = codec.seal_at("s", &big, NOW);

        assert!(matches!(result, Err(CodecError::TooLong { max: 64, .. })));
    }

    #[test]
    fn test_seal_zero_max_length_allows_large_values() {
        let codec = signing_codec().max_length(0);
        let big = "x".repeat(10_000);

        let sealed = codec.seal_at("s", &big, NOW).expect("no limit");
        let opened: String = codec.open_at("s", &sealed, NOW).unwrap();

        assert_eq!(opened, big);
    }
}
