//! Session identifiers in object-id layout.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Length of the raw identifier in bytes.
pub const SESSION_ID_LEN: usize = 12;

/// A 12-byte session identifier, rendered as 24 lower-case hex characters.
///
/// ```text
/// | 4 bytes       | 5 bytes | 3 bytes |
/// | unix seconds  | random  | counter |
/// ```
///
/// The hex form is the only string form: it is what gets sealed into the
/// client token and what keys the backend document, on save, load and
/// delete alike.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId([u8; SESSION_ID_LEN]);

impl SessionId {
    /// Generates a fresh identifier stamped with the current time.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generates a fresh identifier stamped with `now`.
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; SESSION_ID_LEN];
        // Object ids hold 32-bit seconds; clamp anything outside that range.
        let secs = now.timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&process_random());
        let count = next_count();
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_LEN] {
        &self.0
    }

    /// The creation time embedded in the first four bytes.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let mut secs = [0u8; 4];
        secs.copy_from_slice(&self.0[..4]);
        DateTime::from_timestamp(i64::from(u32::from_be_bytes(secs)), 0)
    }
}

/// Five random bytes drawn once per process, like a driver's machine id.
fn process_random() -> [u8; 5] {
    static RANDOM: OnceLock<[u8; 5]> = OnceLock::new();
    *RANDOM.get_or_init(|| rand::rng().random())
}

/// A 24-bit counter starting at a random offset.
fn next_count() -> u32 {
    static COUNTER: OnceLock<AtomicU32> = OnceLock::new();
    COUNTER
        .get_or_init(|| AtomicU32::new(rand::rng().random()))
        .fetch_add(1, Ordering::Relaxed)
        & 0x00ff_ffff
}

impl FromStr for SessionId {
    type Err = StoreError;

    /// Parses the 24-character hex form. Either case is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; SESSION_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| StoreError::InvalidIdentifier(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for SessionId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({self})")
    }
}
