//! Per-store transport attributes and the `max_age` destroy sentinel.

use serde::{Deserialize, Serialize};

use crate::TokenError;

/// Thirty days, in seconds.
pub const DEFAULT_MAX_AGE: i64 = 86_400 * 30;

// ---------------------------------------------------------------------------
// SameSite
// ---------------------------------------------------------------------------

/// The `SameSite` cookie attribute.
///
/// `Unset` leaves the attribute off entirely and lets the browser apply its
/// own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Unset,
    #[default]
    Lax,
    Strict,
    None,
}

impl SameSite {
    pub(crate) fn to_cookie(self) -> Option<cookie::SameSite> {
        match self {
            Self::Unset => Option::None,
            Self::Lax => Some(cookie::SameSite::Lax),
            Self::Strict => Some(cookie::SameSite::Strict),
            Self::None => Some(cookie::SameSite::None),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

/// Token attributes plus the lifetime policy of a session.
///
/// `max_age` is not only a cache TTL:
///
/// - `> 0` → the token expires after that many seconds
/// - `= 0` → the token lives until the browser closes
/// - `< 0` → the session is destroyed the next time it is saved
///
/// The store copies these options into every session it hands out, so a
/// handler can log a user out by setting `max_age` to `-1` on that one
/// session without touching the store's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub partitioned: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            partitioned: false,
        }
    }
}

impl SessionOptions {
    /// Returns `true` if saving with these options deletes the session.
    pub fn is_destroy(&self) -> bool {
        self.max_age < 0
    }

    /// Checks that the options can be rendered into a header.
    ///
    /// A store calls this when it is built and again before each save,
    /// since handlers may edit a session's options. [`CookieToken`] checks
    /// on every write as well.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidOptions`] if the path is not absolute,
    /// the domain is empty, or either contains characters a cookie
    /// attribute cannot carry.
    ///
    /// [`CookieToken`]: crate::CookieToken
    pub fn validate(&self) -> Result<(), TokenError> {
        if !self.path.starts_with('/') {
            return Err(TokenError::InvalidOptions(format!(
                "path must start with '/', got {:?}",
                self.path
            )));
        }
        if !is_attribute_safe(&self.path) {
            return Err(TokenError::InvalidOptions(format!(
                "path contains forbidden characters: {:?}",
                self.path
            )));
        }
        if let Some(domain) = &self.domain {
            if domain.is_empty() || !is_attribute_safe(domain) {
                return Err(TokenError::InvalidOptions(format!(
                    "invalid domain: {domain:?}"
                )));
            }
        }
        if self.same_site == SameSite::None && !self.secure {
            return Err(TokenError::InvalidOptions(
                "SameSite=None requires secure".into(),
            ));
        }
        Ok(())
    }
}

/// Checks that a token name is a valid cookie name (an RFC 6265 token).
pub fn validate_name(name: &str) -> Result<(), TokenError> {
    let valid = !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':'
                        | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'='
                        | b'{' | b'}'
                )
        });
    if valid {
        Ok(())
    } else {
        Err(TokenError::InvalidOptions(format!("invalid token name: {name:?}")))
    }
}

fn is_attribute_safe(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_graphic() && b != b';')
}
