//! Token transport for Cellar.
//!
//! A session store never talks to HTTP headers directly. It asks a
//! [`TokenProvider`] to read the client's token from a request and to write
//! a new one onto a response. [`CookieToken`] is the production transport;
//! tests swap in fixed-token doubles.
//!
//! The provider only moves opaque strings. Sealing and opening them is the
//! codec layer's job.

mod cookie_token;
mod error;
mod options;

pub use cookie_token::CookieToken;
pub use error::TokenError;
pub use options::{DEFAULT_MAX_AGE, SameSite, SessionOptions, validate_name};

use http::{Request, Response};

/// Reads and writes named tokens on HTTP messages.
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns the token stored under `name` on the request.
    ///
    /// # Errors
    /// Returns [`TokenError::NotFound`] if the request carries no such token.
    fn get_token<B>(
        &self,
        request: &Request<B>,
        name: &str,
    ) -> Result<String, TokenError>;

    /// Writes `token` under `name` onto the response.
    ///
    /// An empty `token` clears any token the client holds under `name`.
    /// Options that fail [`SessionOptions::validate`] are rejected and
    /// nothing is written.
    fn set_token<B>(
        &self,
        response: &mut Response<B>,
        name: &str,
        token: &str,
        options: &SessionOptions,
    ) -> Result<(), TokenError>;
}
