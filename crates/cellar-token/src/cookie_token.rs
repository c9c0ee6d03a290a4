//! Cookie-backed [`TokenProvider`].

use cookie::Cookie;
use cookie::time::{Duration, OffsetDateTime};
use http::header::{COOKIE, HeaderValue, SET_COOKIE};
use http::{Request, Response};

use crate::{SessionOptions, TokenError, TokenProvider, validate_name};

/// Carries the token in a cookie named after the session.
///
/// Reads the first matching pair from the request's `Cookie` headers and
/// appends one `Set-Cookie` header per write.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieToken;

impl TokenProvider for CookieToken {
    fn get_token<B>(
        &self,
        request: &Request<B>,
        name: &str,
    ) -> Result<String, TokenError> {
        request
            .headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| TokenError::NotFound(name.to_string()))
    }

    fn set_token<B>(
        &self,
        response: &mut Response<B>,
        name: &str,
        token: &str,
        options: &SessionOptions,
    ) -> Result<(), TokenError> {
        validate_name(name)?;
        options.validate()?;
        let cookie = build_cookie(name, token, options);
        let header = HeaderValue::from_str(&cookie.to_string())
            .map_err(TokenError::InvalidHeader)?;
        response.headers_mut().append(SET_COOKIE, header);

        tracing::debug!(
            name,
            cleared = token.is_empty(),
            "token cookie written"
        );
        Ok(())
    }
}

/// Renders the cookie for `token`. An empty token, or a destroy sentinel
/// in `max_age`, produces a removal cookie.
fn build_cookie(
    name: &str,
    token: &str,
    options: &SessionOptions,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name.to_string(), token.to_string()))
        .path(options.path.clone())
        .secure(options.secure)
        .http_only(options.http_only)
        .partitioned(options.partitioned);

    if let Some(domain) = &options.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(same_site) = options.same_site.to_cookie() {
        builder = builder.same_site(same_site);
    }

    if token.is_empty() || options.max_age < 0 {
        let mut cookie = builder.build();
        cookie.make_removal();
        return cookie;
    }

    if options.max_age > 0 {
        let max_age = Duration::seconds(options.max_age);
        builder = builder.max_age(max_age);
        // Past the last representable date, Max-Age alone carries the lifetime.
        if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
            builder = builder.expires(expires);
        }
    }

    builder.build()
}
