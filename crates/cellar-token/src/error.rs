/// Errors that can occur in the token layer.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The request carries no token under the given name.
    #[error("token {0:?} not found")]
    NotFound(String),

    /// The token could not be rendered into a response header.
    #[error("invalid token header: {0}")]
    InvalidHeader(#[source] http::header::InvalidHeaderValue),

    /// The transport options are unusable (bad path, domain, or name).
    #[error("invalid token options: {0}")]
    InvalidOptions(String),
}
