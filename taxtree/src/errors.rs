use thiserror::Error;

/// Errors related to communication with the taxonomy API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport failure, or the server answered with a non-success status.
    #[error("network error: {0}")]
    Network(String),

    #[error("taxon {0} not found")]
    NotFound(String),

    /// The server answered, but the body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Error::InvalidResponse(value.to_string())
        } else {
            Error::Network(value.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(value: reqwest_middleware::Error) -> Self {
        match value {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => Error::Network(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InvalidResponse(value.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::InvalidAddress(value.to_string())
    }
}
