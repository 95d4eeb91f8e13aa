//! Error types for the HTTP side of a paid request.

use p402::error::{ErrorKind, Failure};
use reqwest_middleware as rqm;

/// Errors building or sending a request.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The URL is not an absolute `http` or `https` URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// The URL as given.
        url: String,
        /// Why it was refused.
        reason: String,
    },

    /// A header name could not be encoded.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// A header value could not be encoded.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The request failed in the client or on the wire.
    #[error("request failed: {0}")]
    Transport(#[from] rqm::Error),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(#[from] reqwest::Error),
}

impl HttpError {
    /// Failure category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidHeaderName(_) | Self::InvalidHeader(_) => {
                ErrorKind::InvalidRequest
            }
            Self::Transport(rqm::Error::Reqwest(err)) | Self::Body(err) if err.is_builder() => {
                ErrorKind::InvalidRequest
            }
            Self::Transport(_) | Self::Body(_) => ErrorKind::NetworkError,
        }
    }
}

impl From<HttpError> for Failure {
    fn from(err: HttpError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
