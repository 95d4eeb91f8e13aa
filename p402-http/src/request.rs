//! What the caller sends and what comes back.

use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use p402::outcome::PaymentProof;
use serde::de::DeserializeOwned;

/// How to issue the request, reused verbatim for the paid retry.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method. `GET` when unset.
    pub method: Option<Method>,
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout, on top of the client's own.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// A `GET` with no extras.
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    /// A `POST` carrying `body`.
    #[must_use]
    pub fn post(body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Some(Method::POST),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn method(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }
}

/// The final response of a paid request.
#[derive(Debug, Clone)]
pub struct PaidResponse {
    /// Status of the final response.
    pub status: StatusCode,
    /// Headers of the final response.
    pub headers: HeaderMap,
    /// Body of the final response.
    pub body: Vec<u8>,
    /// The payment made to obtain it, if any.
    pub payment: Option<PaymentProof>,
}

impl PaidResponse {
    /// Whether obtaining this response cost a payment.
    #[must_use]
    pub const fn was_paid(&self) -> bool {
        self.payment.is_some()
    }

    /// Body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
