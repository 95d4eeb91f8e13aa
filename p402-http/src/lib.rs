#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP negotiation for client-side x402 payments.
//!
//! [`PaymentNegotiator`] wraps a `reqwest` client. When a resource answers
//! `402 Payment Required`, it parses the payment details, settles the USDC
//! transfer, and repeats the request once with `X-Payment-TxHash`.
//! [`PaymentMiddleware`] does the same inside a
//! [`reqwest_middleware::ClientWithMiddleware`].
//!
//! # Modules
//!
//! - [`constants`] - Proof header names
//! - [`error`] - Request and transport errors
//! - [`headers`] - Proof header encoding and decoding
//! - [`middleware`] - `reqwest-middleware` integration
//! - [`negotiator`] - The 402 handshake
//! - [`request`] - Request options and the final response
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod constants;
pub mod error;
pub mod headers;
pub mod middleware;
pub mod negotiator;
pub mod request;

#[cfg(test)]
mod test_support;

pub use middleware::PaymentMiddleware;
pub use negotiator::{Negotiation, NegotiatorOptions, PaymentNegotiator};
pub use request::{PaidResponse, RequestOptions};
