#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for client-side x402 pay-per-call.
//!
//! A server that wants payment for a resource answers with HTTP 402 and a
//! JSON body describing a USDC transfer. The client pays on-chain, waits for
//! the transfer to confirm, and repeats the request with the transaction hash
//! as proof. This crate holds the chain-agnostic part of that flow; the EVM
//! bindings live in `p402-evm` and the HTTP negotiation in `p402-http`.
//!
//! # Modules
//!
//! - [`amount`] - Exact decimal amounts and token-unit scaling
//! - [`chain`] - Chain profiles and chain resolution
//! - [`error`] - Failure taxonomy
//! - [`instructions`] - Parsing 402 bodies into payment instructions
//! - [`outcome`] - The result of a paid request and its payment proof
//! - [`phase`] - Progress notifications for UIs
//! - [`settlement`] - Transfer submission and bounded receipt polling
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod chain;
pub mod error;
pub mod instructions;
pub mod outcome;
pub mod phase;
pub mod settlement;
