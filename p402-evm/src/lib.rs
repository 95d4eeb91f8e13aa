#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM bindings for client-side x402 payments.
//!
//! Payments are plain ERC-20 `transfer` calls on a chain's native USDC
//! contract, confirmed by polling `eth_getTransactionReceipt`.
//!
//! # Modules
//!
//! - [`contract`] - ERC-20 `transfer` calldata
//! - [`receipt`] - JSON-RPC receipt source (feature: `provider`)
//! - [`wallet`] - Private-key wallet (feature: `wallet`)
//!
//! Known USDC deployments and their [`ChainProfile`](p402::chain::ChainProfile)s
//! are re-exported at the crate root.
//!
//! # Feature Flags
//!
//! - `provider` - Receipt lookups through an alloy HTTP provider (default)
//! - `wallet` - Local private-key wallet
//! - `telemetry` - Tracing instrumentation

pub mod contract;

#[cfg(feature = "provider")]
pub mod receipt;

#[cfg(feature = "wallet")]
pub mod wallet;

mod networks;
pub use networks::*;

#[cfg(feature = "provider")]
pub use receipt::RpcReceiptSource;

#[cfg(feature = "wallet")]
pub use wallet::{LocalWallet, LocalWalletError};
