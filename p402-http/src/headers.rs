//! Encoding and reading the payment proof headers.

use alloy_primitives::TxHash;
use http::{HeaderMap, HeaderName, HeaderValue};
use p402::outcome::PaymentProof;

use crate::constants::{LEGACY_PAYMENT_TX_HEADER, PAYMENT_CHAIN_HEADER, PAYMENT_TX_HASH_HEADER};
use crate::error::HttpError;

/// Which proof headers to attach to the paid retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofHeaderStyle {
    /// Also send `X-Payment-Chain`.
    pub chain: bool,
    /// Also send the legacy `X-Payment-TX`.
    pub legacy: bool,
}

impl Default for ProofHeaderStyle {
    fn default() -> Self {
        Self {
            chain: true,
            legacy: false,
        }
    }
}

/// Builds the headers that prove `proof` to the server.
///
/// `X-Payment-TxHash` is always present.
///
/// # Errors
///
/// Returns [`HttpError::InvalidHeader`] if the chain key is not a valid
/// header value.
pub fn proof_headers(proof: &PaymentProof, style: ProofHeaderStyle) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    let tx_hash = HeaderValue::from_str(&proof.tx_hash.to_string())?;
    if style.legacy {
        headers.insert(header_name(LEGACY_PAYMENT_TX_HEADER)?, tx_hash.clone());
    }
    headers.insert(header_name(PAYMENT_TX_HASH_HEADER)?, tx_hash);
    if style.chain {
        headers.insert(
            header_name(PAYMENT_CHAIN_HEADER)?,
            HeaderValue::from_str(&proof.chain_key)?,
        );
    }
    Ok(headers)
}

fn header_name(name: &str) -> Result<HeaderName, HttpError> {
    Ok(HeaderName::from_bytes(name.as_bytes())?)
}

/// A proof as read back from request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedProof {
    /// Claimed transfer.
    pub tx_hash: TxHash,
    /// Claimed chain key, if sent.
    pub chain_key: Option<String>,
}

/// Reads a payment proof from request headers.
///
/// Accepts `X-Payment-TxHash` and falls back to the legacy `X-Payment-TX`.
/// Returns `None` if neither holds a 32-byte hex hash.
#[must_use]
pub fn read_proof(headers: &HeaderMap) -> Option<ReceivedProof> {
    let tx_hash = [PAYMENT_TX_HASH_HEADER, LEGACY_PAYMENT_TX_HEADER]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .find_map(|value| value.to_str().ok()?.trim().parse::<TxHash>().ok())?;
    let chain_key = headers
        .get(PAYMENT_CHAIN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    Some(ReceivedProof { tx_hash, chain_key })
}
