//! Result of a paid request.

use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainId, ChainProfile};
use crate::error::{ErrorKind, Failure};
use crate::instructions::PaymentInstructions;

/// Outcome of `fetch_with_payment`.
///
/// `PaymentRequired` is not an error: it means the server asked for payment
/// and the client chose not to settle (auto-pay disabled or over the cap).
#[derive(Debug, Clone)]
#[must_use]
pub enum ProtocolResult<T> {
    /// The final response, after payment if one was needed.
    Ok(T),
    /// The server wants payment and none was made.
    PaymentRequired(PaymentInstructions),
    /// The call failed.
    Failed(Failure),
}

impl<T> ProtocolResult<T> {
    /// Returns `true` for [`ProtocolResult::Ok`].
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Failure category, if the call failed.
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failed(failure) => Some(failure.kind),
            Self::Ok(_) | Self::PaymentRequired(_) => None,
        }
    }

    /// Maps the successful value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProtocolResult<U> {
        match self {
            Self::Ok(value) => ProtocolResult::Ok(f(value)),
            Self::PaymentRequired(instructions) => ProtocolResult::PaymentRequired(instructions),
            Self::Failed(failure) => ProtocolResult::Failed(failure),
        }
    }

    /// Returns the successful value, dropping the other outcomes.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::PaymentRequired(_) | Self::Failed(_) => None,
        }
    }
}

impl<T> From<Failure> for ProtocolResult<T> {
    fn from(failure: Failure) -> Self {
        Self::Failed(failure)
    }
}

/// Evidence of a confirmed payment, as presented on the retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    /// Confirmed transfer.
    pub tx_hash: TxHash,
    /// Chain it was confirmed on.
    pub chain_id: ChainId,
    /// Wire key of that chain.
    pub chain_key: String,
}

impl PaymentProof {
    /// Proof for a transfer confirmed on `profile`'s chain.
    #[must_use]
    pub fn new(tx_hash: TxHash, profile: &ChainProfile) -> Self {
        Self {
            tx_hash,
            chain_id: profile.chain_id,
            chain_key: profile.key.clone(),
        }
    }
}
