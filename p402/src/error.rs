//! Failure taxonomy for a paid request.
//!
//! Every way a `fetch_with_payment` call can fail is reported as a
//! [`Failure`] tagged with an [`ErrorKind`]. Callers map the kind to a
//! message and decide whether to offer a manual re-attempt
//! ([`ErrorKind::is_recoverable`]).

use std::fmt;

use alloy_primitives::TxHash;
use serde::{Deserialize, Serialize};

use crate::chain::ChainResolveError;
use crate::instructions::InstructionsError;
use crate::settlement::SettlementError;

/// Machine-readable category of a failed paid request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The 402 body is missing fields or breaks the instruction invariants.
    MalformedPaymentDetails,
    /// No chain profile exists for the requested chain.
    UnsupportedChain,
    /// The amount cannot be represented in the token's decimals.
    InvalidAmount,
    /// The wallet (or its user) declined the transfer.
    SubmissionRejected,
    /// The transfer was not confirmed within the polling bound.
    ConfirmationTimeout,
    /// The transfer was mined but reverted.
    TransferReverted,
    /// The server refused the request carrying the payment proof.
    RetryRejected,
    /// An HTTP request failed at the transport level.
    NetworkError,
    /// The request could not be built (bad URL or header value).
    InvalidRequest,
    /// The caller aborted the operation.
    Cancelled,
}

impl ErrorKind {
    /// Snake-case code, stable for logs and UIs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPaymentDetails => "malformed_payment_details",
            Self::UnsupportedChain => "unsupported_chain",
            Self::InvalidAmount => "invalid_amount",
            Self::SubmissionRejected => "submission_rejected",
            Self::ConfirmationTimeout => "confirmation_timeout",
            Self::TransferReverted => "transfer_reverted",
            Self::RetryRejected => "retry_rejected",
            Self::NetworkError => "network_error",
            Self::InvalidRequest => "invalid_request",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether offering the user a manual re-attempt makes sense.
    ///
    /// Re-attempting after a timeout starts a new settlement; the earlier
    /// transfer may still land.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::ConfirmationTimeout | Self::NetworkError | Self::Cancelled
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed failure with a human-readable detail.
///
/// `tx_hash` is set when a transfer was already submitted, so the caller can
/// show or reconcile it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct Failure {
    /// Failure category.
    pub kind: ErrorKind,
    /// Cause, suitable for logs.
    pub detail: String,
    /// Submitted transfer, if any.
    pub tx_hash: Option<TxHash>,
}

impl Failure {
    /// Creates a failure with no associated transfer.
    #[must_use]
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            tx_hash: None,
        }
    }

    /// Attaches the submitted transfer hash.
    #[must_use]
    pub fn with_tx_hash(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

impl From<InstructionsError> for Failure {
    fn from(err: InstructionsError) -> Self {
        Self::new(ErrorKind::MalformedPaymentDetails, err.to_string())
    }
}

impl From<ChainResolveError> for Failure {
    fn from(err: ChainResolveError) -> Self {
        let kind = match err {
            ChainResolveError::Unspecified | ChainResolveError::Conflict { .. } => {
                ErrorKind::MalformedPaymentDetails
            }
            ChainResolveError::UnsupportedChainId(_) | ChainResolveError::UnsupportedNetwork(_) => {
                ErrorKind::UnsupportedChain
            }
        };
        Self::new(kind, err.to_string())
    }
}

impl From<SettlementError> for Failure {
    fn from(err: SettlementError) -> Self {
        let failure = Self::new(err.kind(), err.to_string());
        match err.tx_hash() {
            Some(tx_hash) => failure.with_tx_hash(tx_hash),
            None => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::AmountError;
    use crate::settlement::WalletError;

    #[test]
    fn only_timeouts_network_errors_and_cancellation_are_recoverable() {
        assert!(ErrorKind::ConfirmationTimeout.is_recoverable());
        assert!(ErrorKind::NetworkError.is_recoverable());
        assert!(ErrorKind::Cancelled.is_recoverable());
        assert!(!ErrorKind::TransferReverted.is_recoverable());
        assert!(!ErrorKind::SubmissionRejected.is_recoverable());
        assert!(!ErrorKind::MalformedPaymentDetails.is_recoverable());
    }

    #[test]
    fn settlement_errors_keep_their_kind_and_hash() {
        let hash = TxHash::repeat_byte(7);
        let failure = Failure::from(SettlementError::ConfirmationTimeout {
            tx_hash: hash,
            polls: 30,
        });
        assert_eq!(failure.kind, ErrorKind::ConfirmationTimeout);
        assert_eq!(failure.tx_hash, Some(hash));

        let failure = Failure::from(SettlementError::SubmissionRejected(WalletError::Rejected(
            "user closed the dialog".into(),
        )));
        assert_eq!(failure.kind, ErrorKind::SubmissionRejected);
        assert_eq!(failure.tx_hash, None);

        let failure = Failure::from(SettlementError::InvalidAmount(AmountError::Overflow));
        assert_eq!(failure.kind, ErrorKind::InvalidAmount);
    }

    #[test]
    fn chain_resolution_maps_to_malformed_or_unsupported() {
        assert_eq!(
            Failure::from(ChainResolveError::Unspecified).kind,
            ErrorKind::MalformedPaymentDetails
        );
        assert_eq!(
            Failure::from(ChainResolveError::UnsupportedChainId(1)).kind,
            ErrorKind::UnsupportedChain
        );
    }

    #[test]
    fn display_leads_with_the_code() {
        let failure = Failure::new(ErrorKind::RetryRejected, "403 Forbidden");
        assert_eq!(failure.to_string(), "retry_rejected: 403 Forbidden");
    }
}
