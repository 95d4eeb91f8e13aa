//! The receipt seam: how settlement learns whether a transfer landed.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::TxHash;

use crate::chain::ChainProfile;

/// What a chain currently reports for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// No receipt yet.
    Pending,
    /// Receipt with status `0x1`.
    Success,
    /// Receipt with status `0x0`.
    Reverted,
}

impl ReceiptStatus {
    /// Interprets the hex `status` field of a JSON-RPC receipt.
    ///
    /// Returns `None` for anything other than a `0`/`1` quantity.
    #[must_use]
    pub fn from_status_field(status: &str) -> Option<Self> {
        let digits = status
            .strip_prefix("0x")
            .or_else(|| status.strip_prefix("0X"))?;
        match u8::from_str_radix(digits, 16).ok()? {
            1 => Some(Self::Success),
            0 => Some(Self::Reverted),
            _ => None,
        }
    }
}

/// A failed receipt lookup. Settlement treats it as a consumed poll.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiptError {
    /// The RPC endpoint could not be reached or answered with an error.
    #[error("receipt request failed: {0}")]
    Transport(String),
    /// The endpoint answered with something that is not a receipt.
    #[error("receipt response could not be decoded: {0}")]
    Decode(String),
}

/// Looks up transaction receipts on a chain.
pub trait ReceiptSource: Send + Sync {
    /// Fetches the current status of `tx_hash` on the profile's chain.
    fn receipt_status(
        &self,
        profile: &ChainProfile,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<ReceiptStatus, ReceiptError>> + Send;
}

impl<T: ReceiptSource> ReceiptSource for &T {
    fn receipt_status(
        &self,
        profile: &ChainProfile,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<ReceiptStatus, ReceiptError>> + Send {
        (**self).receipt_status(profile, tx_hash)
    }
}

impl<T: ReceiptSource> ReceiptSource for Arc<T> {
    fn receipt_status(
        &self,
        profile: &ChainProfile,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<ReceiptStatus, ReceiptError>> + Send {
        (**self).receipt_status(profile, tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_field_is_parsed() {
        assert_eq!(
            ReceiptStatus::from_status_field("0x1"),
            Some(ReceiptStatus::Success)
        );
        assert_eq!(
            ReceiptStatus::from_status_field("0x0"),
            Some(ReceiptStatus::Reverted)
        );
        assert_eq!(
            ReceiptStatus::from_status_field("0x01"),
            Some(ReceiptStatus::Success)
        );
        assert_eq!(ReceiptStatus::from_status_field("0x2"), None);
        assert_eq!(ReceiptStatus::from_status_field("1"), None);
    }
}
