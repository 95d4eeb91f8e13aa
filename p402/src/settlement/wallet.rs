//! The wallet seam: something that can submit a token transfer.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, TxHash, U256};

use crate::amount::Amount;
use crate::chain::ChainId;

/// A fully resolved token transfer, ready for a wallet to sign and send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Chain the transfer must land on.
    pub chain_id: ChainId,
    /// Token contract whose `transfer` is called.
    pub token_contract: Address,
    /// Transfer destination.
    pub recipient: Address,
    /// Human-readable amount, for wallet prompts.
    pub amount: Amount,
    /// Amount in the token's smallest unit.
    pub raw_amount: U256,
    /// What the payment unlocks, for wallet prompts.
    pub description: String,
}

/// Reasons a wallet did not submit a transfer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// The user or the signer declined.
    #[error("transfer rejected: {0}")]
    Rejected(String),
    /// The wallet is bound to another chain and cannot switch.
    #[error("wallet is on chain {actual}, transfer needs chain {expected}")]
    WrongChain {
        /// Chain the transfer targets.
        expected: ChainId,
        /// Chain the wallet is on.
        actual: ChainId,
    },
    /// The wallet could not reach its node.
    #[error("wallet transport error: {0}")]
    Transport(String),
}

/// A caller-owned wallet handle.
///
/// `submit_transfer` may suspend for as long as the wallet needs, e.g.
/// while a user approves the transfer. The core imposes no timeout on it.
/// Concurrent submissions through one handle are not serialized by the core.
pub trait Wallet: Send + Sync {
    /// Chain the wallet is currently connected to, if it knows.
    fn chain_id(&self) -> Option<ChainId> {
        None
    }

    /// Signs and broadcasts the transfer, returning its transaction hash.
    fn submit_transfer(
        &self,
        transfer: &TransferRequest,
    ) -> impl Future<Output = Result<TxHash, WalletError>> + Send;
}

impl<T: Wallet> Wallet for &T {
    fn chain_id(&self) -> Option<ChainId> {
        (**self).chain_id()
    }

    fn submit_transfer(
        &self,
        transfer: &TransferRequest,
    ) -> impl Future<Output = Result<TxHash, WalletError>> + Send {
        (**self).submit_transfer(transfer)
    }
}

impl<T: Wallet> Wallet for Arc<T> {
    fn chain_id(&self) -> Option<ChainId> {
        (**self).chain_id()
    }

    fn submit_transfer(
        &self,
        transfer: &TransferRequest,
    ) -> impl Future<Output = Result<TxHash, WalletError>> + Send {
        (**self).submit_transfer(transfer)
    }
}
