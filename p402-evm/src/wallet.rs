//! A private-key wallet for unattended clients.

use std::fmt;

use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, TxHash};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use alloy_transport::TransportError;
use p402::chain::{ChainId, ChainProfile};
use p402::settlement::{TransferRequest, Wallet, WalletError};
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};
use url::Url;

use crate::contract::transfer_calldata;

/// Errors building a [`LocalWallet`].
#[derive(Debug, thiserror::Error)]
pub enum LocalWalletError {
    /// The private key is not 32 bytes of hex.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(#[from] LocalSignerError),
}

/// A wallet that signs with an in-process private key and broadcasts
/// through one chain's RPC endpoint.
///
/// Bound to a single chain; transfers for any other chain are refused with
/// [`WalletError::WrongChain`]. Nonce, gas and chain id are filled by the
/// provider.
#[derive(Clone)]
pub struct LocalWallet {
    address: Address,
    chain_id: ChainId,
    provider: DynProvider,
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl LocalWallet {
    /// Creates a wallet from a hex private key (with or without `0x`).
    ///
    /// # Errors
    ///
    /// Returns [`LocalWalletError::InvalidPrivateKey`] if the key cannot be parsed.
    pub fn from_private_key(
        private_key: &str,
        chain_id: ChainId,
        rpc_url: Url,
    ) -> Result<Self, LocalWalletError> {
        let signer: PrivateKeySigner = private_key.trim().parse()?;
        Ok(Self::from_signer(signer, chain_id, rpc_url))
    }

    /// Creates a wallet for `profile`'s chain and RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LocalWalletError::InvalidPrivateKey`] if the key cannot be parsed.
    pub fn for_profile(
        private_key: &str,
        profile: &ChainProfile,
    ) -> Result<Self, LocalWalletError> {
        Self::from_private_key(private_key, profile.chain_id, profile.rpc_url.clone())
    }

    /// Creates a wallet from an existing signer.
    #[must_use]
    pub fn from_signer(signer: PrivateKeySigner, chain_id: ChainId, rpc_url: Url) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        Self {
            address,
            chain_id,
            provider,
        }
    }

    /// Address that pays.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }
}

impl Wallet for LocalWallet {
    fn chain_id(&self) -> Option<ChainId> {
        Some(self.chain_id)
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "p402.evm.submit_transfer",
            skip_all,
            fields(from = %self.address, to = %transfer.recipient, raw_amount = %transfer.raw_amount),
            err
        )
    )]
    async fn submit_transfer(&self, transfer: &TransferRequest) -> Result<TxHash, WalletError> {
        if transfer.chain_id != self.chain_id {
            return Err(WalletError::WrongChain {
                expected: transfer.chain_id,
                actual: self.chain_id,
            });
        }

        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(transfer.token_contract)
            .with_input(transfer_calldata(transfer.recipient, transfer.raw_amount));

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(submission_error)?;
        let tx_hash = *pending.tx_hash();

        #[cfg(feature = "telemetry")]
        debug!(%tx_hash, "Transfer broadcast");

        Ok(tx_hash)
    }
}

/// Node-side refusals (insufficient funds, gas estimation reverts) are
/// rejections; everything else is transport.
fn submission_error(err: TransportError) -> WalletError {
    match err {
        TransportError::ErrorResp(payload) => WalletError::Rejected(payload.message.into_owned()),
        other => WalletError::Transport(other.to_string()),
    }
}
