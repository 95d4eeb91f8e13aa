//! The wallet the command line pays with.

use std::sync::Arc;

use alloy_primitives::TxHash;
use alloy_signer_local::PrivateKeySigner;
use p402::chain::{ChainId, ChainProfiles};
use p402::settlement::{TransferRequest, Wallet, WalletError};
use p402_evm::LocalWallet;

/// Pays from a local key on whichever chain the server asks for, or refuses
/// every transfer when no key is configured.
#[derive(Debug)]
pub enum CliWallet {
    /// A configured private key.
    Signer {
        /// Paying account.
        signer: PrivateKeySigner,
        /// Where each chain's RPC lives.
        chains: Arc<ChainProfiles>,
        /// Chain reported as current, for the fallback policy.
        default_chain: Option<ChainId>,
    },
    /// No key configured.
    Unconfigured {
        /// Chain reported as current, for the fallback policy.
        default_chain: Option<ChainId>,
    },
}

impl Wallet for CliWallet {
    fn chain_id(&self) -> Option<ChainId> {
        match self {
            Self::Signer { default_chain, .. } | Self::Unconfigured { default_chain } => {
                *default_chain
            }
        }
    }

    async fn submit_transfer(&self, transfer: &TransferRequest) -> Result<TxHash, WalletError> {
        match self {
            Self::Signer { signer, chains, .. } => {
                let profile = chains.by_chain_id(transfer.chain_id).ok_or_else(|| {
                    WalletError::Rejected(format!("no RPC endpoint for chain {}", transfer.chain_id))
                })?;
                LocalWallet::from_signer(signer.clone(), profile.chain_id, profile.rpc_url.clone())
                    .submit_transfer(transfer)
                    .await
            }
            Self::Unconfigured { .. } => Err(WalletError::Rejected(
                "no wallet configured; set wallet_private_key or P402_PRIVATE_KEY".to_owned(),
            )),
        }
    }
}
