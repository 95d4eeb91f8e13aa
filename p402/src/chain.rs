//! Chain profiles: where and how USDC is settled on each supported chain.
//!
//! - [`ChainProfile`] - Static settlement data for one chain (token contract, RPC, explorer)
//! - [`ChainProfiles`] - Read-only table of profiles, built once at startup
//! - [`ChainPolicy`] - How a payment's chain is chosen when the server is vague
//!
//! Concrete profile data lives in chain-specific crates (`p402-evm`
//! provides the known USDC deployments). Applications assemble a
//! [`ChainProfiles`] table from it, apply configuration overrides, and then
//! share it behind an `Arc` for the lifetime of the process.

use std::collections::HashMap;

use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::instructions::PaymentInstructions;

/// An EIP-155 chain ID (e.g., 8453 for Base).
pub type ChainId = u64;

/// Placeholder replaced by the transaction hash in explorer URL templates.
pub const EXPLORER_TX_PLACEHOLDER: &str = "{tx}";

/// Static settlement data for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProfile {
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// Short key used on the wire, e.g. `"base"`.
    pub key: String,
    /// Display label, e.g. `"Base"`.
    pub label: String,
    /// USDC contract address on this chain.
    pub token_contract: Address,
    /// JSON-RPC endpoint used for receipt polling.
    pub rpc_url: Url,
    /// Explorer link template containing [`EXPLORER_TX_PLACEHOLDER`].
    pub explorer_url_template: String,
    /// Token decimals, 6 for USDC.
    pub decimals: u8,
}

impl ChainProfile {
    /// Link to the transaction on this chain's block explorer.
    #[must_use]
    pub fn explorer_tx_url(&self, tx_hash: &TxHash) -> String {
        self.explorer_url_template
            .replace(EXPLORER_TX_PLACEHOLDER, &tx_hash.to_string())
    }
}

/// How the settlement chain is picked for a set of instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPolicy {
    /// Only the chain the server named (by id, or by key) is acceptable.
    #[default]
    ServerOnly,
    /// When the server names no chain, pay on the wallet's current chain.
    WalletFallback,
}

/// Why no [`ChainProfile`] could be picked for a payment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainResolveError {
    /// The server named no chain and no fallback applied.
    #[error("payment_details names no chainId or known network")]
    Unspecified,
    /// The chain id has no profile.
    #[error("chain {0} is not supported")]
    UnsupportedChainId(ChainId),
    /// The network key has no profile.
    #[error("network {0:?} is not supported")]
    UnsupportedNetwork(String),
    /// `chainId` and `network` point at different chains.
    #[error("chainId {chain_id} contradicts network {network:?} (chain {network_chain_id})")]
    Conflict {
        /// The id the server sent.
        chain_id: ChainId,
        /// The key the server sent.
        network: String,
        /// The chain that key maps to.
        network_chain_id: ChainId,
    },
}

/// Read-only table of [`ChainProfile`]s indexed by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainProfiles(HashMap<ChainId, ChainProfile>);

impl ChainProfiles {
    /// Builds the table from a list of profiles. Later duplicates win.
    #[must_use]
    pub fn from_profiles(profiles: impl IntoIterator<Item = ChainProfile>) -> Self {
        Self(profiles.into_iter().map(|p| (p.chain_id, p)).collect())
    }

    /// Replaces the RPC endpoint of one chain while the table is being
    /// assembled. Returns `self` unchanged if the chain is unknown.
    #[must_use]
    pub fn with_rpc_url(mut self, chain_id: ChainId, rpc_url: Url) -> Self {
        if let Some(profile) = self.0.get_mut(&chain_id) {
            profile.rpc_url = rpc_url;
        }
        self
    }

    /// Adds or replaces a profile while the table is being assembled.
    #[must_use]
    pub fn with_profile(mut self, profile: ChainProfile) -> Self {
        self.0.insert(profile.chain_id, profile);
        self
    }

    /// Looks up a profile by chain id.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<&ChainProfile> {
        self.0.get(&chain_id)
    }

    /// Looks up a profile by its wire key, ignoring ASCII case.
    #[must_use]
    pub fn by_key(&self, key: &str) -> Option<&ChainProfile> {
        self.0.values().find(|p| p.key.eq_ignore_ascii_case(key))
    }

    /// All profiles, ordered by chain id.
    #[must_use]
    pub fn profiles(&self) -> Vec<&ChainProfile> {
        let mut profiles: Vec<_> = self.0.values().collect();
        profiles.sort_by_key(|p| p.chain_id);
        profiles
    }

    /// Returns the number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Picks the profile a payment must settle on.
    ///
    /// The server's `chainId` always wins. If it is absent, the `network`
    /// key is consulted. Only when the server names neither, and the policy
    /// is [`ChainPolicy::WalletFallback`], is `wallet_chain` used. There is
    /// no silent default chain.
    ///
    /// # Errors
    ///
    /// Returns [`ChainResolveError`] when the named chain is unknown, when
    /// `chainId` and `network` disagree, or when no chain is named and no
    /// fallback applies.
    pub fn resolve(
        &self,
        instructions: &PaymentInstructions,
        policy: ChainPolicy,
        wallet_chain: Option<ChainId>,
    ) -> Result<&ChainProfile, ChainResolveError> {
        let by_network = instructions
            .network
            .as_deref()
            .map(|key| (key, self.by_key(key)));

        if let Some(chain_id) = instructions.chain_id {
            if let Some((key, Some(named))) = by_network {
                if named.chain_id != chain_id {
                    return Err(ChainResolveError::Conflict {
                        chain_id,
                        network: key.to_owned(),
                        network_chain_id: named.chain_id,
                    });
                }
            }
            return self
                .by_chain_id(chain_id)
                .ok_or(ChainResolveError::UnsupportedChainId(chain_id));
        }

        match by_network {
            Some((_, Some(profile))) => Ok(profile),
            Some((key, None)) => Err(ChainResolveError::UnsupportedNetwork(key.to_owned())),
            None => match (policy, wallet_chain) {
                (ChainPolicy::WalletFallback, Some(chain_id)) => self
                    .by_chain_id(chain_id)
                    .ok_or(ChainResolveError::UnsupportedChainId(chain_id)),
                _ => Err(ChainResolveError::Unspecified),
            },
        }
    }
}
