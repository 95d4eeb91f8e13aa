//! Known EVM networks and their native USDC deployments.

use alloy_primitives::{Address, address};
use p402::amount::USDC_DECIMALS;
use p402::chain::{ChainId, ChainProfile, ChainProfiles};
use url::Url;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: ChainId = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: ChainId = 84532;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = 1;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: ChainId = 80002;

/// Avalanche C-Chain chain ID.
pub const AVALANCHE_MAINNET: ChainId = 43114;

/// Avalanche Fuji (testnet) chain ID.
pub const AVALANCHE_FUJI: ChainId = 43113;

/// Celo Mainnet chain ID.
pub const CELO_MAINNET: ChainId = 42220;

/// Arbitrum One chain ID.
pub const ARBITRUM_ONE: ChainId = 42161;

/// OP Mainnet chain ID.
pub const OPTIMISM_MAINNET: ChainId = 10;

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// USDC contract address on Polygon Mainnet.
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

/// USDC contract address on Polygon Amoy.
pub const USDC_POLYGON_AMOY: Address = address!("41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF");

/// USDC contract address on Avalanche C-Chain.
pub const USDC_AVALANCHE: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");

/// USDC contract address on Avalanche Fuji.
pub const USDC_AVALANCHE_FUJI: Address = address!("5425890298aed601595a70AB815c96711a31Bc65");

/// USDC contract address on Celo.
pub const USDC_CELO: Address = address!("cebA9300f2b948710d2653dD7B07f33A8B32118C");

/// USDC contract address on Arbitrum One.
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");

/// USDC contract address on OP Mainnet.
pub const USDC_OPTIMISM: Address = address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85");

struct KnownNetwork {
    chain_id: ChainId,
    key: &'static str,
    label: &'static str,
    usdc: Address,
    rpc_url: &'static str,
    explorer: &'static str,
}

const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        chain_id: BASE_MAINNET,
        key: "base",
        label: "Base",
        usdc: USDC_BASE,
        rpc_url: "https://mainnet.base.org",
        explorer: "https://basescan.org",
    },
    KnownNetwork {
        chain_id: BASE_SEPOLIA,
        key: "base-sepolia",
        label: "Base Sepolia",
        usdc: USDC_BASE_SEPOLIA,
        rpc_url: "https://sepolia.base.org",
        explorer: "https://sepolia.basescan.org",
    },
    KnownNetwork {
        chain_id: ETHEREUM_MAINNET,
        key: "ethereum",
        label: "Ethereum",
        usdc: USDC_ETHEREUM,
        rpc_url: "https://ethereum-rpc.publicnode.com",
        explorer: "https://etherscan.io",
    },
    KnownNetwork {
        chain_id: POLYGON_MAINNET,
        key: "polygon",
        label: "Polygon",
        usdc: USDC_POLYGON,
        rpc_url: "https://polygon-rpc.com",
        explorer: "https://polygonscan.com",
    },
    KnownNetwork {
        chain_id: POLYGON_AMOY,
        key: "polygon-amoy",
        label: "Polygon Amoy",
        usdc: USDC_POLYGON_AMOY,
        rpc_url: "https://rpc-amoy.polygon.technology",
        explorer: "https://amoy.polygonscan.com",
    },
    KnownNetwork {
        chain_id: AVALANCHE_MAINNET,
        key: "avalanche",
        label: "Avalanche C-Chain",
        usdc: USDC_AVALANCHE,
        rpc_url: "https://api.avax.network/ext/bc/C/rpc",
        explorer: "https://snowtrace.io",
    },
    KnownNetwork {
        chain_id: AVALANCHE_FUJI,
        key: "avalanche-fuji",
        label: "Avalanche Fuji",
        usdc: USDC_AVALANCHE_FUJI,
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
        explorer: "https://testnet.snowtrace.io",
    },
    KnownNetwork {
        chain_id: CELO_MAINNET,
        key: "celo",
        label: "Celo",
        usdc: USDC_CELO,
        rpc_url: "https://forno.celo.org",
        explorer: "https://celoscan.io",
    },
    KnownNetwork {
        chain_id: ARBITRUM_ONE,
        key: "arbitrum",
        label: "Arbitrum One",
        usdc: USDC_ARBITRUM,
        rpc_url: "https://arb1.arbitrum.io/rpc",
        explorer: "https://arbiscan.io",
    },
    KnownNetwork {
        chain_id: OPTIMISM_MAINNET,
        key: "optimism",
        label: "OP Mainnet",
        usdc: USDC_OPTIMISM,
        rpc_url: "https://mainnet.optimism.io",
        explorer: "https://optimistic.etherscan.io",
    },
];

impl KnownNetwork {
    fn profile(&self) -> ChainProfile {
        ChainProfile {
            chain_id: self.chain_id,
            key: self.key.to_owned(),
            label: self.label.to_owned(),
            token_contract: self.usdc,
            rpc_url: Url::parse(self.rpc_url).expect("static RPC URL is valid"),
            explorer_url_template: format!("{}/tx/{{tx}}", self.explorer),
            decimals: USDC_DECIMALS,
        }
    }
}

/// Returns chain profiles for all known EVM networks.
#[must_use]
pub fn known_profiles() -> Vec<ChainProfile> {
    KNOWN_NETWORKS.iter().map(KnownNetwork::profile).collect()
}

/// Returns the known networks as a ready-to-extend profile table.
#[must_use]
pub fn known_chain_profiles() -> ChainProfiles {
    ChainProfiles::from_profiles(known_profiles())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::TxHash;

    use super::*;

    #[test]
    fn every_known_network_has_a_unique_id_and_key() {
        let profiles = known_chain_profiles();
        assert_eq!(profiles.len(), KNOWN_NETWORKS.len());
        for network in KNOWN_NETWORKS {
            assert_eq!(
                profiles.by_key(network.key).map(|p| p.chain_id),
                Some(network.chain_id)
            );
        }
    }

    #[test]
    fn explorer_urls_use_the_tx_path() {
        let profiles = known_chain_profiles();
        let base = profiles.by_chain_id(BASE_MAINNET).unwrap();
        let url = base.explorer_tx_url(&TxHash::ZERO);
        assert_eq!(url, format!("https://basescan.org/tx/{}", TxHash::ZERO));
        assert_eq!(base.decimals, 6);
        assert_eq!(base.token_contract, USDC_BASE);
    }
}
