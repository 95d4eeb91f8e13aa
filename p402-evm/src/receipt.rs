//! Receipt lookups over JSON-RPC.

use std::fmt;

use alloy_primitives::TxHash;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use dashmap::DashMap;
use p402::chain::{ChainId, ChainProfile};
use p402::settlement::{ReceiptError, ReceiptSource, ReceiptStatus};
use serde::Deserialize;
#[cfg(feature = "telemetry")]
use tracing::{instrument, trace};

/// The one receipt field settlement reads.
#[derive(Debug, Deserialize)]
struct ReceiptStatusField {
    status: Option<String>,
}

/// [`ReceiptSource`] that calls `eth_getTransactionReceipt` on each chain's
/// configured RPC endpoint.
///
/// One HTTP provider is built per chain on first use and reused afterwards.
#[derive(Default)]
pub struct RpcReceiptSource {
    providers: DashMap<ChainId, DynProvider>,
}

impl fmt::Debug for RpcReceiptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcReceiptSource")
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl RpcReceiptSource {
    /// Creates a source with no cached providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn provider(&self, profile: &ChainProfile) -> DynProvider {
        self.providers
            .entry(profile.chain_id)
            .or_insert_with(|| {
                ProviderBuilder::new()
                    .connect_http(profile.rpc_url.clone())
                    .erased()
            })
            .clone()
    }
}

impl ReceiptSource for RpcReceiptSource {
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "p402.evm.receipt_status", skip(self, profile), fields(chain_id = profile.chain_id), err)
    )]
    async fn receipt_status(
        &self,
        profile: &ChainProfile,
        tx_hash: TxHash,
    ) -> Result<ReceiptStatus, ReceiptError> {
        let provider = self.provider(profile);
        let receipt: Option<ReceiptStatusField> = provider
            .raw_request("eth_getTransactionReceipt".into(), (tx_hash,))
            .await
            .map_err(|e| ReceiptError::Transport(e.to_string()))?;

        let Some(receipt) = receipt else {
            #[cfg(feature = "telemetry")]
            trace!(%tx_hash, "No receipt yet");
            return Ok(ReceiptStatus::Pending);
        };

        // Pre-Byzantium receipts carry a state root instead of a status.
        let status = receipt
            .status
            .ok_or_else(|| ReceiptError::Decode("receipt has no status field".to_owned()))?;
        ReceiptStatus::from_status_field(&status)
            .ok_or_else(|| ReceiptError::Decode(format!("unexpected receipt status {status:?}")))
    }
}
