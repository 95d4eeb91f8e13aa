//! Doubles shared by the negotiator and middleware tests.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, TxHash};
use p402::chain::{ChainProfile, ChainProfiles};
use p402::settlement::{
    ReceiptError, ReceiptSource, ReceiptStatus, Sleeper, TransferRequest, Wallet, WalletError,
};
use serde_json::{Value, json};
use url::Url;

pub const RECIPIENT: &str = "0xabcabcabcabcabcabcabcabcabcabcabcabcabca";

pub const TX_HASH: TxHash = TxHash::repeat_byte(0xab);

pub fn payment_required(details: Value) -> Value {
    json!({
        "error": "Payment Required",
        "payment_details": details,
    })
}

pub fn test_chains() -> Arc<ChainProfiles> {
    Arc::new(ChainProfiles::from_profiles([ChainProfile {
        chain_id: 8453,
        key: "base".into(),
        label: "Base".into(),
        token_contract: Address::from_str("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap(),
        rpc_url: Url::parse("http://127.0.0.1:1").unwrap(),
        explorer_url_template: "https://basescan.org/tx/{tx}".into(),
        decimals: 6,
    }]))
}

pub struct StubWallet {
    result: Result<TxHash, WalletError>,
    calls: AtomicUsize,
    last: Mutex<Option<TransferRequest>>,
}

impl StubWallet {
    pub fn ok() -> Self {
        Self::returning(Ok(TX_HASH))
    }

    pub fn returning(result: Result<TxHash, WalletError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_raw_amount(&self) -> Option<u64> {
        self.last
            .lock()
            .unwrap()
            .as_ref()
            .map(|transfer| transfer.raw_amount.to::<u64>())
    }
}

impl Wallet for StubWallet {
    async fn submit_transfer(&self, transfer: &TransferRequest) -> Result<TxHash, WalletError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(transfer.clone());
        self.result.clone()
    }
}

/// Replays a script, then answers `fallback` forever. Clones share state.
#[derive(Clone)]
pub struct StubReceipts {
    script: Arc<Mutex<VecDeque<Result<ReceiptStatus, ReceiptError>>>>,
    fallback: ReceiptStatus,
    polls: Arc<AtomicUsize>,
}

impl StubReceipts {
    pub fn success() -> Self {
        Self {
            script: Arc::default(),
            fallback: ReceiptStatus::Success,
            polls: Arc::default(),
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<ReceiptStatus, ReceiptError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback: ReceiptStatus::Pending,
            polls: Arc::default(),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl ReceiptSource for StubReceipts {
    async fn receipt_status(
        &self,
        _profile: &ChainProfile,
        _tx_hash: TxHash,
    ) -> Result<ReceiptStatus, ReceiptError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(self.fallback))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}
