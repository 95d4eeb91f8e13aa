//! Settlement: submit a token transfer and wait, boundedly, for its receipt.
//!
//! [`SettlementExecutor`] drives one [`SettlementAttempt`] through its states.
//! Everything it touches from the outside world sits behind a seam:
//!
//! - [`Wallet`] - Signs and broadcasts the transfer
//! - [`ReceiptSource`] - Reports receipt status for a transaction hash
//! - [`Sleeper`] - Waits between polls
//!
//! Polling sleeps [`PollPolicy::interval`] before each lookup and gives up
//! after [`PollPolicy::max_polls`] lookups. A failed lookup consumes a poll
//! like any other; only a receipt ends the loop early.

mod attempt;
mod receipt;
mod sleep;
mod wallet;

use std::time::Duration;

use alloy_primitives::TxHash;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument, warn};

pub use attempt::{SettlementAttempt, SettlementState};
pub use receipt::{ReceiptError, ReceiptSource, ReceiptStatus};
pub use sleep::{Sleeper, TokioSleeper};
pub use wallet::{TransferRequest, Wallet, WalletError};

use crate::amount::AmountError;
use crate::chain::ChainProfile;
use crate::error::ErrorKind;
use crate::instructions::PaymentInstructions;

/// Default wait before each receipt poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of receipt polls before giving up.
pub const DEFAULT_MAX_POLLS: u32 = 30;

/// How long and how often to wait for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before each poll.
    pub interval: Duration,
    /// Number of polls, failed lookups included.
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}

impl PollPolicy {
    /// Upper bound on the time spent polling.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.interval.saturating_mul(self.max_polls)
    }
}

/// Why a settlement attempt did not confirm.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The amount does not fit the chain's token decimals. Nothing was sent.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),
    /// The wallet declined or failed to submit. Nothing was sent.
    #[error("submission rejected: {0}")]
    SubmissionRejected(#[from] WalletError),
    /// No receipt appeared within the poll budget. The transfer may still land.
    #[error("transaction {tx_hash} not confirmed after {polls} polls")]
    ConfirmationTimeout {
        /// Submitted transfer.
        tx_hash: TxHash,
        /// Polls consumed.
        polls: u32,
    },
    /// The transfer was mined and reverted.
    #[error("transaction {tx_hash} reverted")]
    TransferReverted {
        /// Reverted transfer.
        tx_hash: TxHash,
    },
    /// The attempt has already run. Nothing was sent; start a new attempt.
    #[error("settlement attempt already {state:?}")]
    AttemptNotIdle {
        /// State the attempt was found in.
        state: SettlementState,
        /// Transfer submitted by the earlier run, if any.
        tx_hash: Option<TxHash>,
    },
}

impl SettlementError {
    /// Failure category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::TransferReverted { .. } => ErrorKind::TransferReverted,
            Self::AttemptNotIdle { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// The submitted transfer, when one exists.
    #[must_use]
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::ConfirmationTimeout { tx_hash, .. } | Self::TransferReverted { tx_hash } => {
                Some(*tx_hash)
            }
            Self::AttemptNotIdle { tx_hash, .. } => *tx_hash,
            Self::InvalidAmount(_) | Self::SubmissionRejected(_) => None,
        }
    }
}

/// Submits transfers and polls for their receipts.
///
/// Stateless between calls; one executor can serve any number of
/// concurrent settlements.
#[derive(Debug, Clone)]
pub struct SettlementExecutor<R, S = TokioSleeper> {
    receipts: R,
    sleeper: S,
    policy: PollPolicy,
}

impl<R> SettlementExecutor<R> {
    /// Creates an executor with the default poll policy and the tokio timer.
    pub fn new(receipts: R) -> Self {
        Self {
            receipts,
            sleeper: TokioSleeper,
            policy: PollPolicy::default(),
        }
    }
}

impl<R, S> SettlementExecutor<R, S> {
    /// Replaces the sleeper.
    pub fn with_sleeper<S2>(self, sleeper: S2) -> SettlementExecutor<R, S2> {
        SettlementExecutor {
            receipts: self.receipts,
            sleeper,
            policy: self.policy,
        }
    }

    /// Replaces the poll policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active poll policy.
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// The receipt source.
    pub const fn receipts(&self) -> &R {
        &self.receipts
    }
}

impl<R, S> SettlementExecutor<R, S>
where
    R: ReceiptSource,
    S: Sleeper,
{
    /// Pays `instructions` on `profile`'s chain and waits for confirmation.
    ///
    /// # Errors
    ///
    /// See [`SettlementError`]. Errors carrying a hash mean a transfer was
    /// broadcast.
    pub async fn settle<W: Wallet>(
        &self,
        instructions: &PaymentInstructions,
        profile: &ChainProfile,
        wallet: &W,
    ) -> Result<TxHash, SettlementError> {
        let mut attempt = SettlementAttempt::new(instructions, profile);
        self.run(&mut attempt, wallet).await
    }

    /// Drives an idle `attempt` to a terminal state, leaving its progress
    /// readable.
    ///
    /// # Errors
    ///
    /// Same as [`settle`](Self::settle), plus
    /// [`SettlementError::AttemptNotIdle`] when `attempt` has already run. In
    /// that case the wallet is not called.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "p402.settlement.run",
            skip_all,
            fields(chain_id = attempt.profile.chain_id, amount = %attempt.instructions.amount),
            err
        )
    )]
    pub async fn run<W: Wallet>(
        &self,
        attempt: &mut SettlementAttempt<'_>,
        wallet: &W,
    ) -> Result<TxHash, SettlementError> {
        if attempt.state != SettlementState::Idle {
            return Err(SettlementError::AttemptNotIdle {
                state: attempt.state,
                tx_hash: attempt.tx_hash,
            });
        }

        let profile = attempt.profile;
        let instructions = attempt.instructions;
        let transfer = TransferRequest {
            chain_id: profile.chain_id,
            token_contract: profile.token_contract,
            recipient: instructions.recipient,
            amount: instructions.amount,
            raw_amount: instructions.amount.to_raw(profile.decimals)?,
            description: instructions.action.clone(),
        };

        attempt.advance(SettlementState::Submitting);
        let tx_hash = match wallet.submit_transfer(&transfer).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                attempt.advance(SettlementState::SubmissionRejected);
                return Err(err.into());
            }
        };
        attempt.tx_hash = Some(tx_hash);
        attempt.advance(SettlementState::AwaitingConfirmation);

        #[cfg(feature = "telemetry")]
        debug!(%tx_hash, max_polls = self.policy.max_polls, "Transfer submitted, awaiting receipt");

        while attempt.elapsed_polls < self.policy.max_polls {
            self.sleeper.sleep(self.policy.interval).await;
            attempt.elapsed_polls += 1;
            match self.receipts.receipt_status(profile, tx_hash).await {
                Ok(ReceiptStatus::Success) => {
                    attempt.confirmed = true;
                    attempt.advance(SettlementState::Confirmed);
                    return Ok(tx_hash);
                }
                Ok(ReceiptStatus::Reverted) => {
                    attempt.advance(SettlementState::Reverted);
                    return Err(SettlementError::TransferReverted { tx_hash });
                }
                Ok(ReceiptStatus::Pending) => {}
                Err(err) => {
                    #[cfg(feature = "telemetry")]
                    warn!(%tx_hash, poll = attempt.elapsed_polls, error = %err, "Receipt lookup failed");
                    #[cfg(not(feature = "telemetry"))]
                    let _ = err;
                }
            }
        }

        attempt.advance(SettlementState::TimedOut);
        Err(SettlementError::ConfirmationTimeout {
            tx_hash,
            polls: attempt.elapsed_polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy_primitives::{Address, U256};
    use url::Url;

    use super::*;
    use crate::amount::Amount;
    use crate::instructions::USDC;

    struct StubWallet {
        result: Result<TxHash, WalletError>,
        calls: AtomicUsize,
        last: Mutex<Option<TransferRequest>>,
    }

    impl StubWallet {
        fn ok() -> Self {
            Self::returning(Ok(TxHash::repeat_byte(0xab)))
        }

        fn returning(result: Result<TxHash, WalletError>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Wallet for StubWallet {
        async fn submit_transfer(&self, transfer: &TransferRequest) -> Result<TxHash, WalletError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(transfer.clone());
            self.result.clone()
        }
    }

    /// Replays scripted lookups, then reports `Pending` forever.
    #[derive(Default)]
    struct ScriptedReceipts {
        script: Mutex<VecDeque<Result<ReceiptStatus, ReceiptError>>>,
        polls: AtomicUsize,
    }

    impl ScriptedReceipts {
        fn new(script: impl IntoIterator<Item = Result<ReceiptStatus, ReceiptError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                polls: AtomicUsize::new(0),
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    impl ReceiptSource for ScriptedReceipts {
        async fn receipt_status(
            &self,
            _profile: &ChainProfile,
            _tx_hash: TxHash,
        ) -> Result<ReceiptStatus, ReceiptError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ReceiptStatus::Pending))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper(Mutex<Vec<Duration>>);

    impl Sleeper for &RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn profile() -> ChainProfile {
        ChainProfile {
            chain_id: 84532,
            key: "base-sepolia".into(),
            label: "Base Sepolia".into(),
            token_contract: Address::repeat_byte(0x11),
            rpc_url: Url::parse("https://sepolia.base.org").unwrap(),
            explorer_url_template: "https://sepolia.basescan.org/tx/{tx}".into(),
            decimals: 6,
        }
    }

    fn instructions(amount: &str) -> PaymentInstructions {
        PaymentInstructions {
            amount: Amount::from_str(amount).unwrap(),
            currency: USDC.into(),
            chain_id: Some(84532),
            network: None,
            recipient: Address::repeat_byte(0x22),
            action: "Unlock report".into(),
        }
    }

    #[tokio::test]
    async fn confirms_on_first_success_receipt() {
        let receipts = ScriptedReceipts::new([Ok(ReceiptStatus::Success)]);
        let sleeper = RecordingSleeper::default();
        let executor = SettlementExecutor::new(&receipts).with_sleeper(&sleeper);
        let wallet = StubWallet::ok();
        let (instructions, profile) = (instructions("0.05"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        let tx_hash = executor.run(&mut attempt, &wallet).await.unwrap();

        assert_eq!(tx_hash, TxHash::repeat_byte(0xab));
        assert_eq!(attempt.state, SettlementState::Confirmed);
        assert!(attempt.confirmed);
        assert_eq!(attempt.tx_hash, Some(tx_hash));
        assert_eq!(attempt.elapsed_polls, 1);
        assert_eq!(*sleeper.0.lock().unwrap(), vec![DEFAULT_POLL_INTERVAL]);

        let transfer = wallet.last.lock().unwrap().clone().unwrap();
        assert_eq!(transfer.raw_amount, U256::from(50_000u64));
        assert_eq!(transfer.recipient, Address::repeat_byte(0x22));
        assert_eq!(transfer.token_contract, Address::repeat_byte(0x11));
        assert_eq!(transfer.chain_id, 84532);
    }

    #[tokio::test]
    async fn times_out_after_exactly_max_polls() {
        let receipts = ScriptedReceipts::default();
        let sleeper = RecordingSleeper::default();
        let executor = SettlementExecutor::new(&receipts).with_sleeper(&sleeper);
        let wallet = StubWallet::ok();

        let err = executor
            .settle(&instructions("1"), &profile(), &wallet)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::ConfirmationTimeout { polls: 30, .. }
        ));
        assert_eq!(err.tx_hash(), Some(TxHash::repeat_byte(0xab)));
        assert_eq!(receipts.polls(), 30);
        assert_eq!(sleeper.0.lock().unwrap().len(), 30);
        assert_eq!(wallet.calls(), 1);
    }

    #[tokio::test]
    async fn revert_stops_polling_immediately() {
        let receipts = ScriptedReceipts::new([
            Ok(ReceiptStatus::Pending),
            Ok(ReceiptStatus::Pending),
            Ok(ReceiptStatus::Reverted),
            Ok(ReceiptStatus::Success),
        ]);
        let sleeper = RecordingSleeper::default();
        let executor = SettlementExecutor::new(&receipts).with_sleeper(&sleeper);
        let (instructions, profile) = (instructions("0.05"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        let err = executor
            .run(&mut attempt, &StubWallet::ok())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransferReverted);
        assert_eq!(receipts.polls(), 3);
        assert_eq!(attempt.state, SettlementState::Reverted);
        assert!(!attempt.confirmed);
    }

    #[tokio::test]
    async fn failed_lookups_consume_polls() {
        let receipts = ScriptedReceipts::new([
            Err(ReceiptError::Transport("connection refused".into())),
            Err(ReceiptError::Decode("not a receipt".into())),
            Ok(ReceiptStatus::Success),
        ]);
        let sleeper = RecordingSleeper::default();
        let policy = PollPolicy {
            interval: Duration::from_millis(10),
            max_polls: 2,
        };
        let executor = SettlementExecutor::new(&receipts)
            .with_sleeper(&sleeper)
            .with_policy(policy);

        let err = executor
            .settle(&instructions("0.05"), &profile(), &StubWallet::ok())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettlementError::ConfirmationTimeout { polls: 2, .. }
        ));
        assert_eq!(receipts.polls(), 2);
    }

    #[tokio::test]
    async fn unrepresentable_amount_never_reaches_the_wallet() {
        let receipts = ScriptedReceipts::default();
        let executor = SettlementExecutor::new(&receipts);
        let wallet = StubWallet::ok();
        let (instructions, profile) = (instructions("0.0000001"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        let err = executor.run(&mut attempt, &wallet).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(wallet.calls(), 0);
        assert_eq!(receipts.polls(), 0);
        assert_eq!(attempt.state, SettlementState::Idle);
        assert_eq!(attempt.tx_hash, None);
    }

    #[tokio::test]
    async fn rejected_submission_is_terminal() {
        let receipts = ScriptedReceipts::default();
        let executor = SettlementExecutor::new(&receipts);
        let wallet = StubWallet::returning(Err(WalletError::Rejected("user declined".into())));
        let (instructions, profile) = (instructions("0.05"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        let err = executor.run(&mut attempt, &wallet).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SubmissionRejected);
        assert_eq!(err.tx_hash(), None);
        assert_eq!(attempt.state, SettlementState::SubmissionRejected);
        assert_eq!(receipts.polls(), 0);
    }

    #[tokio::test]
    async fn finished_attempt_cannot_pay_again() {
        let receipts = ScriptedReceipts::default();
        let sleeper = RecordingSleeper::default();
        let executor = SettlementExecutor::new(&receipts)
            .with_sleeper(&sleeper)
            .with_policy(PollPolicy {
                interval: Duration::from_millis(10),
                max_polls: 2,
            });
        let wallet = StubWallet::ok();
        let (instructions, profile) = (instructions("0.05"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        let first = executor.run(&mut attempt, &wallet).await.unwrap_err();
        assert_eq!(first.kind(), ErrorKind::ConfirmationTimeout);
        assert_eq!(attempt.state, SettlementState::TimedOut);

        let second = executor.run(&mut attempt, &wallet).await.unwrap_err();
        assert!(matches!(
            second,
            SettlementError::AttemptNotIdle {
                state: SettlementState::TimedOut,
                tx_hash: Some(_),
            }
        ));
        assert_eq!(second.tx_hash(), Some(TxHash::repeat_byte(0xab)));
        assert_eq!(wallet.calls(), 1);
        assert_eq!(receipts.polls(), 2);
        assert_eq!(attempt.state, SettlementState::TimedOut);
    }

    #[tokio::test]
    async fn rejected_attempt_is_not_resubmitted() {
        let receipts = ScriptedReceipts::default();
        let executor = SettlementExecutor::new(&receipts);
        let wallet = StubWallet::returning(Err(WalletError::Rejected("user declined".into())));
        let (instructions, profile) = (instructions("0.05"), profile());

        let mut attempt = SettlementAttempt::new(&instructions, &profile);
        executor.run(&mut attempt, &wallet).await.unwrap_err();
        let again = executor.run(&mut attempt, &wallet).await.unwrap_err();

        assert_eq!(again.kind(), ErrorKind::InvalidRequest);
        assert_eq!(again.tx_hash(), None);
        assert_eq!(wallet.calls(), 1);
    }

    #[test]
    fn default_budget_is_one_minute() {
        assert_eq!(PollPolicy::default().budget(), Duration::from_secs(60));
    }
}
