use alloy_primitives::TxHash;

use crate::chain::ChainProfile;
use crate::instructions::PaymentInstructions;

/// Where a settlement attempt currently stands.
///
/// ```text
/// Idle -> Submitting -> AwaitingConfirmation -> Confirmed
///              |                  |-----------> Reverted
///              |                  '-----------> TimedOut
///              '-> SubmissionRejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettlementState {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// The transfer is with the wallet.
    Submitting,
    /// The transfer is broadcast and receipts are being polled.
    AwaitingConfirmation,
    /// A success receipt was observed.
    Confirmed,
    /// A revert receipt was observed.
    Reverted,
    /// The poll budget ran out without a receipt.
    TimedOut,
    /// The wallet declined or failed to submit.
    SubmissionRejected,
}

impl SettlementState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Reverted | Self::TimedOut | Self::SubmissionRejected
        )
    }

    const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Submitting)
                | (Self::Submitting, Self::AwaitingConfirmation | Self::SubmissionRejected)
                | (
                    Self::AwaitingConfirmation,
                    Self::Confirmed | Self::Reverted | Self::TimedOut
                )
        )
    }
}

/// One payment's trip through settlement.
///
/// Owned by a single negotiation and never shared. `tx_hash` is set once the
/// wallet returns it and stays set; `confirmed` is only ever true together
/// with a hash.
#[derive(Debug, Clone)]
pub struct SettlementAttempt<'a> {
    /// What is being paid.
    pub instructions: &'a PaymentInstructions,
    /// Chain the transfer runs on.
    pub profile: &'a ChainProfile,
    /// Hash returned by the wallet.
    pub tx_hash: Option<TxHash>,
    /// Whether a success receipt was observed.
    pub confirmed: bool,
    /// Receipt polls consumed so far, failed lookups included.
    pub elapsed_polls: u32,
    /// Current state.
    pub state: SettlementState,
}

impl<'a> SettlementAttempt<'a> {
    /// Starts an idle attempt.
    #[must_use]
    pub const fn new(instructions: &'a PaymentInstructions, profile: &'a ChainProfile) -> Self {
        Self {
            instructions,
            profile,
            tx_hash: None,
            confirmed: false,
            elapsed_polls: 0,
            state: SettlementState::Idle,
        }
    }

    pub(crate) fn advance(&mut self, next: SettlementState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid settlement transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }
}
