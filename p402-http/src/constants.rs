//! HTTP constants for the pay-per-call handshake.

/// Header carrying the confirmed transfer hash on the paid retry.
pub const PAYMENT_TX_HASH_HEADER: &str = "X-Payment-TxHash";

/// Older name of [`PAYMENT_TX_HASH_HEADER`], still read by some servers.
pub const LEGACY_PAYMENT_TX_HEADER: &str = "X-Payment-TX";

/// Header carrying the chain key the transfer was made on.
pub const PAYMENT_CHAIN_HEADER: &str = "X-Payment-Chain";

/// Longest slice of a rejected retry's body kept in the failure detail.
pub const REJECTED_BODY_PREVIEW: usize = 256;
