//! Payment instructions carried by a `402 Payment Required` body.
//!
//! The wire format is a JSON object with a `payment_details` member:
//!
//! ```json
//! {
//!   "error": "Payment Required",
//!   "payment_details": {
//!     "amount": 0.05,
//!     "currency": "USDC",
//!     "network": "base",
//!     "chainId": 8453,
//!     "recipient": "0x1111111111111111111111111111111111111111",
//!     "action": "description"
//!   }
//! }
//! ```
//!
//! [`PaymentInstructions::from_body`] validates the object once; the result
//! is immutable and never re-parsed.

use std::sync::LazyLock;

use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::chain::ChainId;

/// The only currency the settlement path can pay in.
pub const USDC: &str = "USDC";

static RECIPIENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^0x[0-9a-fA-F]{40}$").expect("valid recipient regex"));

/// Top-level shape of a 402 response body.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequiredBody {
    /// Human-readable error, usually `"Payment Required"`.
    #[serde(default)]
    pub error: Option<String>,
    /// The payment instructions, before validation.
    #[serde(default)]
    pub payment_details: Option<WirePaymentDetails>,
}

/// `payment_details` as it appears on the wire, every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePaymentDetails {
    /// Price in whole USDC, as a JSON number or string.
    #[serde(default)]
    pub amount: Option<Amount>,
    /// Currency code; absent means USDC.
    #[serde(default)]
    pub currency: Option<String>,
    /// Human-readable chain key such as `"base"`.
    #[serde(default)]
    pub network: Option<String>,
    /// EIP-155 chain id.
    #[serde(default, alias = "chain_id")]
    pub chain_id: Option<ChainId>,
    /// Recipient address, `0x` + 40 hex characters.
    #[serde(default)]
    pub recipient: Option<String>,
    /// What the payment unlocks.
    #[serde(default)]
    pub action: Option<String>,
}

/// Validated, immutable payment instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    /// Price in whole USDC. Always positive.
    pub amount: Amount,
    /// Always [`USDC`].
    pub currency: String,
    /// Chain the server wants to be paid on, if it said so.
    pub chain_id: Option<ChainId>,
    /// Chain key the server named, if any.
    pub network: Option<String>,
    /// Who receives the transfer.
    pub recipient: Address,
    /// Description of the paid action; empty when the server sent none.
    pub action: String,
}

/// Reasons a 402 body cannot be turned into [`PaymentInstructions`].
#[derive(Debug, thiserror::Error)]
pub enum InstructionsError {
    /// The body is not JSON of the expected shape.
    #[error("402 body is not valid payment JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The body has no `payment_details` object.
    #[error("402 body has no payment_details object")]
    MissingDetails,
    /// A required field is absent.
    #[error("payment_details is missing required field `{0}`")]
    MissingField(&'static str),
    /// The recipient is not a 20-byte hex address.
    #[error("payment_details recipient {0:?} is not a 0x-prefixed 40-hex-digit address")]
    InvalidRecipient(String),
    /// The server asked for something other than USDC.
    #[error("unsupported currency {0:?}, only USDC can be settled")]
    UnsupportedCurrency(String),
}

impl PaymentInstructions {
    /// Parses and validates a raw 402 response body.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionsError`] when the body is not JSON, lacks
    /// `payment_details`, or any field breaks the invariants.
    pub fn from_body(body: &[u8]) -> Result<Self, InstructionsError> {
        let body: PaymentRequiredBody = serde_json::from_slice(body)?;
        let details = body
            .payment_details
            .ok_or(InstructionsError::MissingDetails)?;
        Self::try_from(details)
    }
}

impl TryFrom<WirePaymentDetails> for PaymentInstructions {
    type Error = InstructionsError;

    fn try_from(details: WirePaymentDetails) -> Result<Self, Self::Error> {
        let amount = details
            .amount
            .ok_or(InstructionsError::MissingField("amount"))?;
        let recipient = details
            .recipient
            .ok_or(InstructionsError::MissingField("recipient"))?;
        let recipient = parse_recipient(&recipient)?;

        let currency = match details.currency {
            None => USDC.to_owned(),
            Some(currency) if currency.eq_ignore_ascii_case(USDC) => USDC.to_owned(),
            Some(other) => return Err(InstructionsError::UnsupportedCurrency(other)),
        };

        let network = details
            .network
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());

        Ok(Self {
            amount,
            currency,
            chain_id: details.chain_id,
            network,
            recipient,
            action: details.action.unwrap_or_default(),
        })
    }
}

fn parse_recipient(raw: &str) -> Result<Address, InstructionsError> {
    let trimmed = raw.trim();
    if !RECIPIENT_PATTERN.is_match(trimmed) {
        return Err(InstructionsError::InvalidRecipient(raw.to_owned()));
    }
    trimmed
        .parse()
        .map_err(|_| InstructionsError::InvalidRecipient(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::USDC_DECIMALS;
    use alloy_primitives::U256;

    const RECIPIENT: &str = "0xabcabcabcabcabcabcabcabcabcabcabcabcabca";

    fn body(details: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "error": "Payment Required",
            "payment_details": details,
        }))
        .unwrap()
    }

    #[test]
    fn parses_the_documented_body() {
        let raw = body(&serde_json::json!({
            "amount": 0.05,
            "currency": "USDC",
            "network": "base",
            "chainId": 8453,
            "recipient": RECIPIENT,
            "action": "unlock report",
        }));
        let instructions = PaymentInstructions::from_body(&raw).unwrap();
        assert_eq!(instructions.chain_id, Some(8453));
        assert_eq!(instructions.network.as_deref(), Some("base"));
        assert_eq!(instructions.action, "unlock report");
        assert_eq!(
            instructions.amount.to_raw(USDC_DECIMALS).unwrap(),
            U256::from(50_000u64)
        );
        assert_eq!(instructions.recipient, RECIPIENT.parse::<Address>().unwrap());
    }

    #[test]
    fn parsing_twice_yields_identical_instructions() {
        let raw = body(&serde_json::json!({
            "amount": "0.02",
            "chainId": 8453,
            "recipient": RECIPIENT,
        }));
        let first = PaymentInstructions::from_body(&raw).unwrap();
        let second = PaymentInstructions::from_body(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_recipient_is_reported() {
        let raw = body(&serde_json::json!({ "amount": 0.05, "chainId": 8453 }));
        assert!(matches!(
            PaymentInstructions::from_body(&raw),
            Err(InstructionsError::MissingField("recipient"))
        ));
    }

    #[test]
    fn missing_amount_is_reported() {
        let raw = body(&serde_json::json!({ "chainId": 8453, "recipient": RECIPIENT }));
        assert!(matches!(
            PaymentInstructions::from_body(&raw),
            Err(InstructionsError::MissingField("amount"))
        ));
    }

    #[test]
    fn zero_amount_fails_to_parse() {
        let raw = body(&serde_json::json!({
            "amount": 0,
            "chainId": 8453,
            "recipient": RECIPIENT,
        }));
        assert!(matches!(
            PaymentInstructions::from_body(&raw),
            Err(InstructionsError::InvalidJson(_))
        ));
    }

    #[test]
    fn short_recipient_is_rejected() {
        let raw = body(&serde_json::json!({
            "amount": 1,
            "chainId": 8453,
            "recipient": "0xabc",
        }));
        assert!(matches!(
            PaymentInstructions::from_body(&raw),
            Err(InstructionsError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn non_usdc_currency_is_rejected() {
        let raw = body(&serde_json::json!({
            "amount": 1,
            "currency": "DAI",
            "chainId": 8453,
            "recipient": RECIPIENT,
        }));
        assert!(matches!(
            PaymentInstructions::from_body(&raw),
            Err(InstructionsError::UnsupportedCurrency(c)) if c == "DAI"
        ));
    }

    #[test]
    fn body_without_details_or_json_is_rejected() {
        assert!(matches!(
            PaymentInstructions::from_body(br#"{"error":"Payment Required"}"#),
            Err(InstructionsError::MissingDetails)
        ));
        assert!(matches!(
            PaymentInstructions::from_body(b"<html>pay up</html>"),
            Err(InstructionsError::InvalidJson(_))
        ));
    }

    #[test]
    fn snake_case_chain_id_is_accepted() {
        let raw = body(&serde_json::json!({
            "amount": 1,
            "chain_id": 84532,
            "recipient": RECIPIENT,
        }));
        let instructions = PaymentInstructions::from_body(&raw).unwrap();
        assert_eq!(instructions.chain_id, Some(84532));
        assert_eq!(instructions.currency, USDC);
    }
}
