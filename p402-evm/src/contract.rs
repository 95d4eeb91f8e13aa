//! ERC-20 surface used to pay.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};

sol! {
    /// The part of ERC-20 a paying client touches.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ABI-encoded `transfer(recipient, raw_amount)` calldata.
#[must_use]
pub fn transfer_calldata(recipient: Address, raw_amount: U256) -> Bytes {
    IERC20::transferCall {
        to: recipient,
        amount: raw_amount,
    }
    .abi_encode()
    .into()
}
