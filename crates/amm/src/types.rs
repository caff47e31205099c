//! Core type definitions for the AMM engine.
//!
//! Re-exports from alloy-primitives for Ethereum-compatible types.

pub use alloy::primitives::{keccak256, Address, U256};

/// Unique identifier for a token (contract address).
pub type TokenId = Address;

/// Amount of tokens, represented as U256 to handle large token supplies.
/// This is in the smallest unit (e.g., wei for the native currency).
pub type Amount = U256;

/// Scale used by the per-mille fee arithmetic.
pub const PER_MILLE: u64 = 1000;

/// Per-mille of the swap input that counts toward the invariant.
/// The pool keeps no trading fee of its own, so the full input counts;
/// the quoting formulas and the pair's invariant check share this factor.
pub const SWAP_FEE_RETAIN_PER_MILLE: u64 = 1000;

/// Per-mille of a routed swap skimmed for the treasury (2%).
/// Taken once per router call: off the measured output for exact-in
/// swaps, out of the computed required input for exact-out swaps.
pub const TREASURY_FEE_PER_MILLE: u64 = 20;

/// Liquidity shares permanently locked on the first deposit into a pair,
/// so the share price can never be driven to zero.
pub const MINIMUM_LIQUIDITY: u64 = 1000;

/// Address that holds the permanently locked minimum liquidity.
pub const LOCKED_LIQUIDITY_ADDRESS: Address = Address::ZERO;

/// Largest reserve a pair may record (2^112 - 1), so reserves always fit
/// the integer half of the UQ112.112 price-accumulator representation.
pub fn max_reserve() -> U256 {
    (U256::from(1) << 112) - U256::from(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_reserve() {
        let max = max_reserve();
        assert_eq!(max + U256::from(1), U256::from(1) << 112);
    }

    #[test]
    fn test_fee_constants() {
        // Full retention: zero pool fee.
        assert_eq!(SWAP_FEE_RETAIN_PER_MILLE, PER_MILLE);
        // 2% treasury skim.
        assert_eq!(TREASURY_FEE_PER_MILLE * 50, PER_MILLE);
    }
}
