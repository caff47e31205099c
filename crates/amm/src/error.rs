//! Error taxonomy for the AMM engine.
//!
//! Each component gets its own enum; router errors absorb the rest via
//! `#[from]` so multi-component call chains stay `?`-friendly. Every failure
//! aborts the whole call and rolls back any intermediate transfers.

use thiserror::Error;

/// Errors raised by the fungible-token ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Sender balance below the requested transfer amount.
    #[error("insufficient token balance")]
    InsufficientBalance,
    /// Spender allowance below the requested transfer amount.
    #[error("insufficient allowance")]
    InsufficientAllowance,
    /// Native-currency balance below the requested deposit.
    #[error("insufficient native balance")]
    InsufficientNativeBalance,
    /// A credit would overflow a balance.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Errors raised by a pair's reserve ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PairError {
    /// A mutating entry point was re-entered while already executing.
    #[error("reentrant call")]
    Reentrancy,
    /// A deposit would mint zero liquidity shares.
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    /// A burn would pay out zero of either token.
    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,
    /// Swap requested with both outputs zero.
    #[error("insufficient output amount")]
    InsufficientOutputAmount,
    /// Swap received no input of either token.
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    /// Requested output meets or exceeds a reserve.
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    /// Swap recipient may not be one of the pair's own tokens.
    #[error("invalid recipient")]
    InvalidRecipient,
    /// The fee-adjusted product of balances fell below the reserve product.
    #[error("constant-product invariant violated")]
    InvariantViolation,
    /// Arithmetic overflow, or a balance exceeding the reserve range.
    #[error("arithmetic overflow")]
    Overflow,
    /// Share balance below the requested transfer amount.
    #[error("insufficient liquidity share balance")]
    InsufficientShareBalance,
    /// Share allowance below the requested transfer amount.
    #[error("insufficient liquidity share allowance")]
    InsufficientShareAllowance,
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Errors raised by the pair registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// Both sides of the pair are the same token.
    #[error("identical tokens")]
    IdenticalTokens,
    /// One of the tokens is the zero address.
    #[error("zero token address")]
    ZeroToken,
    /// A pair for these tokens already exists.
    #[error("pair exists")]
    PairExists,
    /// No pair exists for these tokens.
    #[error("pair not found")]
    PairNotFound,
    /// Caller lacks the role required for this configuration change.
    #[error("forbidden")]
    Forbidden,
}

/// Errors raised by the swap router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RouterError {
    /// The caller-specified deadline has passed.
    #[error("deadline expired")]
    Expired,
    /// Path must contain at least two tokens, with wrapped native at the
    /// correct end for the native-currency variants.
    #[error("invalid path")]
    InvalidPath,
    /// Zero amount supplied to a quoting function.
    #[error("insufficient amount")]
    InsufficientAmount,
    /// A reserve involved in a quote is empty, or an exact-out request
    /// would drain a reserve.
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    /// Zero input supplied to a quote.
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    /// Delivered output fell below the caller's minimum.
    #[error("insufficient output amount")]
    InsufficientOutputAmount,
    /// Required input exceeds the caller's maximum.
    #[error("excessive input amount")]
    ExcessiveInputAmount,
    /// Ratio-preserving deposit of token A fell below the caller's minimum.
    #[error("insufficient A amount")]
    InsufficientAAmount,
    /// Ratio-preserving deposit of token B fell below the caller's minimum.
    #[error("insufficient B amount")]
    InsufficientBAmount,
    /// Arithmetic overflow while composing amounts.
    #[error("arithmetic overflow")]
    Overflow,
    #[error(transparent)]
    Pair(#[from] PairError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    Token(#[from] TokenError),
}
