//! In-memory constant-product AMM engine for trading ETH and ERC-20 style
//! tokens.
//!
//! This library provides a Uniswap-V2-style exchange core with:
//! - Constant-product pairs with balance-difference accounting
//! - Deterministic pair registry with fee and treasury administration
//! - Multi-hop swap routing with a per-call treasury skim
//! - Fee-on-transfer ("deflating") token tolerance via measured execution
//! - Native-currency entry points over a wrapped-native token

pub mod error;
pub mod factory;
pub mod math;
pub mod pair;
pub mod router;
pub mod token;
pub mod types;

pub use error::{FactoryError, PairError, RouterError, TokenError};
pub use factory::Factory;
pub use pair::{Pair, SwapCallback};
pub use router::Router;
pub use token::TokenLedger;
pub use types::{Address, Amount, TokenId, U256, MINIMUM_LIQUIDITY, TREASURY_FEE_PER_MILLE};
