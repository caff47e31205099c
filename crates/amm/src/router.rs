//! Swap router.
//!
//! Translates user-facing swap and liquidity intents into pair calls across
//! multi-hop paths. The router holds no state beyond its own address and the
//! wrapped-native token id; every entry point takes the registry, the token
//! ledger, the calling address, and the current time explicitly.
//!
//! Two rules govern all execution here:
//! - **Measure, don't assume.** Each hop's input is read back off the pair's
//!   balance, and each hop's output is recomputed from that measured input,
//!   so tokens that take a fee on transfer cannot break the invariant
//!   anywhere along a path.
//! - **Skim once.** The treasury fee is one real token transfer per router
//!   call: split off the measured final output for exact-in swaps, taken
//!   from the computed required input for exact-out swaps.

use crate::error::{FactoryError, RouterError};
use crate::factory::Factory;
use crate::token::TokenLedger;
use crate::types::{
    Address, Amount, TokenId, U256, PER_MILLE, SWAP_FEE_RETAIN_PER_MILLE, TREASURY_FEE_PER_MILLE,
};
use tracing::debug;

/// Stateless orchestrator for swaps and liquidity operations.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    /// The router's own address: transient custodian for wrapped-native
    /// conversions and output-side treasury splits.
    address: Address,
    /// The wrapped-native token.
    weth: TokenId,
}

impl Router {
    /// Create a router bound to a wrapped-native token.
    pub fn new(address: Address, weth: TokenId) -> Self {
        Self { address, weth }
    }

    /// The router's own address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The wrapped-native token id.
    pub fn weth(&self) -> TokenId {
        self.weth
    }

    // --- pure quoting ---

    /// Ratio-preserving equivalent of `amount_a`: `amount_a * reserve_b /
    /// reserve_a`.
    pub fn quote(
        amount_a: Amount,
        reserve_a: Amount,
        reserve_b: Amount,
    ) -> Result<Amount, RouterError> {
        if amount_a.is_zero() {
            return Err(RouterError::InsufficientAmount);
        }
        if reserve_a.is_zero() || reserve_b.is_zero() {
            return Err(RouterError::InsufficientLiquidity);
        }
        amount_a
            .checked_mul(reserve_b)
            .map(|numerator| numerator / reserve_a)
            .ok_or(RouterError::Overflow)
    }

    /// Maximum output for an exact input against one pair's reserves.
    /// Floor division: rounding always favors the pair.
    pub fn get_amount_out(
        amount_in: Amount,
        reserve_in: Amount,
        reserve_out: Amount,
    ) -> Result<Amount, RouterError> {
        if amount_in.is_zero() {
            return Err(RouterError::InsufficientInputAmount);
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(RouterError::InsufficientLiquidity);
        }
        let amount_in_with_fee = amount_in
            .checked_mul(U256::from(SWAP_FEE_RETAIN_PER_MILLE))
            .ok_or(RouterError::Overflow)?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .ok_or(RouterError::Overflow)?;
        let denominator = reserve_in
            .checked_mul(U256::from(PER_MILLE))
            .ok_or(RouterError::Overflow)?
            .checked_add(amount_in_with_fee)
            .ok_or(RouterError::Overflow)?;
        Ok(numerator / denominator)
    }

    /// Minimum input for an exact output against one pair's reserves.
    /// The `+ 1` turns the floor into a ceiling, so the computed input is
    /// always sufficient. Fails if the request would drain the reserve.
    pub fn get_amount_in(
        amount_out: Amount,
        reserve_in: Amount,
        reserve_out: Amount,
    ) -> Result<Amount, RouterError> {
        if amount_out.is_zero() {
            return Err(RouterError::InsufficientOutputAmount);
        }
        if reserve_in.is_zero() || amount_out >= reserve_out {
            return Err(RouterError::InsufficientLiquidity);
        }
        let numerator = reserve_in
            .checked_mul(amount_out)
            .ok_or(RouterError::Overflow)?
            .checked_mul(U256::from(PER_MILLE))
            .ok_or(RouterError::Overflow)?;
        let denominator = (reserve_out - amount_out)
            .checked_mul(U256::from(SWAP_FEE_RETAIN_PER_MILLE))
            .ok_or(RouterError::Overflow)?;
        (numerator / denominator)
            .checked_add(U256::from(1))
            .ok_or(RouterError::Overflow)
    }

    /// Chain [`Self::get_amount_out`] forward along a path of >= 2 tokens.
    pub fn get_amounts_out(
        factory: &Factory,
        amount_in: Amount,
        path: &[TokenId],
    ) -> Result<Vec<Amount>, RouterError> {
        if path.len() < 2 {
            return Err(RouterError::InvalidPath);
        }
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for window in path.windows(2) {
            let (reserve_in, reserve_out) = Self::reserves_for(factory, window[0], window[1])?;
            let last = amounts[amounts.len() - 1];
            amounts.push(Self::get_amount_out(last, reserve_in, reserve_out)?);
        }
        Ok(amounts)
    }

    /// Chain [`Self::get_amount_in`] backward along a path of >= 2 tokens.
    pub fn get_amounts_in(
        factory: &Factory,
        amount_out: Amount,
        path: &[TokenId],
    ) -> Result<Vec<Amount>, RouterError> {
        if path.len() < 2 {
            return Err(RouterError::InvalidPath);
        }
        let mut amounts = vec![U256::ZERO; path.len()];
        amounts[path.len() - 1] = amount_out;
        for i in (1..path.len()).rev() {
            let (reserve_in, reserve_out) = Self::reserves_for(factory, path[i - 1], path[i])?;
            amounts[i - 1] = Self::get_amount_in(amounts[i], reserve_in, reserve_out)?;
        }
        Ok(amounts)
    }

    // --- liquidity ---

    /// Deposit both tokens at the current price ratio and mint liquidity
    /// shares to `to`. Creates the pair on first use. Returns
    /// `(amount_a, amount_b, liquidity)`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        token_a: TokenId,
        token_b: TokenId,
        amount_a_desired: Amount,
        amount_b_desired: Amount,
        amount_a_min: Amount,
        amount_b_min: Amount,
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<(Amount, Amount, Amount), RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let (amount_a, amount_b) = Self::liquidity_amounts(
                factory,
                token_a,
                token_b,
                amount_a_desired,
                amount_b_desired,
                amount_a_min,
                amount_b_min,
            )?;
            let pair_address = factory
                .get_pair(token_a, token_b)
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(token_a, router.address, caller, pair_address, amount_a)?;
            ledger.transfer_from(token_b, router.address, caller, pair_address, amount_b)?;
            let fee_to = factory.fee_to();
            let pair = factory.pair_mut(token_a, token_b)?;
            let liquidity = pair.mint(ledger, fee_to, to, now)?;
            debug!(
                target: "amm::router",
                %token_a, %token_b, %amount_a, %amount_b, %liquidity,
                "add liquidity"
            );
            Ok((amount_a, amount_b, liquidity))
        })
    }

    /// [`Self::add_liquidity`] with the second side paid in native currency.
    /// Only the native amount actually used is wrapped; any excess attached
    /// value never leaves the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_eth(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        token: TokenId,
        amount_token_desired: Amount,
        amount_token_min: Amount,
        amount_eth_min: Amount,
        to: Address,
        deadline: u64,
        now: u64,
        value: Amount,
    ) -> Result<(Amount, Amount, Amount), RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let (amount_token, amount_eth) = Self::liquidity_amounts(
                factory,
                token,
                router.weth,
                amount_token_desired,
                value,
                amount_token_min,
                amount_eth_min,
            )?;
            let pair_address = factory
                .get_pair(token, router.weth)
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(token, router.address, caller, pair_address, amount_token)?;
            ledger.deposit(caller, pair_address, amount_eth)?;
            let fee_to = factory.fee_to();
            let pair = factory.pair_mut(token, router.weth)?;
            let liquidity = pair.mint(ledger, fee_to, to, now)?;
            Ok((amount_token, amount_eth, liquidity))
        })
    }

    /// Burn `liquidity` shares and send both tokens to `to`. Returns
    /// `(amount_a, amount_b)` in argument order.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        token_a: TokenId,
        token_b: TokenId,
        liquidity: Amount,
        amount_a_min: Amount,
        amount_b_min: Amount,
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<(Amount, Amount), RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let pair_address = factory
                .get_pair(token_a, token_b)
                .ok_or(FactoryError::PairNotFound)?;
            let fee_to = factory.fee_to();
            let (token0, _) = Factory::sort_tokens(token_a, token_b)?;
            let pair = factory.pair_mut(token_a, token_b)?;
            // Pull the shares into the pair, then redeem them.
            pair.transfer_from(router.address, caller, pair_address, liquidity)?;
            let (amount0, amount1) = pair.burn(ledger, fee_to, to, now)?;
            let (amount_a, amount_b) = if token_a == token0 {
                (amount0, amount1)
            } else {
                (amount1, amount0)
            };
            if amount_a < amount_a_min {
                return Err(RouterError::InsufficientAAmount);
            }
            if amount_b < amount_b_min {
                return Err(RouterError::InsufficientBAmount);
            }
            debug!(
                target: "amm::router",
                %token_a, %token_b, %amount_a, %amount_b, %liquidity,
                "remove liquidity"
            );
            Ok((amount_a, amount_b))
        })
    }

    /// [`Self::remove_liquidity`] against the wrapped-native pair, unwrapping
    /// the native side to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_eth(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        token: TokenId,
        liquidity: Amount,
        amount_token_min: Amount,
        amount_eth_min: Amount,
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<(Amount, Amount), RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let (amount_token, amount_eth) = router.remove_liquidity(
                factory,
                ledger,
                caller,
                token,
                router.weth,
                liquidity,
                amount_token_min,
                amount_eth_min,
                router.address,
                deadline,
                now,
            )?;
            // Forward the token side, unwrap the native side.
            ledger.transfer(token, router.address, to, amount_token)?;
            ledger.withdraw(router.address, to, amount_eth)?;
            Ok((amount_token, amount_eth))
        })
    }

    // --- swaps: exact input ---

    /// Swap an exact input along `path`, delivering at least
    /// `amount_out_min` of the final token to `to`. The treasury skim is
    /// split off the measured final output before delivery.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_tokens_for_tokens(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_out(factory, amount_in, path)?;
            if *amounts.last().unwrap_or(&U256::ZERO) < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(path[0], router.address, caller, first_pair, amount_in)?;

            let delivered = router.deliver_with_output_skim(factory, ledger, path, to, now)?;
            if delivered < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            Ok(amounts)
        })
    }

    /// Exact-in swap paying with attached native currency; `path` must start
    /// with the wrapped-native token.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_eth_for_tokens(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_out_min: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
        value: Amount,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        if path.len() < 2 || path[0] != self.weth {
            return Err(RouterError::InvalidPath);
        }
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_out(factory, value, path)?;
            if *amounts.last().unwrap_or(&U256::ZERO) < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.deposit(caller, first_pair, value)?;

            let delivered = router.deliver_with_output_skim(factory, ledger, path, to, now)?;
            if delivered < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            Ok(amounts)
        })
    }

    /// Exact-in swap delivering native currency; `path` must end with the
    /// wrapped-native token.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_exact_tokens_for_eth(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        if path.len() < 2 || path[path.len() - 1] != self.weth {
            return Err(RouterError::InvalidPath);
        }
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_out(factory, amount_in, path)?;
            if *amounts.last().unwrap_or(&U256::ZERO) < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(path[0], router.address, caller, first_pair, amount_in)?;

            // Receive the wrapped output on the router, skim, unwrap to `to`.
            let treasury = factory.treasury();
            let before = ledger.balance_of(router.weth, router.address);
            router.execute_swaps(factory, ledger, path, router.address, now)?;
            let received = ledger.balance_of(router.weth, router.address) - before;
            let (fee, net_out) = treasury_split(received);
            if net_out < amount_out_min {
                return Err(RouterError::InsufficientOutputAmount);
            }
            if !fee.is_zero() {
                ledger.transfer(router.weth, router.address, treasury, fee)?;
            }
            ledger.withdraw(router.address, to, net_out)?;
            Ok(amounts)
        })
    }

    // --- swaps: exact output ---

    /// Swap up to `amount_in_max` of the first token for `amount_out` of the
    /// last. The treasury skim is taken from the computed required input:
    /// 2% of it goes to the treasury and the remaining 98% feeds the first
    /// pair, so `to` receives proportionally less than the nominal request.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_tokens_for_exact_tokens(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_in(factory, amount_out, path)?;
            if amounts[0] > amount_in_max {
                return Err(RouterError::ExcessiveInputAmount);
            }
            let treasury = factory.treasury();
            let (fee, net_in) = treasury_split(amounts[0]);
            if !fee.is_zero() {
                ledger.transfer_from(path[0], router.address, caller, treasury, fee)?;
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(path[0], router.address, caller, first_pair, net_in)?;

            router.execute_swaps(factory, ledger, path, to, now)?;
            Ok(amounts)
        })
    }

    /// Exact-out swap paying with attached native currency (`value` is the
    /// input ceiling); only the required input is wrapped and debited.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_eth_for_exact_tokens(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_out: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
        value: Amount,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        if path.len() < 2 || path[0] != self.weth {
            return Err(RouterError::InvalidPath);
        }
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_in(factory, amount_out, path)?;
            if amounts[0] > value {
                return Err(RouterError::ExcessiveInputAmount);
            }
            // Wrap only the required input; excess value stays native with
            // the caller.
            let treasury = factory.treasury();
            let (fee, net_in) = treasury_split(amounts[0]);
            ledger.deposit(caller, router.address, amounts[0])?;
            if !fee.is_zero() {
                ledger.transfer(router.weth, router.address, treasury, fee)?;
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer(router.weth, router.address, first_pair, net_in)?;

            router.execute_swaps(factory, ledger, path, to, now)?;
            Ok(amounts)
        })
    }

    /// Exact-out swap delivering native currency; the treasury skim is taken
    /// from the input token, the wrapped output is unwrapped to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn swap_tokens_for_exact_eth(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        caller: Address,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[TokenId],
        to: Address,
        deadline: u64,
        now: u64,
    ) -> Result<Vec<Amount>, RouterError> {
        Self::ensure_deadline(now, deadline)?;
        if path.len() < 2 || path[path.len() - 1] != self.weth {
            return Err(RouterError::InvalidPath);
        }
        let router = *self;
        transactional(factory, ledger, move |factory, ledger| {
            let amounts = Self::get_amounts_in(factory, amount_out, path)?;
            if amounts[0] > amount_in_max {
                return Err(RouterError::ExcessiveInputAmount);
            }
            let treasury = factory.treasury();
            let (fee, net_in) = treasury_split(amounts[0]);
            if !fee.is_zero() {
                ledger.transfer_from(path[0], router.address, caller, treasury, fee)?;
            }
            let first_pair = factory
                .get_pair(path[0], path[1])
                .ok_or(FactoryError::PairNotFound)?;
            ledger.transfer_from(path[0], router.address, caller, first_pair, net_in)?;

            // Receive the wrapped output on the router, unwrap it all to `to`.
            let before = ledger.balance_of(router.weth, router.address);
            router.execute_swaps(factory, ledger, path, router.address, now)?;
            let received = ledger.balance_of(router.weth, router.address) - before;
            ledger.withdraw(router.address, to, received)?;
            Ok(amounts)
        })
    }

    // --- internals ---

    /// Execute the hops of a path. Each hop's input is measured off the
    /// pair's balance and its output recomputed from that measurement;
    /// intermediate outputs go directly to the next pair, the last to `to`.
    fn execute_swaps(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        path: &[TokenId],
        to: Address,
        now: u64,
    ) -> Result<(), RouterError> {
        for i in 0..path.len() - 1 {
            let (input, output) = (path[i], path[i + 1]);
            let recipient = if i < path.len() - 2 {
                factory
                    .get_pair(path[i + 1], path[i + 2])
                    .ok_or(FactoryError::PairNotFound)?
            } else {
                to
            };
            let pair = factory.pair_mut(input, output)?;
            let (reserve0, reserve1, _) = pair.get_reserves();
            let (reserve_in, reserve_out) = if input == pair.token0() {
                (reserve0, reserve1)
            } else {
                (reserve1, reserve0)
            };
            let amount_in = ledger
                .balance_of(input, pair.address())
                .checked_sub(reserve_in)
                .ok_or(RouterError::Overflow)?;
            let amount_out = Self::get_amount_out(amount_in, reserve_in, reserve_out)?;
            let (amount0_out, amount1_out) = if input == pair.token0() {
                (U256::ZERO, amount_out)
            } else {
                (amount_out, U256::ZERO)
            };
            pair.swap(amount0_out, amount1_out, recipient, ledger, now, None)?;
        }
        Ok(())
    }

    /// Run a path into the router, split the treasury skim off the measured
    /// output, and deliver the remainder to `to`. Returns the net amount
    /// forwarded to `to` (before any deflation on that final transfer).
    fn deliver_with_output_skim(
        &self,
        factory: &mut Factory,
        ledger: &mut TokenLedger,
        path: &[TokenId],
        to: Address,
        now: u64,
    ) -> Result<Amount, RouterError> {
        let out_token = path[path.len() - 1];
        let treasury = factory.treasury();
        let before = ledger.balance_of(out_token, self.address);
        self.execute_swaps(factory, ledger, path, self.address, now)?;
        let received = ledger.balance_of(out_token, self.address) - before;
        let (fee, net_out) = treasury_split(received);
        if !fee.is_zero() {
            ledger.transfer(out_token, self.address, treasury, fee)?;
        }
        ledger.transfer(out_token, self.address, to, net_out)?;
        debug!(
            target: "amm::router",
            %out_token, %received, treasury_fee = %fee, "output skim"
        );
        Ok(net_out)
    }

    /// Pick deposit amounts that preserve the current price ratio, creating
    /// the pair on first use. An empty pair accepts the desired amounts.
    fn liquidity_amounts(
        factory: &mut Factory,
        token_a: TokenId,
        token_b: TokenId,
        amount_a_desired: Amount,
        amount_b_desired: Amount,
        amount_a_min: Amount,
        amount_b_min: Amount,
    ) -> Result<(Amount, Amount), RouterError> {
        if factory.get_pair(token_a, token_b).is_none() {
            factory.create_pair(token_a, token_b)?;
        }
        let (reserve_a, reserve_b) = Self::reserves_for(factory, token_a, token_b)?;
        if reserve_a.is_zero() && reserve_b.is_zero() {
            return Ok((amount_a_desired, amount_b_desired));
        }
        let amount_b_optimal = Self::quote(amount_a_desired, reserve_a, reserve_b)?;
        if amount_b_optimal <= amount_b_desired {
            if amount_b_optimal < amount_b_min {
                return Err(RouterError::InsufficientBAmount);
            }
            Ok((amount_a_desired, amount_b_optimal))
        } else {
            let amount_a_optimal = Self::quote(amount_b_desired, reserve_b, reserve_a)?;
            debug_assert!(amount_a_optimal <= amount_a_desired);
            if amount_a_optimal < amount_a_min {
                return Err(RouterError::InsufficientAAmount);
            }
            Ok((amount_a_optimal, amount_b_desired))
        }
    }

    /// Reserves of the pair for (token_in, token_out), in that orientation.
    fn reserves_for(
        factory: &Factory,
        token_in: TokenId,
        token_out: TokenId,
    ) -> Result<(Amount, Amount), RouterError> {
        let pair = factory.pair(token_in, token_out)?;
        let (reserve0, reserve1, _) = pair.get_reserves();
        if token_in == pair.token0() {
            Ok((reserve0, reserve1))
        } else {
            Ok((reserve1, reserve0))
        }
    }

    fn ensure_deadline(now: u64, deadline: u64) -> Result<(), RouterError> {
        if now > deadline {
            return Err(RouterError::Expired);
        }
        Ok(())
    }
}

/// Split an amount into (treasury fee, remainder).
fn treasury_split(amount: Amount) -> (Amount, Amount) {
    let fee = amount * U256::from(TREASURY_FEE_PER_MILLE) / U256::from(PER_MILLE);
    (fee, amount - fee)
}

/// Run `f` against the registry and token ledger, restoring both from
/// snapshots on any error so a failed multi-hop call leaves no partial
/// transfers behind.
fn transactional<T>(
    factory: &mut Factory,
    ledger: &mut TokenLedger,
    f: impl FnOnce(&mut Factory, &mut TokenLedger) -> Result<T, RouterError>,
) -> Result<T, RouterError> {
    let factory_snapshot = factory.clone();
    let ledger_snapshot = ledger.clone();
    match f(factory, ledger) {
        Ok(value) => Ok(value),
        Err(err) => {
            *factory = factory_snapshot;
            *ledger = ledger_snapshot;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    #[test]
    fn test_get_amount_out_worked_value() {
        let out = Router::get_amount_out(ether(1000), ether(10_000), ether(10_000)).unwrap();
        assert_eq!(out, "909090909090909090909".parse::<U256>().unwrap());
    }

    #[test]
    fn test_get_amount_in_worked_value() {
        let input = Router::get_amount_in(ether(1000), ether(10_000), ether(10_000)).unwrap();
        assert_eq!(input, "1111111111111111111112".parse::<U256>().unwrap());
    }

    #[test]
    fn test_get_amount_out_rejects_degenerate_inputs() {
        assert_eq!(
            Router::get_amount_out(U256::ZERO, ether(1), ether(1)),
            Err(RouterError::InsufficientInputAmount)
        );
        assert_eq!(
            Router::get_amount_out(ether(1), U256::ZERO, ether(1)),
            Err(RouterError::InsufficientLiquidity)
        );
        assert_eq!(
            Router::get_amount_out(ether(1), ether(1), U256::ZERO),
            Err(RouterError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_get_amount_in_rejects_reserve_drain() {
        // Cannot take a reserve to zero (or beyond).
        assert_eq!(
            Router::get_amount_in(ether(10), ether(10), ether(10)),
            Err(RouterError::InsufficientLiquidity)
        );
        assert_eq!(
            Router::get_amount_in(ether(11), ether(10), ether(10)),
            Err(RouterError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_quote_preserves_ratio() {
        assert_eq!(
            Router::quote(ether(5), ether(100), ether(200)).unwrap(),
            ether(10)
        );
        assert_eq!(
            Router::quote(U256::ZERO, ether(1), ether(1)),
            Err(RouterError::InsufficientAmount)
        );
        assert_eq!(
            Router::quote(ether(1), U256::ZERO, ether(1)),
            Err(RouterError::InsufficientLiquidity)
        );
    }

    #[test]
    fn test_short_path_rejected() {
        let factory = crate::factory::Factory::new(Address::repeat_byte(0xA0));
        let path = [Address::repeat_byte(0x01)];
        assert_eq!(
            Router::get_amounts_out(&factory, ether(1), &path),
            Err(RouterError::InvalidPath)
        );
        assert_eq!(
            Router::get_amounts_in(&factory, ether(1), &path),
            Err(RouterError::InvalidPath)
        );
    }

    #[test]
    fn test_treasury_split_is_two_percent() {
        let (fee, net) = treasury_split(ether(100));
        assert_eq!(fee, ether(2));
        assert_eq!(net, ether(98));
    }

    proptest! {
        /// Output is always strictly below the no-slippage spot quote:
        /// out * r_in < in * r_out.
        #[test]
        fn prop_amount_out_below_spot(
            amount_in in 1u128..=u128::from(u64::MAX),
            reserve_in in 1u128..=1u128 << 100,
            reserve_out in 1u128..=1u128 << 100,
        ) {
            let amount_in = U256::from(amount_in);
            let reserve_in = U256::from(reserve_in);
            let reserve_out = U256::from(reserve_out);
            let out = Router::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
            prop_assert!(out * reserve_in < amount_in * reserve_out);
            prop_assert!(out < reserve_out);
        }

        /// The ceiling inverse never under-quotes the required input.
        #[test]
        fn prop_amount_in_covers_amount_out(
            amount_in in 1u128..=u128::from(u64::MAX),
            reserve_in in 1u128..=1u128 << 100,
            reserve_out in 2u128..=1u128 << 100,
        ) {
            let amount_in = U256::from(amount_in);
            let reserve_in = U256::from(reserve_in);
            let reserve_out = U256::from(reserve_out);
            let out = Router::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
            prop_assume!(!out.is_zero());
            let needed = Router::get_amount_in(out, reserve_in, reserve_out).unwrap();
            // A smaller quoted input must still produce the same output.
            let covered = needed >= amount_in
                || Router::get_amount_out(needed, reserve_in, reserve_out).unwrap() >= out;
            prop_assert!(covered);
        }
    }
}
