//! Reserve ledger for one trading pair.
//!
//! A [`Pair`] owns two token reserves, the constant-product invariant, the
//! fungible liquidity-share token, and the cumulative price accumulators.
//! Tokens are always moved into the pair *before* calling `mint`/`swap`; the
//! pair credits what it actually measures on its own balance, never what the
//! caller claims to have sent, so fee-on-transfer tokens cannot desynchronize
//! the ledger.
//!
//! Every mutating entry point is guarded by a per-pair lock and runs
//! atomically: on any error the pair and the token ledger are restored to
//! their pre-call state.

use crate::error::PairError;
use crate::math::{price_accumulator_delta, sqrt};
use crate::token::TokenLedger;
use crate::types::{
    max_reserve, Address, Amount, TokenId, U256, LOCKED_LIQUIDITY_ADDRESS, MINIMUM_LIQUIDITY,
    PER_MILLE, SWAP_FEE_RETAIN_PER_MILLE,
};
use std::collections::HashMap;
use tracing::debug;

/// Liquidity-share token metadata.
pub const LIQUIDITY_TOKEN_NAME: &str = "AMM Liquidity";
pub const LIQUIDITY_TOKEN_SYMBOL: &str = "AMM-LP";
pub const LIQUIDITY_TOKEN_DECIMALS: u8 = 18;

/// Flash callback invoked by [`Pair::swap`] after the optimistic output
/// transfers and before the invariant check. The callback may move tokens
/// into the pair (repaying a flash withdrawal); a reentrant call into the
/// same pair fails with [`PairError::Reentrancy`].
pub type SwapCallback<'a> = &'a mut dyn FnMut(&mut Pair, &mut TokenLedger) -> Result<(), PairError>;

/// Reserve ledger and liquidity-share token for one token pair.
///
/// `token0 < token1` in the canonical sort order fixed at creation.
#[derive(Debug, Clone)]
pub struct Pair {
    address: Address,
    token0: TokenId,
    token1: TokenId,
    reserve0: U256,
    reserve1: U256,
    /// Timestamp of the last reserve update, modulo 2^32.
    block_timestamp_last: u32,
    price0_cumulative_last: U256,
    price1_cumulative_last: U256,
    /// reserve0 * reserve1 recorded after the most recent liquidity event,
    /// used to meter the protocol fee.
    k_last: U256,
    total_supply: U256,
    share_balances: HashMap<Address, U256>,
    share_allowances: HashMap<(Address, Address), U256>,
    locked: bool,
}

impl Pair {
    /// Create an empty pair. The factory supplies the canonical token order.
    pub fn new(address: Address, token0: TokenId, token1: TokenId) -> Self {
        Self {
            address,
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            block_timestamp_last: 0,
            price0_cumulative_last: U256::ZERO,
            price1_cumulative_last: U256::ZERO,
            k_last: U256::ZERO,
            total_supply: U256::ZERO,
            share_balances: HashMap::new(),
            share_allowances: HashMap::new(),
            locked: false,
        }
    }

    /// The pair's own address (holder of the pooled reserves).
    pub fn address(&self) -> Address {
        self.address
    }

    /// First token in canonical order.
    pub fn token0(&self) -> TokenId {
        self.token0
    }

    /// Second token in canonical order.
    pub fn token1(&self) -> TokenId {
        self.token1
    }

    /// Current reserves and the timestamp of their last update.
    pub fn get_reserves(&self) -> (Amount, Amount, u32) {
        (self.reserve0, self.reserve1, self.block_timestamp_last)
    }

    /// Cumulative (reserve1/reserve0) * elapsed-time, UQ112.112, wrapping.
    pub fn price0_cumulative_last(&self) -> U256 {
        self.price0_cumulative_last
    }

    /// Cumulative (reserve0/reserve1) * elapsed-time, UQ112.112, wrapping.
    pub fn price1_cumulative_last(&self) -> U256 {
        self.price1_cumulative_last
    }

    /// Reserve product as of the last liquidity-changing operation.
    pub fn k_last(&self) -> U256 {
        self.k_last
    }

    // --- liquidity-share token ---

    /// Share token name.
    pub fn name(&self) -> &'static str {
        LIQUIDITY_TOKEN_NAME
    }

    /// Share token symbol.
    pub fn symbol(&self) -> &'static str {
        LIQUIDITY_TOKEN_SYMBOL
    }

    /// Share token decimals.
    pub fn decimals(&self) -> u8 {
        LIQUIDITY_TOKEN_DECIMALS
    }

    /// Total liquidity shares outstanding.
    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Liquidity-share balance of `owner`.
    pub fn balance_of(&self, owner: Address) -> Amount {
        self.share_balances
            .get(&owner)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Remaining share allowance of `spender` over `owner`.
    pub fn allowance(&self, owner: Address, spender: Address) -> Amount {
        self.share_allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Grant `spender` the right to move `owner`'s shares.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: Amount) {
        self.share_allowances.insert((owner, spender), amount);
    }

    /// Move liquidity shares between owners.
    pub fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), PairError> {
        self.debit_shares(from, amount)?;
        self.credit_shares(to, amount)
    }

    /// Move `owner`'s shares spending `spender`'s allowance.
    /// `U256::MAX` allowances are unlimited and never decremented.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PairError> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(PairError::InsufficientShareAllowance);
        }
        if allowed != U256::MAX {
            self.share_allowances.insert((owner, spender), allowed - amount);
        }
        self.transfer(owner, to, amount)
    }

    // --- reserve-mutating entry points ---

    /// Credit liquidity shares for tokens already transferred into the pair.
    ///
    /// Deposited amounts are measured as balance deltas, so deflating tokens
    /// credit only what actually arrived. The first deposit permanently locks
    /// [`MINIMUM_LIQUIDITY`] shares; later deposits mint against the
    /// liquidity-constrained side so an imbalanced deposit cannot dilute
    /// existing holders.
    pub fn mint(
        &mut self,
        ledger: &mut TokenLedger,
        fee_to: Option<Address>,
        to: Address,
        now: u64,
    ) -> Result<Amount, PairError> {
        self.guarded(ledger, |pair, ledger| {
            let (reserve0, reserve1, _) = pair.get_reserves();
            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            let amount0 = balance0.checked_sub(reserve0).ok_or(PairError::Overflow)?;
            let amount1 = balance1.checked_sub(reserve1).ok_or(PairError::Overflow)?;

            let fee_on = pair.mint_protocol_fee(fee_to, reserve0, reserve1)?;
            let total_supply = pair.total_supply;
            let liquidity = if total_supply.is_zero() {
                let initial = sqrt(amount0.checked_mul(amount1).ok_or(PairError::Overflow)?);
                let locked = U256::from(MINIMUM_LIQUIDITY);
                if initial <= locked {
                    return Err(PairError::InsufficientLiquidityMinted);
                }
                pair.credit_shares_minting(LOCKED_LIQUIDITY_ADDRESS, locked)?;
                initial - locked
            } else {
                let by0 = amount0
                    .checked_mul(total_supply)
                    .ok_or(PairError::Overflow)?
                    / reserve0;
                let by1 = amount1
                    .checked_mul(total_supply)
                    .ok_or(PairError::Overflow)?
                    / reserve1;
                by0.min(by1)
            };
            if liquidity.is_zero() {
                return Err(PairError::InsufficientLiquidityMinted);
            }
            pair.credit_shares_minting(to, liquidity)?;

            pair.update(balance0, balance1, reserve0, reserve1, now)?;
            if fee_on {
                pair.k_last = pair
                    .reserve0
                    .checked_mul(pair.reserve1)
                    .ok_or(PairError::Overflow)?;
            }
            debug!(target: "amm::pair", pair = %pair.address, %amount0, %amount1, %liquidity, "mint");
            Ok(liquidity)
        })
    }

    /// Redeem liquidity shares already transferred into the pair for a
    /// pro-rata cut of the *actual* balances (not the possibly stale
    /// reserves). Returns the amounts sent out, in token order.
    pub fn burn(
        &mut self,
        ledger: &mut TokenLedger,
        fee_to: Option<Address>,
        to: Address,
        now: u64,
    ) -> Result<(Amount, Amount), PairError> {
        self.guarded(ledger, |pair, ledger| {
            let (reserve0, reserve1, _) = pair.get_reserves();
            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            let liquidity = pair.balance_of(pair.address);

            let fee_on = pair.mint_protocol_fee(fee_to, reserve0, reserve1)?;
            let total_supply = pair.total_supply;
            let amount0 = liquidity
                .checked_mul(balance0)
                .ok_or(PairError::Overflow)?
                / total_supply;
            let amount1 = liquidity
                .checked_mul(balance1)
                .ok_or(PairError::Overflow)?
                / total_supply;
            if amount0.is_zero() || amount1.is_zero() {
                return Err(PairError::InsufficientLiquidityBurned);
            }
            pair.burn_shares(pair.address, liquidity)?;
            let to_addr = to;
            ledger.transfer(pair.token0, pair.address, to_addr, amount0)?;
            ledger.transfer(pair.token1, pair.address, to_addr, amount1)?;

            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            pair.update(balance0, balance1, reserve0, reserve1, now)?;
            if fee_on {
                pair.k_last = pair
                    .reserve0
                    .checked_mul(pair.reserve1)
                    .ok_or(PairError::Overflow)?;
            }
            debug!(target: "amm::pair", pair = %pair.address, %amount0, %amount1, %liquidity, "burn");
            Ok((amount0, amount1))
        })
    }

    /// Swap against the reserves. Inputs must already sit on the pair's
    /// balance (or arrive inside `callback`); outputs are transferred
    /// optimistically, then the fee-adjusted product of the measured balances
    /// must not fall below the reserve product. The optimistic order is what
    /// permits flash-style withdrawal: take outputs first, repay in the
    /// callback, and the invariant check settles the difference.
    pub fn swap(
        &mut self,
        amount0_out: Amount,
        amount1_out: Amount,
        to: Address,
        ledger: &mut TokenLedger,
        now: u64,
        mut callback: Option<SwapCallback<'_>>,
    ) -> Result<(), PairError> {
        self.guarded(ledger, |pair, ledger| {
            if amount0_out.is_zero() && amount1_out.is_zero() {
                return Err(PairError::InsufficientOutputAmount);
            }
            let (reserve0, reserve1, _) = pair.get_reserves();
            if amount0_out >= reserve0 || amount1_out >= reserve1 {
                return Err(PairError::InsufficientLiquidity);
            }
            if to == pair.token0 || to == pair.token1 {
                return Err(PairError::InvalidRecipient);
            }

            if !amount0_out.is_zero() {
                ledger.transfer(pair.token0, pair.address, to, amount0_out)?;
            }
            if !amount1_out.is_zero() {
                ledger.transfer(pair.token1, pair.address, to, amount1_out)?;
            }
            if let Some(cb) = callback.as_mut() {
                cb(pair, ledger)?;
            }

            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            let amount0_in = measured_input(balance0, reserve0, amount0_out);
            let amount1_in = measured_input(balance1, reserve1, amount1_out);
            if amount0_in.is_zero() && amount1_in.is_zero() {
                return Err(PairError::InsufficientInputAmount);
            }

            // Adjusted-balance check shares the retention factor with the
            // router's quoting formulas, so an honestly quoted swap always
            // lands exactly on (or above) the invariant.
            let fee = U256::from(PER_MILLE - SWAP_FEE_RETAIN_PER_MILLE);
            let scale = U256::from(PER_MILLE);
            let balance0_adjusted = balance0
                .checked_mul(scale)
                .ok_or(PairError::Overflow)?
                .checked_sub(amount0_in.checked_mul(fee).ok_or(PairError::Overflow)?)
                .ok_or(PairError::Overflow)?;
            let balance1_adjusted = balance1
                .checked_mul(scale)
                .ok_or(PairError::Overflow)?
                .checked_sub(amount1_in.checked_mul(fee).ok_or(PairError::Overflow)?)
                .ok_or(PairError::Overflow)?;
            let lhs = balance0_adjusted
                .checked_mul(balance1_adjusted)
                .ok_or(PairError::Overflow)?;
            let rhs = reserve0
                .checked_mul(reserve1)
                .ok_or(PairError::Overflow)?
                .checked_mul(scale * scale)
                .ok_or(PairError::Overflow)?;
            if lhs < rhs {
                return Err(PairError::InvariantViolation);
            }

            pair.update(balance0, balance1, reserve0, reserve1, now)?;
            debug!(
                target: "amm::pair",
                pair = %pair.address,
                %amount0_in, %amount1_in, %amount0_out, %amount1_out, %to,
                "swap"
            );
            Ok(())
        })
    }

    /// Transfer any balance above the recorded reserves to `to`.
    pub fn skim(&mut self, ledger: &mut TokenLedger, to: Address) -> Result<(), PairError> {
        self.guarded(ledger, |pair, ledger| {
            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            let excess0 = balance0.checked_sub(pair.reserve0).ok_or(PairError::Overflow)?;
            let excess1 = balance1.checked_sub(pair.reserve1).ok_or(PairError::Overflow)?;
            if !excess0.is_zero() {
                ledger.transfer(pair.token0, pair.address, to, excess0)?;
            }
            if !excess1.is_zero() {
                ledger.transfer(pair.token1, pair.address, to, excess1)?;
            }
            Ok(())
        })
    }

    /// Reset recorded reserves to the actual balances — the recovery path
    /// for a pair whose balances drifted (e.g. a donation without `mint`).
    pub fn sync(&mut self, ledger: &mut TokenLedger, now: u64) -> Result<(), PairError> {
        self.guarded(ledger, |pair, ledger| {
            let balance0 = ledger.balance_of(pair.token0, pair.address);
            let balance1 = ledger.balance_of(pair.token1, pair.address);
            let (reserve0, reserve1, _) = pair.get_reserves();
            pair.update(balance0, balance1, reserve0, reserve1, now)
        })
    }

    // --- internals ---

    /// Acquire the reentrancy lock and run `f` atomically: on error the pair
    /// and token ledger snapshots are restored, so no partial transfers
    /// survive a failed call.
    fn guarded<T>(
        &mut self,
        ledger: &mut TokenLedger,
        f: impl FnOnce(&mut Self, &mut TokenLedger) -> Result<T, PairError>,
    ) -> Result<T, PairError> {
        if self.locked {
            return Err(PairError::Reentrancy);
        }
        let pair_snapshot = self.clone();
        let ledger_snapshot = ledger.clone();
        self.locked = true;
        match f(self, ledger) {
            Ok(value) => {
                self.locked = false;
                Ok(value)
            }
            Err(err) => {
                *self = pair_snapshot;
                *ledger = ledger_snapshot;
                Err(err)
            }
        }
    }

    /// Mint the protocol-fee shares owed since the last liquidity event:
    /// growth in sqrt(k) accrues 1/6th to `fee_to` via
    /// `total_supply * (rootK - rootKLast) / (5*rootK + rootKLast)`.
    /// Returns whether the fee is switched on.
    fn mint_protocol_fee(
        &mut self,
        fee_to: Option<Address>,
        reserve0: Amount,
        reserve1: Amount,
    ) -> Result<bool, PairError> {
        let Some(fee_to) = fee_to else {
            self.k_last = U256::ZERO;
            return Ok(false);
        };
        if !self.k_last.is_zero() {
            let root_k = sqrt(reserve0.checked_mul(reserve1).ok_or(PairError::Overflow)?);
            let root_k_last = sqrt(self.k_last);
            if root_k > root_k_last {
                let numerator = self
                    .total_supply
                    .checked_mul(root_k - root_k_last)
                    .ok_or(PairError::Overflow)?;
                let denominator = root_k
                    .checked_mul(U256::from(5))
                    .ok_or(PairError::Overflow)?
                    .checked_add(root_k_last)
                    .ok_or(PairError::Overflow)?;
                let liquidity = numerator / denominator;
                if !liquidity.is_zero() {
                    self.credit_shares_minting(fee_to, liquidity)?;
                }
            }
        }
        Ok(true)
    }

    /// Write new reserves, advancing the price accumulators with the
    /// *previous* reserves over the elapsed time first.
    fn update(
        &mut self,
        balance0: Amount,
        balance1: Amount,
        reserve0: Amount,
        reserve1: Amount,
        now: u64,
    ) -> Result<(), PairError> {
        let max = max_reserve();
        if balance0 > max || balance1 > max {
            return Err(PairError::Overflow);
        }
        let block_timestamp = (now % (1u64 << 32)) as u32;
        let time_elapsed = block_timestamp.wrapping_sub(self.block_timestamp_last);
        if time_elapsed > 0 && !reserve0.is_zero() && !reserve1.is_zero() {
            self.price0_cumulative_last = self
                .price0_cumulative_last
                .wrapping_add(price_accumulator_delta(reserve1, reserve0, time_elapsed));
            self.price1_cumulative_last = self
                .price1_cumulative_last
                .wrapping_add(price_accumulator_delta(reserve0, reserve1, time_elapsed));
        }
        self.reserve0 = balance0;
        self.reserve1 = balance1;
        self.block_timestamp_last = block_timestamp;
        debug!(target: "amm::pair", pair = %self.address, %balance0, %balance1, "sync");
        Ok(())
    }

    fn credit_shares_minting(&mut self, to: Address, amount: Amount) -> Result<(), PairError> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(PairError::Overflow)?;
        self.credit_shares(to, amount)
    }

    fn burn_shares(&mut self, from: Address, amount: Amount) -> Result<(), PairError> {
        self.debit_shares(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    fn credit_shares(&mut self, to: Address, amount: Amount) -> Result<(), PairError> {
        let balance = self.share_balances.entry(to).or_insert(U256::ZERO);
        *balance = balance.checked_add(amount).ok_or(PairError::Overflow)?;
        Ok(())
    }

    fn debit_shares(&mut self, from: Address, amount: Amount) -> Result<(), PairError> {
        let balance = self.share_balances.entry(from).or_insert(U256::ZERO);
        if *balance < amount {
            return Err(PairError::InsufficientShareBalance);
        }
        *balance -= amount;
        Ok(())
    }
}

/// Input measured from the balance delta: anything above
/// `reserve - amount_out` must have been transferred in during this call.
fn measured_input(balance: Amount, reserve: Amount, amount_out: Amount) -> Amount {
    let floor = reserve - amount_out;
    if balance > floor {
        balance - floor
    } else {
        U256::ZERO
    }
}
