//! In-memory fungible-token ledger.
//!
//! The engine treats token contracts as external collaborators: it only ever
//! calls `balance_of` / `transfer` / `transfer_from` / `approve`, plus
//! `deposit` / `withdraw` on the wrapped-native token. This ledger implements
//! that interface for every token in one place, including tokens that take a
//! fee on transfer ("deflating" tokens) — a transfer debits the sender the
//! nominal amount but may deliver less, so callers must re-measure balances
//! rather than trust the requested amount.

use crate::error::TokenError;
use crate::types::{Address, Amount, TokenId, U256};
use std::collections::HashMap;

/// Basis-point scale for per-token transfer fees.
const BPS: u64 = 10_000;

/// Shared ledger of all external token balances, allowances, and native
/// currency. One instance plays the role of every token contract plus the
/// native-currency wrapper.
#[derive(Debug, Clone)]
pub struct TokenLedger {
    /// The wrapped-native token id.
    wrapped_native: TokenId,
    /// token -> owner -> balance.
    balances: HashMap<TokenId, HashMap<Address, U256>>,
    /// token -> (owner, spender) -> remaining allowance.
    allowances: HashMap<TokenId, HashMap<(Address, Address), U256>>,
    /// Transfer fee in basis points for deflating tokens (absent = 0).
    transfer_fee_bps: HashMap<TokenId, u64>,
    /// Native-currency balances.
    native: HashMap<Address, U256>,
}

impl TokenLedger {
    /// Create a ledger; `wrapped_native` is the token credited by `deposit`.
    pub fn new(wrapped_native: TokenId) -> Self {
        Self {
            wrapped_native,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            transfer_fee_bps: HashMap::new(),
            native: HashMap::new(),
        }
    }

    /// The wrapped-native token id.
    pub fn wrapped_native(&self) -> TokenId {
        self.wrapped_native
    }

    /// Seed supply of a token to an owner (deployment/test helper).
    pub fn mint(&mut self, token: TokenId, to: Address, amount: Amount) -> Result<(), TokenError> {
        self.credit(token, to, amount)
    }

    /// Seed native currency to an owner (deployment/test helper).
    pub fn mint_native(&mut self, owner: Address, amount: Amount) -> Result<(), TokenError> {
        let balance = self.native.entry(owner).or_insert(U256::ZERO);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    /// Mark a token as deflating: every transfer delivers
    /// `amount - amount * fee_bps / 10000`.
    pub fn set_transfer_fee_bps(&mut self, token: TokenId, fee_bps: u64) {
        self.transfer_fee_bps.insert(token, fee_bps);
    }

    /// Current balance of `owner` in `token`.
    pub fn balance_of(&self, token: TokenId, owner: Address) -> Amount {
        self.balances
            .get(&token)
            .and_then(|owners| owners.get(&owner))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Current native-currency balance of `owner`.
    pub fn native_balance_of(&self, owner: Address) -> Amount {
        self.native.get(&owner).copied().unwrap_or(U256::ZERO)
    }

    /// Remaining allowance of `spender` over `owner`'s `token` balance.
    pub fn allowance(&self, token: TokenId, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&token)
            .and_then(|map| map.get(&(owner, spender)))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Grant `spender` the right to move up to `amount` of `owner`'s `token`.
    /// `U256::MAX` is treated as unlimited and never decremented.
    pub fn approve(&mut self, token: TokenId, owner: Address, spender: Address, amount: Amount) {
        self.allowances
            .entry(token)
            .or_default()
            .insert((owner, spender), amount);
    }

    /// Move `amount` of `token` from `from` to `to`. Returns the amount
    /// actually delivered, which is less than `amount` for deflating tokens.
    pub fn transfer(
        &mut self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        self.debit(token, from, amount)?;
        let delivered = self.after_transfer_fee(token, amount);
        self.credit(token, to, delivered)?;
        Ok(delivered)
    }

    /// Move `amount` of `owner`'s `token` to `to`, spending `spender`'s
    /// allowance. Returns the amount actually delivered.
    pub fn transfer_from(
        &mut self,
        token: TokenId,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Amount, TokenError> {
        let allowed = self.allowance(token, owner, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance);
        }
        if allowed != U256::MAX {
            self.allowances
                .entry(token)
                .or_default()
                .insert((owner, spender), allowed - amount);
        }
        self.transfer(token, owner, to, amount)
    }

    /// Wrap native currency: debit `payer`'s native balance and credit
    /// `beneficiary` with the same amount of the wrapped token.
    pub fn deposit(
        &mut self,
        payer: Address,
        beneficiary: Address,
        value: Amount,
    ) -> Result<(), TokenError> {
        let balance = self.native.entry(payer).or_insert(U256::ZERO);
        if *balance < value {
            return Err(TokenError::InsufficientNativeBalance);
        }
        *balance -= value;
        self.credit(self.wrapped_native, beneficiary, value)
    }

    /// Unwrap: debit `owner`'s wrapped balance and credit `recipient`'s
    /// native balance.
    pub fn withdraw(
        &mut self,
        owner: Address,
        recipient: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        self.debit(self.wrapped_native, owner, amount)?;
        let balance = self.native.entry(recipient).or_insert(U256::ZERO);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }

    fn after_transfer_fee(&self, token: TokenId, amount: Amount) -> Amount {
        match self.transfer_fee_bps.get(&token) {
            Some(&fee_bps) if fee_bps > 0 => {
                amount - amount * U256::from(fee_bps) / U256::from(BPS)
            }
            _ => amount,
        }
    }

    fn debit(&mut self, token: TokenId, owner: Address, amount: Amount) -> Result<(), TokenError> {
        let balance = self
            .balances
            .entry(token)
            .or_default()
            .entry(owner)
            .or_insert(U256::ZERO);
        if *balance < amount {
            return Err(TokenError::InsufficientBalance);
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, token: TokenId, owner: Address, amount: Amount) -> Result<(), TokenError> {
        let balance = self
            .balances
            .entry(token)
            .or_default()
            .entry(owner)
            .or_insert(U256::ZERO);
        *balance = balance.checked_add(amount).ok_or(TokenError::Overflow)?;
        Ok(())
    }
}
