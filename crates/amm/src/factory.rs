//! Pair registry.
//!
//! Creates and addresses [`Pair`] instances deterministically from the sorted
//! token pair, tracks the protocol-fee and treasury configuration, and exposes
//! order-insensitive lookup. Without an on-chain CREATE2 scheme, the
//! derivation is published here as [`Factory::pair_address_for`] so callers
//! can compute a pair's address without holding a registry reference.

use crate::error::FactoryError;
use crate::pair::Pair;
use crate::types::{keccak256, Address, TokenId};
use std::collections::HashMap;
use tracing::debug;

/// Domain-separation constant mixed into pair address derivation, playing
/// the role a contract-code hash plays in CREATE2-style schemes.
pub const PAIR_CODE_HASH: [u8; 32] = *b"amm::pair::code-hash::version-01";

/// Registry of all trading pairs plus the global fee/treasury configuration.
#[derive(Debug, Clone)]
pub struct Factory {
    /// Sorted token pair -> pair address.
    pair_index: HashMap<(TokenId, TokenId), Address>,
    /// Pair address -> pair state.
    pairs: HashMap<Address, Pair>,
    /// Creation-ordered list of all pair addresses.
    all_pairs: Vec<Address>,
    /// Protocol-fee recipient; unset disables the protocol fee.
    fee_to: Option<Address>,
    /// Sole authority over `fee_to` and itself.
    fee_to_setter: Address,
    /// Recipient of the router-level treasury skim.
    treasury: Address,
    /// Sole authority over `treasury` and itself.
    treasury_setter: Address,
}

impl Factory {
    /// Create a registry. The deployer starts as `fee_to_setter`, `treasury`,
    /// and `treasury_setter`; the protocol fee starts disabled.
    pub fn new(deployer: Address) -> Self {
        Self {
            pair_index: HashMap::new(),
            pairs: HashMap::new(),
            all_pairs: Vec::new(),
            fee_to: None,
            fee_to_setter: deployer,
            treasury: deployer,
            treasury_setter: deployer,
        }
    }

    /// Sort two token identifiers into canonical order, rejecting identical
    /// or zero identifiers.
    pub fn sort_tokens(
        token_a: TokenId,
        token_b: TokenId,
    ) -> Result<(TokenId, TokenId), FactoryError> {
        if token_a == token_b {
            return Err(FactoryError::IdenticalTokens);
        }
        let (token0, token1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        if token0.is_zero() {
            return Err(FactoryError::ZeroToken);
        }
        Ok((token0, token1))
    }

    /// Deterministic pair address: keccak over the sorted tokens and the
    /// pair code hash, truncated to 20 bytes. Computable without a registry.
    pub fn pair_address_for(
        token_a: TokenId,
        token_b: TokenId,
    ) -> Result<Address, FactoryError> {
        let (token0, token1) = Self::sort_tokens(token_a, token_b)?;
        let mut data = [0u8; 72];
        data[..20].copy_from_slice(token0.as_slice());
        data[20..40].copy_from_slice(token1.as_slice());
        data[40..].copy_from_slice(&PAIR_CODE_HASH);
        let hash = keccak256(data);
        Ok(Address::from_slice(&hash[12..]))
    }

    /// Create the pair for an unordered token pair.
    pub fn create_pair(
        &mut self,
        token_a: TokenId,
        token_b: TokenId,
    ) -> Result<Address, FactoryError> {
        let (token0, token1) = Self::sort_tokens(token_a, token_b)?;
        if self.pair_index.contains_key(&(token0, token1)) {
            return Err(FactoryError::PairExists);
        }
        let address = Self::pair_address_for(token0, token1)?;
        self.pair_index.insert((token0, token1), address);
        self.pairs.insert(address, Pair::new(address, token0, token1));
        self.all_pairs.push(address);
        debug!(
            target: "amm::factory",
            %token0, %token1, pair = %address, index = self.all_pairs.len(),
            "pair created"
        );
        Ok(address)
    }

    /// Order-insensitive pair lookup.
    pub fn get_pair(&self, token_a: TokenId, token_b: TokenId) -> Option<Address> {
        let (token0, token1) = Self::sort_tokens(token_a, token_b).ok()?;
        self.pair_index.get(&(token0, token1)).copied()
    }

    /// The pair for an unordered token pair.
    pub fn pair(&self, token_a: TokenId, token_b: TokenId) -> Result<&Pair, FactoryError> {
        let address = self
            .get_pair(token_a, token_b)
            .ok_or(FactoryError::PairNotFound)?;
        self.pairs.get(&address).ok_or(FactoryError::PairNotFound)
    }

    /// Mutable access to the pair for an unordered token pair.
    pub fn pair_mut(
        &mut self,
        token_a: TokenId,
        token_b: TokenId,
    ) -> Result<&mut Pair, FactoryError> {
        let address = self
            .get_pair(token_a, token_b)
            .ok_or(FactoryError::PairNotFound)?;
        self.pairs.get_mut(&address).ok_or(FactoryError::PairNotFound)
    }

    /// The pair at a known address.
    pub fn pair_at(&self, address: Address) -> Option<&Pair> {
        self.pairs.get(&address)
    }

    /// All pair addresses in creation order.
    pub fn all_pairs(&self) -> &[Address] {
        &self.all_pairs
    }

    /// Number of pairs created.
    pub fn all_pairs_length(&self) -> usize {
        self.all_pairs.len()
    }

    /// Current protocol-fee recipient, if enabled.
    pub fn fee_to(&self) -> Option<Address> {
        self.fee_to
    }

    /// Authority over the protocol-fee recipient.
    pub fn fee_to_setter(&self) -> Address {
        self.fee_to_setter
    }

    /// Current treasury-skim recipient.
    pub fn treasury(&self) -> Address {
        self.treasury
    }

    /// Authority over the treasury recipient.
    pub fn treasury_setter(&self) -> Address {
        self.treasury_setter
    }

    /// Set (or clear) the protocol-fee recipient. `fee_to_setter` only.
    pub fn set_fee_to(
        &mut self,
        caller: Address,
        fee_to: Option<Address>,
    ) -> Result<(), FactoryError> {
        if caller != self.fee_to_setter {
            return Err(FactoryError::Forbidden);
        }
        self.fee_to = fee_to;
        Ok(())
    }

    /// Hand the `fee_to_setter` role to another address. `fee_to_setter` only.
    pub fn set_fee_to_setter(
        &mut self,
        caller: Address,
        new_setter: Address,
    ) -> Result<(), FactoryError> {
        if caller != self.fee_to_setter {
            return Err(FactoryError::Forbidden);
        }
        self.fee_to_setter = new_setter;
        Ok(())
    }

    /// Change the treasury-skim recipient. `treasury_setter` only.
    pub fn update_treasury_wallet(
        &mut self,
        caller: Address,
        treasury: Address,
    ) -> Result<(), FactoryError> {
        if caller != self.treasury_setter {
            return Err(FactoryError::Forbidden);
        }
        self.treasury = treasury;
        Ok(())
    }

    /// Hand the `treasury_setter` role to another address.
    /// `treasury_setter` only.
    pub fn set_treasury_setter(
        &mut self,
        caller: Address,
        new_setter: Address,
    ) -> Result<(), FactoryError> {
        if caller != self.treasury_setter {
            return Err(FactoryError::Forbidden);
        }
        self.treasury_setter = new_setter;
        Ok(())
    }
}
