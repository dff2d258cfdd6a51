#![no_std]

//! Per-owner `{available, locked}` ledger for one asset. `Custodian<Asset>`
//! is generic over a zero-sized marker (`Base`/`Quote`) purely so a `Pool`
//! cannot mix up its two ledgers at the type level — there is no behaviour
//! difference between the two instantiations.

extern crate alloc;

use account_cap::AccountCap;
use clob_common::{OwnerId, PoolError};
use core::marker::PhantomData;
use sails_rs::collections::HashMap;

/// Distinguishes which insufficient-funds error a `Custodian<Asset>`
/// reports; has no other behavioural effect.
pub trait AssetKind {
    const INSUFFICIENT: PoolError;
}

#[derive(Debug, Clone, Copy)]
pub struct Base;
#[derive(Debug, Clone, Copy)]
pub struct Quote;

impl AssetKind for Base {
    const INSUFFICIENT: PoolError = PoolError::InsufficientBaseCoin;
}

impl AssetKind for Quote {
    const INSUFFICIENT: PoolError = PoolError::InsufficientQuoteCoin;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub available: u64,
    pub locked: u64,
}

#[derive(Debug)]
pub struct Custodian<Asset> {
    balances: HashMap<OwnerId, Balance>,
    _asset: PhantomData<Asset>,
}

impl<Asset: AssetKind> Default for Custodian<Asset> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Asset: AssetKind> Custodian<Asset> {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            _asset: PhantomData,
        }
    }

    fn entry(&mut self, owner: OwnerId) -> &mut Balance {
        self.balances.entry(owner).or_default()
    }

    /// Missing owner implies `(0, 0)`.
    pub fn account_balance(&self, owner: OwnerId) -> (u64, u64) {
        match self.balances.get(&owner) {
            Some(b) => (b.available, b.locked),
            None => (0, 0),
        }
    }

    /// Moves external funds into `owner`'s `available` balance.
    pub fn deposit(&mut self, owner: OwnerId, qty: u64) {
        self.increase_available(owner, qty);
    }

    /// Authenticated withdrawal out of `available`. Fails if insufficient.
    pub fn withdraw(&mut self, cap: &AccountCap, qty: u64) -> Result<u64, PoolError> {
        self.decrease_available(cap, qty)
    }

    /// Authenticated move of `qty` from `available` into `locked`.
    pub fn lock(&mut self, cap: &AccountCap, qty: u64) -> Result<(), PoolError> {
        self.decrease_available(cap, qty)?;
        self.increase_locked(cap, qty);
        Ok(())
    }

    /// Unauthenticated move of `qty` from `locked` into `available`. Only
    /// the matching/cancellation paths call this, on behalf of an order
    /// they already own; failure to have `qty` locked is a caller bug.
    pub fn unlock(&mut self, owner: OwnerId, qty: u64) {
        let removed = self.decrease_locked(owner, qty);
        debug_assert_eq!(removed, qty, "unlock of more than was locked");
        self.increase_available(owner, qty);
    }

    pub fn increase_available(&mut self, owner: OwnerId, qty: u64) {
        if qty == 0 {
            return;
        }
        let b = self.entry(owner);
        b.available = b
            .available
            .checked_add(qty)
            .expect("available balance overflow");
    }

    /// Unauthenticated: decreases `locked` by `qty`, returning the amount
    /// actually removed (always `qty` — a shortfall is a caller bug).
    pub fn decrease_locked(&mut self, owner: OwnerId, qty: u64) -> u64 {
        if qty == 0 {
            return 0;
        }
        let b = self.entry(owner);
        b.locked = b
            .locked
            .checked_sub(qty)
            .expect("decrease_locked underflow");
        qty
    }

    pub fn decrease_available(&mut self, cap: &AccountCap, qty: u64) -> Result<u64, PoolError> {
        if qty == 0 {
            return Ok(0);
        }
        let b = self.entry(cap.owner());
        if b.available < qty {
            return Err(Asset::INSUFFICIENT);
        }
        b.available -= qty;
        Ok(qty)
    }

    pub fn increase_locked(&mut self, cap: &AccountCap, qty: u64) {
        if qty == 0 {
            return;
        }
        let b = self.entry(cap.owner());
        b.locked = b.locked.checked_add(qty).expect("locked balance overflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_cap::CapMinter;

    fn cap() -> AccountCap {
        let mut m = CapMinter::new();
        m.mint_account_cap()
    }

    #[test]
    fn deposit_then_balance() {
        let mut c: Custodian<Base> = Custodian::new();
        let cap = cap();
        c.deposit(cap.owner(), 100);
        assert_eq!(c.account_balance(cap.owner()), (100, 0));
    }

    #[test]
    fn lock_then_unlock_round_trips() {
        let mut c: Custodian<Base> = Custodian::new();
        let cap = cap();
        c.deposit(cap.owner(), 100);
        c.lock(&cap, 40).unwrap();
        assert_eq!(c.account_balance(cap.owner()), (60, 40));
        c.unlock(cap.owner(), 40);
        assert_eq!(c.account_balance(cap.owner()), (100, 0));
    }

    #[test]
    fn lock_more_than_available_fails() {
        let mut c: Custodian<Base> = Custodian::new();
        let cap = cap();
        c.deposit(cap.owner(), 10);
        assert_eq!(c.lock(&cap, 11), Err(PoolError::InsufficientBaseCoin));
        // no partial mutation on failure.
        assert_eq!(c.account_balance(cap.owner()), (10, 0));
    }

    #[test]
    fn missing_owner_is_zero() {
        let c: Custodian<Quote> = Custodian::new();
        assert_eq!(c.account_balance(OwnerId::from_bytes([7u8; 32])), (0, 0));
    }

    #[test]
    fn withdraw_drains_available_only() {
        let mut c: Custodian<Base> = Custodian::new();
        let cap = cap();
        c.deposit(cap.owner(), 50);
        c.lock(&cap, 20).unwrap();
        let withdrawn = c.withdraw(&cap, 30).unwrap();
        assert_eq!(withdrawn, 30);
        assert_eq!(c.account_balance(cap.owner()), (0, 20));
    }
}
