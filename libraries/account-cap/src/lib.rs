#![no_std]

//! Capability tokens used to authorize custody access. `AccountCap` and
//! `PoolOwnerCap` carry no behaviour of their own — they are the "key" a
//! caller must present to `Custodian`/`Pool` operations that move funds out
//! of `available` or withdraw accumulated fees.

use clob_common::{OwnerId, PoolError};
use sails_rs::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct AccountCap {
    pub id: OwnerId,
    pub owner: OwnerId,
}

impl AccountCap {
    /// An admin cap's `id` equals its `owner`; a child cap's does not.
    pub fn is_admin(&self) -> bool {
        self.id == self.owner
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct PoolOwnerCap {
    pub id: OwnerId,
    pub pool_id: OwnerId,
}

/// Mints fresh, non-colliding `OwnerId`s for newly created caps. The host
/// runtime normally hands out real object ids; in this crate a simple
/// incrementing counter plays that role, the same way the order book hands
/// out `order_id`s from a counter rather than from any external entropy
/// source.
#[derive(Default, Debug, Clone)]
pub struct CapMinter {
    next_id: u64,
}

impl CapMinter {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    fn fresh_id(&mut self) -> OwnerId {
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).expect("cap id counter overflow");
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&id.to_be_bytes());
        OwnerId::from_bytes(bytes)
    }

    pub fn mint_account_cap(&mut self) -> AccountCap {
        let id = self.fresh_id();
        AccountCap { id, owner: id }
    }

    pub fn create_child_account_cap(&mut self, admin: &AccountCap) -> Result<AccountCap, PoolError> {
        if !admin.is_admin() {
            return Err(PoolError::AdminAccountCapRequired);
        }
        let id = self.fresh_id();
        Ok(AccountCap {
            id,
            owner: admin.owner,
        })
    }

    pub fn mint_pool_owner_cap(&mut self, pool_id: OwnerId) -> PoolOwnerCap {
        let id = self.fresh_id();
        PoolOwnerCap { id, pool_id }
    }
}

pub fn account_owner(cap: &AccountCap) -> OwnerId {
    cap.owner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_cap_id_equals_owner() {
        let mut minter = CapMinter::new();
        let admin = minter.mint_account_cap();
        assert!(admin.is_admin());
        assert_eq!(admin.id, admin.owner);
    }

    #[test]
    fn child_cap_shares_owner_but_not_id() {
        let mut minter = CapMinter::new();
        let admin = minter.mint_account_cap();
        let child = minter.create_child_account_cap(&admin).unwrap();
        assert_eq!(child.owner, admin.owner);
        assert_ne!(child.id, admin.id);
        assert!(!child.is_admin());
    }

    #[test]
    fn child_cannot_mint_grandchild() {
        let mut minter = CapMinter::new();
        let admin = minter.mint_account_cap();
        let child = minter.create_child_account_cap(&admin).unwrap();
        let err = minter.create_child_account_cap(&child).unwrap_err();
        assert_eq!(err, PoolError::AdminAccountCapRequired);
    }

    #[test]
    fn minted_ids_never_collide() {
        let mut minter = CapMinter::new();
        let a = minter.mint_account_cap();
        let b = minter.mint_account_cap();
        assert_ne!(a.id, b.id);
    }
}
