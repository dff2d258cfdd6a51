//! `ClobRegistry`: the factory + entry surface. `matching_engine::Pool` only
//! knows how to run *one* order book; this module is what turns that into
//! the addressable, capability-gated set of pools a caller actually talks
//! to — minting pool ids, checking a `PoolOwnerCap` against the pool it
//! claims to own, and routing every external operation to the right `Pool`.
//!
//! A pool's `Base`/`Quote` coin types are a Sui-ism (Sui's `Pool<Base,
//! Quote>` is generic over the two coin types being traded) that has no
//! counterpart once a pool's custody is already abstracted behind
//! `custodian::{Base, Quote}` phantom markers internal to the engine — so
//! `ClobRegistry` is not itself generic; a pool's identity is just its
//! `OwnerId`, and distinguishing trading pairs is left to the caller.

use account_cap::{account_owner, AccountCap, CapMinter, PoolOwnerCap};
use clob_common::events::{Event, EventSink};
use clob_common::{Clock, OwnerId, PoolError, TimeInForce, FEE_AMOUNT_FOR_CREATE_POOL};
use matching_engine::{Order, Pool};
use sails_rs::collections::HashMap;
use sails_rs::prelude::*;

/// Owns every pool this program hosts, plus the capability minter shared
/// across all of them.
#[derive(Default, Debug)]
pub struct ClobRegistry {
    pools: HashMap<OwnerId, Pool>,
    cap_minter: CapMinter,
    next_pool_id: u64,
}

impl ClobRegistry {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            cap_minter: CapMinter::new(),
            next_pool_id: 1,
        }
    }

    fn fresh_pool_id(&mut self) -> OwnerId {
        let id = self.next_pool_id;
        self.next_pool_id = self.next_pool_id.checked_add(1).expect("pool id counter overflow");
        let mut bytes = [0u8; 32];
        // distinguishes pool ids from cap ids, which share the same OwnerId
        // newtype but are minted from a separate counter.
        bytes[0] = 0xFF;
        bytes[24..].copy_from_slice(&id.to_be_bytes());
        OwnerId::from_bytes(bytes)
    }

    fn pool(&self, pool_id: OwnerId) -> Result<&Pool, PoolError> {
        self.pools.get(&pool_id).ok_or(PoolError::PoolNotFound)
    }

    fn pool_mut(&mut self, pool_id: OwnerId) -> Result<&mut Pool, PoolError> {
        self.pools.get_mut(&pool_id).ok_or(PoolError::PoolNotFound)
    }

    fn check_pool_owner(&self, cap: &PoolOwnerCap, pool_id: OwnerId) -> Result<(), PoolError> {
        if cap.pool_id != pool_id {
            return Err(PoolError::IncorrectPoolOwner);
        }
        Ok(())
    }

    // ---- capability minting ----

    pub fn mint_account_cap(&mut self) -> AccountCap {
        crate::trace!("ClobRegistry::mint_account_cap");
        self.cap_minter.mint_account_cap()
    }

    pub fn create_child_account_cap(&mut self, admin: &AccountCap) -> Result<AccountCap, PoolError> {
        self.cap_minter.create_child_account_cap(admin)
    }

    /// A cap carries no backing store of its own; "deletion" is just the
    /// caller giving up the value.
    pub fn delete_account_cap(&mut self, _cap: AccountCap) {}

    pub fn account_owner(&self, cap: &AccountCap) -> OwnerId {
        account_owner(cap)
    }

    // ---- pool lifecycle ----

    pub fn create_pool(
        &mut self,
        tick_size: u64,
        lot_size: u64,
        creation_fee_paid: u64,
        sink: &mut impl EventSink,
    ) -> Result<(OwnerId, PoolOwnerCap), PoolError> {
        if creation_fee_paid < FEE_AMOUNT_FOR_CREATE_POOL {
            return Err(PoolError::InvalidFee);
        }
        let pool = Pool::new(tick_size, lot_size, creation_fee_paid)?;
        let pool_id = self.fresh_pool_id();
        crate::trace!("ClobRegistry::create_pool pool_id={:?} tick_size={} lot_size={}", pool_id, tick_size, lot_size);
        sink.emit(Event::PoolCreated {
            tick_size,
            lot_size,
            taker_fee_rate: pool.taker_fee_rate,
            maker_rebate_rate: pool.maker_rebate_rate,
        });
        self.pools.insert(pool_id, pool);
        let cap = self.cap_minter.mint_pool_owner_cap(pool_id);
        Ok((pool_id, cap))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_customized_pool(
        &mut self,
        tick_size: u64,
        lot_size: u64,
        taker_fee_rate: u64,
        maker_rebate_rate: u64,
        creation_fee_paid: u64,
        sink: &mut impl EventSink,
    ) -> Result<(OwnerId, PoolOwnerCap), PoolError> {
        if creation_fee_paid < FEE_AMOUNT_FOR_CREATE_POOL {
            return Err(PoolError::InvalidFee);
        }
        let pool = Pool::new_custom(tick_size, lot_size, taker_fee_rate, maker_rebate_rate, creation_fee_paid)?;
        let pool_id = self.fresh_pool_id();
        crate::trace!(
            "ClobRegistry::create_customized_pool pool_id={:?} tick_size={} lot_size={} taker_fee_rate={} maker_rebate_rate={}",
            pool_id, tick_size, lot_size, taker_fee_rate, maker_rebate_rate
        );
        sink.emit(Event::PoolCreated {
            tick_size,
            lot_size,
            taker_fee_rate,
            maker_rebate_rate,
        });
        self.pools.insert(pool_id, pool);
        let cap = self.cap_minter.mint_pool_owner_cap(pool_id);
        Ok((pool_id, cap))
    }

    pub fn withdraw_fees(&mut self, cap: &PoolOwnerCap, pool_id: OwnerId) -> Result<u64, PoolError> {
        self.check_pool_owner(cap, pool_id)?;
        let pool = self.pool_mut(pool_id)?;
        let fees = pool.withdraw_fees();
        crate::trace!("ClobRegistry::withdraw_fees pool_id={:?} fees={}", pool_id, fees);
        Ok(fees)
    }

    pub fn delete_pool_owner_cap(&mut self, _cap: PoolOwnerCap) {}

    // ---- custody ----

    pub fn deposit_base(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        self.pool_mut(pool_id)?.deposit_base(cap.owner(), quantity, sink);
        Ok(())
    }

    pub fn deposit_quote(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        self.pool_mut(pool_id)?.deposit_quote(cap.owner(), quantity, sink);
        Ok(())
    }

    pub fn withdraw_base(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<u64, PoolError> {
        self.pool_mut(pool_id)?.withdraw_base(cap, quantity, sink)
    }

    pub fn withdraw_quote(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<u64, PoolError> {
        self.pool_mut(pool_id)?.withdraw_quote(cap, quantity, sink)
    }

    pub fn account_balance(&self, pool_id: OwnerId, cap: &AccountCap) -> Result<(u64, u64, u64, u64), PoolError> {
        Ok(self.pool(pool_id)?.account_balance(cap.owner()))
    }

    // ---- trading ----

    pub fn place_market_order(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        is_bid: bool,
        base_quantity: u64,
        clock: &dyn Clock,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64), PoolError> {
        let now = clock.timestamp_ms();
        crate::trace!("ClobRegistry::place_market_order pool_id={:?} is_bid={} qty={}", pool_id, is_bid, base_quantity);
        self.pool_mut(pool_id)?.place_market(cap, is_bid, base_quantity, now, sink)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn place_limit_order(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        is_bid: bool,
        price: u64,
        quantity: u64,
        client_order_id: u64,
        expire_timestamp: u64,
        restriction: TimeInForce,
        self_matching_prevention: u8,
        clock: &dyn Clock,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64, u64), PoolError> {
        let now = clock.timestamp_ms();
        crate::trace!(
            "ClobRegistry::place_limit_order pool_id={:?} is_bid={} price={} qty={}",
            pool_id, is_bid, price, quantity
        );
        self.pool_mut(pool_id)?.place_limit(
            cap,
            is_bid,
            price,
            quantity,
            client_order_id,
            expire_timestamp,
            restriction,
            self_matching_prevention,
            now,
            sink,
        )
    }

    /// Thin wrapper over `place_market`: sells exactly `base_quantity` for
    /// whatever quote it fetches.
    pub fn swap_exact_base_for_quote(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        base_quantity: u64,
        clock: &dyn Clock,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64), PoolError> {
        let now = clock.timestamp_ms();
        self.pool_mut(pool_id)?.place_market(cap, false, base_quantity, now, sink)
    }

    /// Thin wrapper over `place_market_by_quote`: spends exactly
    /// `quote_quantity` buying as much base as it affords.
    pub fn swap_exact_quote_for_base(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        quote_quantity: u64,
        clock: &dyn Clock,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64), PoolError> {
        let now = clock.timestamp_ms();
        self.pool_mut(pool_id)?.place_market_by_quote(cap, quote_quantity, now, sink)
    }

    // ---- cancellation ----

    pub fn cancel_order(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        is_bid: bool,
        order_id: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        self.pool_mut(pool_id)?.cancel_order(cap, is_bid, order_id, sink)
    }

    pub fn cancel_all_orders(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        self.pool_mut(pool_id)?.cancel_all_orders(cap, sink);
        Ok(())
    }

    pub fn batch_cancel_order(
        &mut self,
        pool_id: OwnerId,
        cap: &AccountCap,
        order_ids: &[u64],
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        self.pool_mut(pool_id)?.batch_cancel_order(cap, order_ids, sink)
    }

    /// Unauthenticated: anyone may sweep expired orders. `clock` is read
    /// once, up front, the same way every other entry point resolves "now".
    pub fn clean_up_expired_orders(
        &mut self,
        pool_id: OwnerId,
        clock: &dyn Clock,
        order_ids: &[u64],
        owners: &[OwnerId],
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        let now = clock.timestamp_ms();
        self.pool_mut(pool_id)?.clean_up_expired_orders(now, order_ids, owners, sink)
    }

    // ---- queries ----

    pub fn get_market_price(&self, pool_id: OwnerId) -> Result<(Option<u64>, Option<u64>), PoolError> {
        Ok(self.pool(pool_id)?.get_market_price())
    }

    /// `(prices, depths)` for every bid level within `[price_low,
    /// price_high]`, best price first. `clock` is accepted for interface
    /// parity with the read surface generally but unused: depth reporting
    /// intentionally counts raw resting size, not what a given caller could
    /// actually fill right now (see `TickLevel::total_quantity`).
    pub fn get_level2_book_status_bid_side(
        &self,
        pool_id: OwnerId,
        price_low: u64,
        price_high: u64,
        _clock: &dyn Clock,
    ) -> Result<(Vec<u64>, Vec<u64>), PoolError> {
        Ok(level2_in_range(self.pool(pool_id)?.get_level2_book_status_bid_side(), price_low, price_high))
    }

    pub fn get_level2_book_status_ask_side(
        &self,
        pool_id: OwnerId,
        price_low: u64,
        price_high: u64,
        _clock: &dyn Clock,
    ) -> Result<(Vec<u64>, Vec<u64>), PoolError> {
        Ok(level2_in_range(self.pool(pool_id)?.get_level2_book_status_ask_side(), price_low, price_high))
    }

    pub fn get_order_status(&self, pool_id: OwnerId, is_bid: bool, order_id: u64) -> Result<Option<Order>, PoolError> {
        Ok(self.pool(pool_id)?.get_order_status(is_bid, order_id))
    }

    pub fn list_open_orders(&self, pool_id: OwnerId, owner: OwnerId) -> Result<Vec<(u64, u64)>, PoolError> {
        Ok(self.pool(pool_id)?.list_open_orders(owner))
    }
}

fn level2_in_range(levels: Vec<(u64, u64)>, price_low: u64, price_high: u64) -> (Vec<u64>, Vec<u64>) {
    levels
        .into_iter()
        .filter(|(price, _)| *price >= price_low && *price <= price_high)
        .unzip()
}
