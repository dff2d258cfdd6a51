//! `Pool`: one order book (bids + asks) plus the two custodians that back
//! it, and every entry point that mutates the book. This is the crate's
//! core — injection, the three matching loops, market/limit placement with
//! time-in-force dispatch, cancellation and the read-only query surface.

use crate::book::OrderSide;
use crate::math;
use crate::types::Order;
use account_cap::AccountCap;
use clob_common::events::{CancelComponent, Event, EventSink};
use clob_common::{
    OwnerId, PoolError, SelfMatchPrevention, TimeInForce, MAX_PRICE, MIN_ASK_ORDER_ID,
    MIN_BID_ORDER_ID, REFERENCE_MAKER_REBATE_RATE, REFERENCE_TAKER_FEE_RATE,
};
use custodian::{Base, Custodian, Quote};
use sails_rs::collections::HashMap;
use sails_rs::prelude::*;

/// One order book and its two custodians. Every `usr_open_orders` entry is
/// `(order_id, price)`, insertion-ordered; whether it belongs to `bids` or
/// `asks` follows from `order_id < MIN_ASK_ORDER_ID`, so there is no need to
/// also carry `is_bid` alongside it.
#[derive(Debug)]
pub struct Pool {
    pub bids: OrderSide,
    pub asks: OrderSide,
    usr_open_orders: HashMap<OwnerId, Vec<(u64, u64)>>,
    /// Every live order id's owner, independent of `usr_open_orders`'s
    /// per-owner scoping. Exists solely so `cancel_order` can tell "unknown
    /// id" (`InvalidOrderId`) apart from "someone else's id"
    /// (`UnauthorizedCancel`) instead of treating both the same way.
    order_owner: HashMap<u64, OwnerId>,
    pub tick_size: u64,
    pub lot_size: u64,
    pub taker_fee_rate: u64,
    pub maker_rebate_rate: u64,
    pub creation_fee: u64,
    pub quote_asset_trading_fees: u64,
    pub base_custodian: Custodian<Base>,
    pub quote_custodian: Custodian<Quote>,
}

impl Pool {
    /// Constructs a pool with the protocol's reference fee schedule.
    pub fn new(tick_size: u64, lot_size: u64, creation_fee: u64) -> Result<Self, PoolError> {
        Self::new_custom(
            tick_size,
            lot_size,
            REFERENCE_TAKER_FEE_RATE,
            REFERENCE_MAKER_REBATE_RATE,
            creation_fee,
        )
    }

    pub fn new_custom(
        tick_size: u64,
        lot_size: u64,
        taker_fee_rate: u64,
        maker_rebate_rate: u64,
        creation_fee: u64,
    ) -> Result<Self, PoolError> {
        if tick_size == 0 || lot_size == 0 {
            return Err(PoolError::InvalidTickSizeMinSize);
        }
        if taker_fee_rate < maker_rebate_rate {
            return Err(PoolError::InvalidFeeRateRebateRate);
        }
        Ok(Self {
            bids: OrderSide::new(MIN_BID_ORDER_ID),
            asks: OrderSide::new(MIN_ASK_ORDER_ID),
            usr_open_orders: HashMap::new(),
            order_owner: HashMap::new(),
            tick_size,
            lot_size,
            taker_fee_rate,
            maker_rebate_rate,
            creation_fee,
            quote_asset_trading_fees: 0,
            base_custodian: Custodian::new(),
            quote_custodian: Custodian::new(),
        })
    }

    // ---- custody ----

    pub fn deposit_base(&mut self, owner: OwnerId, quantity: u64, sink: &mut impl EventSink) {
        self.base_custodian.deposit(owner, quantity);
        sink.emit(Event::DepositAsset {
            owner,
            is_base: true,
            quantity,
        });
    }

    pub fn deposit_quote(&mut self, owner: OwnerId, quantity: u64, sink: &mut impl EventSink) {
        self.quote_custodian.deposit(owner, quantity);
        sink.emit(Event::DepositAsset {
            owner,
            is_base: false,
            quantity,
        });
    }

    pub fn withdraw_base(
        &mut self,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<u64, PoolError> {
        let withdrawn = self.base_custodian.withdraw(cap, quantity)?;
        sink.emit(Event::WithdrawAsset {
            owner: cap.owner(),
            is_base: true,
            quantity: withdrawn,
        });
        Ok(withdrawn)
    }

    pub fn withdraw_quote(
        &mut self,
        cap: &AccountCap,
        quantity: u64,
        sink: &mut impl EventSink,
    ) -> Result<u64, PoolError> {
        let withdrawn = self.quote_custodian.withdraw(cap, quantity)?;
        sink.emit(Event::WithdrawAsset {
            owner: cap.owner(),
            is_base: false,
            quantity: withdrawn,
        });
        Ok(withdrawn)
    }

    pub fn account_balance(&self, owner: OwnerId) -> (u64, u64, u64, u64) {
        let (base_available, base_locked) = self.base_custodian.account_balance(owner);
        let (quote_available, quote_locked) = self.quote_custodian.account_balance(owner);
        (base_available, base_locked, quote_available, quote_locked)
    }

    /// Drains the pool's accumulated trading fees. Authorization (matching
    /// the caller's `PoolOwnerCap` against this specific pool) is the
    /// factory's job, not this crate's — see `programs/clob`.
    pub fn withdraw_fees(&mut self) -> u64 {
        let fees = self.quote_asset_trading_fees;
        self.quote_asset_trading_fees = 0;
        fees
    }

    // ---- order injection ----

    /// Locks margin, allocates an order id, and appends the order to its
    /// tick level's FIFO queue. Does not validate `price`/`quantity`
    /// alignment — callers (`place_limit`) do that first.
    pub fn inject_limit(
        &mut self,
        is_bid: bool,
        price: u64,
        quantity: u64,
        client_order_id: u64,
        expire_timestamp: u64,
        self_matching_prevention: u8,
        cap: &AccountCap,
        sink: &mut impl EventSink,
    ) -> Result<u64, PoolError> {
        let smp = SelfMatchPrevention::from_u8(self_matching_prevention)?;
        let owner = cap.owner();

        if is_bid {
            let margin = fixed_point::mul(quantity, price).ok_or(PoolError::MathOverflow)?;
            self.quote_custodian.lock(cap, margin)?;
        } else {
            self.base_custodian.lock(cap, quantity)?;
        }

        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        let order_id = side.alloc_order_id();
        let handle = side.find_or_create_tick(price);
        side.tree
            .get_mut(handle)
            .expect("handle just created or found")
            .push_back(Order {
                order_id,
                client_order_id,
                price,
                original_quantity: quantity,
                quantity,
                is_bid,
                owner,
                expire_timestamp,
                self_matching_prevention: smp as u8,
            });

        record_open_order(&mut self.usr_open_orders, &mut self.order_owner, owner, order_id, price);
        sink.emit(Event::OrderPlaced {
            order_id,
            client_order_id,
            owner,
            is_bid,
            price,
            original_quantity: quantity,
            expire_timestamp,
        });
        Ok(order_id)
    }

    // ---- matching loops ----

    /// Matches a base-quantity-bounded bid against the ask book,
    /// price-ascending, up to `price_limit`. Returns `(filled_base,
    /// quote_spent)`.
    pub fn match_bid(
        &mut self,
        taker_owner: OwnerId,
        taker_order_id: u64,
        mut base_remaining: u64,
        price_limit: u64,
        now: u64,
        sink: &mut impl EventSink,
    ) -> (u64, u64) {
        let mut filled_base_total = 0u64;
        let mut quote_spent_total = 0u64;
        let mut cancels: Vec<CancelComponent> = Vec::new();

        while base_remaining > 0 && !self.asks.tree.is_empty() {
            let (price, handle) = self.asks.tree.min();
            if price > price_limit {
                break;
            }

            let maker = front_of(&self.asks.tree, handle);

            if skip_maker(&maker, taker_owner, now) {
                self.skip_and_unlock_maker(&maker, handle, false, &mut cancels);
                continue;
            }

            let filled_base = base_remaining.min(maker.quantity);
            let (quote_cost, base_received) = settle_bid_fill(
                &maker,
                taker_order_id,
                filled_base,
                price,
                self.taker_fee_rate,
                self.maker_rebate_rate,
                &mut self.base_custodian,
                &mut self.quote_custodian,
                &mut self.quote_asset_trading_fees,
                sink,
            );
            filled_base_total += base_received;
            quote_spent_total += quote_cost;
            base_remaining -= filled_base;

            self.consume_or_shrink_maker(&maker, handle, filled_base, false);
        }

        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
        (filled_base_total, quote_spent_total)
    }

    /// Matches a quote-quantity-bounded bid against the ask book. Each fill
    /// either fills the maker fully (when the taker's remaining quote
    /// strictly exceeds the quote needed for a full fill, commission
    /// included) or computes the maximum lot-aligned base the remaining
    /// quote affords and terminates the loop after that fill — including
    /// on the exact boundary where the remaining quote equals the full-fill
    /// cost (see DESIGN.md's Open Question resolution).
    pub fn match_bid_by_quote(
        &mut self,
        taker_owner: OwnerId,
        taker_order_id: u64,
        mut quote_remaining: u64,
        price_limit: u64,
        now: u64,
        sink: &mut impl EventSink,
    ) -> (u64, u64) {
        let mut filled_base_total = 0u64;
        let mut quote_spent_total = 0u64;
        let mut cancels: Vec<CancelComponent> = Vec::new();

        while quote_remaining > 0 && !self.asks.tree.is_empty() {
            let (price, handle) = self.asks.tree.min();
            if price > price_limit {
                break;
            }

            let maker = front_of(&self.asks.tree, handle);

            if skip_maker(&maker, taker_owner, now) {
                self.skip_and_unlock_maker(&maker, handle, false, &mut cancels);
                continue;
            }

            let full = fixed_point::unsafe_mul_round(maker.quantity, price);
            let full_commission =
                math::taker_commission_quote_bounded(full.result, self.taker_fee_rate);
            let full_needed = full.result.saturating_add(full_commission);

            let (filled_base, terminate) = if quote_remaining > full_needed {
                (maker.quantity, false)
            } else {
                let affordable = (quote_remaining as u128)
                    .saturating_mul(fixed_point::SCALE as u128)
                    / price as u128;
                let affordable = u64::try_from(affordable).unwrap_or(u64::MAX);
                let rounded = math::round_down_to_lot(affordable.min(maker.quantity));
                if rounded == 0 {
                    break;
                }
                (rounded, true)
            };

            let (quote_cost, base_received) = settle_bid_fill(
                &maker,
                taker_order_id,
                filled_base,
                price,
                self.taker_fee_rate,
                self.maker_rebate_rate,
                &mut self.base_custodian,
                &mut self.quote_custodian,
                &mut self.quote_asset_trading_fees,
                sink,
            );
            filled_base_total += base_received;
            quote_spent_total += quote_cost;
            quote_remaining = quote_remaining.saturating_sub(quote_cost);

            self.consume_or_shrink_maker(&maker, handle, filled_base, false);

            if terminate {
                break;
            }
        }

        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
        (filled_base_total, quote_spent_total)
    }

    /// Matches a base-quantity-bounded ask against the bid book,
    /// price-descending, down to `price_limit`. Returns `(filled_base,
    /// quote_received)`.
    pub fn match_ask(
        &mut self,
        taker_owner: OwnerId,
        taker_order_id: u64,
        mut base_remaining: u64,
        price_limit: u64,
        now: u64,
        sink: &mut impl EventSink,
    ) -> (u64, u64) {
        let mut filled_base_total = 0u64;
        let mut quote_received_total = 0u64;
        let mut cancels: Vec<CancelComponent> = Vec::new();

        while base_remaining > 0 && !self.bids.tree.is_empty() {
            let (price, handle) = self.bids.tree.max();
            if price < price_limit {
                break;
            }

            let maker = front_of(&self.bids.tree, handle);

            if skip_maker(&maker, taker_owner, now) {
                self.skip_and_unlock_maker(&maker, handle, true, &mut cancels);
                continue;
            }

            let filled_base = base_remaining.min(maker.quantity);
            let (quote_received, base_spent) = settle_ask_fill(
                &maker,
                taker_order_id,
                filled_base,
                price,
                self.taker_fee_rate,
                self.maker_rebate_rate,
                &mut self.base_custodian,
                &mut self.quote_custodian,
                &mut self.quote_asset_trading_fees,
                sink,
            );
            filled_base_total += base_spent;
            quote_received_total += quote_received;
            base_remaining -= filled_base;

            self.consume_or_shrink_maker(&maker, handle, filled_base, true);
        }

        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
        (filled_base_total, quote_received_total)
    }

    /// Removes the filled or emptied front order of the tick at `handle`
    /// (side chosen by `maker_is_bid`), or shrinks it in place on a partial
    /// fill, removing the tick level entirely if it is now empty.
    fn consume_or_shrink_maker(
        &mut self,
        maker: &Order,
        handle: crit_bit::Index,
        filled_base: u64,
        maker_is_bid: bool,
    ) {
        let side = if maker_is_bid { &mut self.bids } else { &mut self.asks };
        let remaining = maker.quantity - filled_base;
        if remaining == 0 {
            {
                let tick = side.tree.get_mut(handle).expect("tick must still exist");
                tick.remove_front();
            }
            forget_open_order(&mut self.usr_open_orders, &mut self.order_owner, maker.owner, maker.order_id);
            side.remove_tick_if_empty(handle);
        } else {
            let tick = side.tree.get_mut(handle).expect("tick must still exist");
            tick.front_mut().expect("front must still be the maker").quantity = remaining;
        }
    }

    /// Removes a skip-worthy (expired or self-matching) maker from the
    /// front of the tick at `handle`, unlocks its remaining margin, and
    /// records a `CancelComponent` for the batched `AllOrdersCanceled`
    /// event.
    fn skip_and_unlock_maker(
        &mut self,
        maker: &Order,
        handle: crit_bit::Index,
        maker_is_bid: bool,
        cancels: &mut Vec<CancelComponent>,
    ) {
        let side = if maker_is_bid { &mut self.bids } else { &mut self.asks };
        {
            let tick = side.tree.get_mut(handle).expect("tick must still exist");
            tick.remove_front();
        }
        forget_open_order(&mut self.usr_open_orders, &mut self.order_owner, maker.owner, maker.order_id);
        side.remove_tick_if_empty(handle);

        if maker_is_bid {
            let margin = fixed_point::mul(maker.quantity, maker.price)
                .expect("margin locked at injection always fits u64");
            self.quote_custodian.unlock(maker.owner, margin);
        } else {
            self.base_custodian.unlock(maker.owner, maker.quantity);
        }
        cancels.push(CancelComponent {
            order_id: maker.order_id,
            owner: maker.owner,
            is_bid: maker.is_bid,
            price: maker.price,
            quantity: maker.quantity,
        });
    }

    // ---- market & limit order placement ----

    /// Places a market order: fully taker, never rests. `base_quantity` is
    /// the base amount to buy (bid) or sell (ask); for a quote-bounded
    /// market buy use `place_market_by_quote`.
    pub fn place_market(
        &mut self,
        cap: &AccountCap,
        is_bid: bool,
        base_quantity: u64,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64), PoolError> {
        if base_quantity == 0 {
            return Err(PoolError::InvalidQuantity);
        }
        let owner = cap.owner();

        if is_bid {
            let needed = self.preview_fillable_base(true, owner, MAX_PRICE, now, base_quantity);
            let margin = self.quote_budget_for(owner, now, needed);
            self.quote_custodian.lock(cap, margin)?;
            let taker_order_id = self.bids.peek_next_order_id();
            let (filled_base, quote_spent) =
                self.match_bid(owner, taker_order_id, base_quantity, MAX_PRICE, now, sink);
            // a market order never rests: the whole margin leaves `locked`,
            // either permanently (the spent portion) or back to `available`
            // (anything the fill didn't need).
            let spent = quote_spent.min(margin);
            self.quote_custodian.decrease_locked(owner, spent);
            self.quote_custodian.unlock(owner, margin - spent);
            Ok((filled_base, quote_spent))
        } else {
            self.base_custodian.lock(cap, base_quantity)?;
            let taker_order_id = self.asks.peek_next_order_id();
            let (filled_base, quote_received) =
                self.match_ask(owner, taker_order_id, base_quantity, clob_common::MIN_PRICE, now, sink);
            let unsold_base = base_quantity - filled_base;
            self.base_custodian.decrease_locked(owner, filled_base);
            self.base_custodian.unlock(owner, unsold_base);
            self.quote_custodian.increase_available(owner, quote_received);
            Ok((filled_base, quote_received))
        }
    }

    /// Places a quote-bounded market buy: spends up to `quote_quantity`,
    /// buying as much base as that affords.
    pub fn place_market_by_quote(
        &mut self,
        cap: &AccountCap,
        quote_quantity: u64,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64), PoolError> {
        if quote_quantity == 0 {
            return Err(PoolError::InvalidQuantity);
        }
        let owner = cap.owner();
        self.quote_custodian.lock(cap, quote_quantity)?;
        let taker_order_id = self.bids.peek_next_order_id();
        let (filled_base, quote_spent) = self.match_bid_by_quote(
            owner,
            taker_order_id,
            quote_quantity,
            MAX_PRICE,
            now,
            sink,
        );
        let unspent = quote_quantity - quote_spent;
        self.quote_custodian.decrease_locked(owner, quote_spent);
        self.quote_custodian.unlock(owner, unspent);
        self.base_custodian.increase_available(owner, filled_base);
        Ok((filled_base, quote_spent))
    }

    /// Places a limit order with full time-in-force dispatch. Returns
    /// `(resting_order_id, filled_base, filled_quote)`; `resting_order_id`
    /// is `0` when nothing was left resting (fully filled, `IOC` leftover
    /// canceled, or the call errored).
    #[allow(clippy::too_many_arguments)]
    pub fn place_limit(
        &mut self,
        cap: &AccountCap,
        is_bid: bool,
        price: u64,
        quantity: u64,
        client_order_id: u64,
        expire_timestamp: u64,
        restriction: TimeInForce,
        self_matching_prevention: u8,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<(u64, u64, u64), PoolError> {
        if price == 0 || price > MAX_PRICE {
            return Err(PoolError::InvalidPrice);
        }
        if price % self.tick_size != 0 {
            return Err(PoolError::InvalidTickPrice);
        }
        if quantity == 0 || quantity % self.lot_size != 0 {
            return Err(PoolError::InvalidQuantity);
        }
        if expire_timestamp <= now {
            return Err(PoolError::InvalidExpireTimestamp);
        }
        SelfMatchPrevention::from_u8(self_matching_prevention)?;

        let owner = cap.owner();

        match restriction {
            TimeInForce::FillOrKill => {
                let fillable = self.preview_fillable_base(is_bid, owner, price, now, quantity);
                if fillable < quantity {
                    return Err(PoolError::OrderCannotBeFullyFilled);
                }
            }
            TimeInForce::PostOrAbort => {
                let fillable = self.preview_fillable_base(is_bid, owner, price, now, 1);
                if fillable > 0 {
                    return Err(PoolError::OrderCannotBeFullyPassive);
                }
            }
            TimeInForce::NoRestriction | TimeInForce::ImmediateOrCancel => {}
        }

        let locked_amount = if is_bid {
            let margin = fixed_point::mul(quantity, price).ok_or(PoolError::MathOverflow)?;
            self.quote_custodian.lock(cap, margin)?;
            margin
        } else {
            self.base_custodian.lock(cap, quantity)?;
            quantity
        };

        let taker_order_id = if is_bid {
            self.bids.peek_next_order_id()
        } else {
            self.asks.peek_next_order_id()
        };

        let (filled_base, filled_quote) = if is_bid {
            self.match_bid(owner, taker_order_id, quantity, price, now, sink)
        } else {
            self.match_ask(owner, taker_order_id, quantity, price, now, sink)
        };

        // the taker's own side of the trade: base bought (bid) or quote
        // received (ask) lands in `available` immediately, same as a market
        // order's fill.
        if is_bid {
            self.base_custodian.increase_available(owner, filled_base);
        } else {
            self.quote_custodian.increase_available(owner, filled_quote);
        }

        // the portion of `locked_amount` actually spent/sold leaves custody
        // permanently; whatever's left either rests (below) or, for an
        // order that doesn't rest, goes back to `available`.
        let spent = if is_bid { filled_quote } else { filled_base };
        let released = spent.min(locked_amount);
        if is_bid {
            self.quote_custodian.decrease_locked(owner, released);
        } else {
            self.base_custodian.decrease_locked(owner, released);
        }
        let still_locked = locked_amount - released;

        let remaining = quantity - filled_base;

        if remaining == 0 {
            return Ok((0, filled_base, filled_quote));
        }

        match restriction {
            TimeInForce::ImmediateOrCancel => {
                if is_bid {
                    self.quote_custodian.unlock(owner, still_locked);
                } else {
                    self.base_custodian.unlock(owner, still_locked);
                }
                Ok((0, filled_base, filled_quote))
            }
            TimeInForce::FillOrKill => {
                unreachable!("FillOrKill guarantees remaining == 0 via the precheck above")
            }
            TimeInForce::PostOrAbort | TimeInForce::NoRestriction => {
                // `still_locked` keeps backing the resting remainder; no
                // separate lock call needed.
                let order_id = self.rest_remaining(
                    is_bid,
                    price,
                    remaining,
                    client_order_id,
                    expire_timestamp,
                    self_matching_prevention,
                    owner,
                    sink,
                );
                Ok((order_id, filled_base, filled_quote))
            }
        }
    }

    /// Appends the unfilled remainder of a just-placed order as a new
    /// resting maker (margin for it is already locked as part of the
    /// original `quantity` lock).
    #[allow(clippy::too_many_arguments)]
    fn rest_remaining(
        &mut self,
        is_bid: bool,
        price: u64,
        remaining: u64,
        client_order_id: u64,
        expire_timestamp: u64,
        self_matching_prevention: u8,
        owner: OwnerId,
        sink: &mut impl EventSink,
    ) -> u64 {
        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        let order_id = side.alloc_order_id();
        let handle = side.find_or_create_tick(price);
        side.tree
            .get_mut(handle)
            .expect("handle just created or found")
            .push_back(Order {
                order_id,
                client_order_id,
                price,
                original_quantity: remaining,
                quantity: remaining,
                is_bid,
                owner,
                expire_timestamp,
                self_matching_prevention,
            });
        record_open_order(&mut self.usr_open_orders, &mut self.order_owner, owner, order_id, price);
        sink.emit(Event::OrderPlaced {
            order_id,
            client_order_id,
            owner,
            is_bid,
            price,
            original_quantity: remaining,
            expire_timestamp,
        });
        order_id
    }

    /// Read-only precheck for `FillOrKill`/`PostOrAbort`: how much of
    /// `want_base` could actually be matched, skipping self-match and
    /// expired makers, without mutating anything.
    fn preview_fillable_base(
        &self,
        is_bid_taker: bool,
        taker_owner: OwnerId,
        price_limit: u64,
        now: u64,
        want_base: u64,
    ) -> u64 {
        let tree = if is_bid_taker { &self.asks.tree } else { &self.bids.tree };
        if tree.is_empty() {
            return 0;
        }
        let mut filled = 0u64;
        let (mut key, _) = if is_bid_taker { tree.min() } else { tree.max() };
        loop {
            if is_bid_taker && key > price_limit {
                break;
            }
            if !is_bid_taker && key < price_limit {
                break;
            }
            let (found, handle) = tree.find(key);
            debug_assert!(found);
            let tick = tree.get(handle).expect("handle from find() is valid");
            filled += tick
                .fillable(taker_owner, now, want_base - filled)
                .min(want_base - filled);
            if filled >= want_base {
                break;
            }
            let (next_key, next_handle) = if is_bid_taker {
                tree.next(key)
            } else {
                tree.previous(key)
            };
            if next_handle == crit_bit::SENTINEL {
                break;
            }
            key = next_key;
        }
        filled
    }

    /// The quote margin a quote-bounded market buy needs to lock up front:
    /// the worst case is every matched unit trading at `MAX_PRICE`, which
    /// would overflow — so a market order instead locks exactly what
    /// `preview_fillable_base` says will actually trade, computed against
    /// the best available asks (skipping the same self-match/expired
    /// makers the real match would skip) rather than a hypothetical worst
    /// price.
    fn quote_budget_for(&self, taker_owner: OwnerId, now: u64, base_quantity: u64) -> u64 {
        let mut remaining = base_quantity;
        let mut budget = 0u64;
        if self.asks.tree.is_empty() || remaining == 0 {
            return 0;
        }
        let (mut key, _) = self.asks.tree.min();
        loop {
            let (found, handle) = self.asks.tree.find(key);
            debug_assert!(found);
            let tick = self.asks.tree.get(handle).expect("handle from find() is valid");
            let take = tick.fillable(taker_owner, now, remaining).min(remaining);
            if take > 0 {
                let cost = fixed_point::mul(take, key).unwrap_or(u64::MAX);
                let commission = math::taker_commission(cost, self.taker_fee_rate);
                budget = budget.saturating_add(cost).saturating_add(commission);
                remaining -= take;
            }
            if remaining == 0 {
                break;
            }
            let (next_key, next_handle) = self.asks.tree.next(key);
            if next_handle == crit_bit::SENTINEL {
                break;
            }
            key = next_key;
        }
        budget
    }

    // ---- cancellation ----

    /// Cancels a single resting order. `is_bid` must match the order's
    /// actual side (derivable by the caller from `order_id <
    /// MIN_ASK_ORDER_ID`), since bids and asks are distinct trees.
    pub fn cancel_order(
        &mut self,
        cap: &AccountCap,
        is_bid: bool,
        order_id: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        let owner = cap.owner();
        let actual_owner = *self
            .order_owner
            .get(&order_id)
            .ok_or(PoolError::InvalidOrderId)?;
        if actual_owner != owner {
            return Err(PoolError::UnauthorizedCancel);
        }
        let price = self
            .price_of_open_order(owner, order_id)
            .expect("order_owner and usr_open_orders are kept in sync");

        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        let (found, handle) = side.tree.find(price);
        if !found {
            return Err(PoolError::InvalidOrderId);
        }
        let order = {
            let tick = side.tree.get_mut(handle).expect("price just looked up");
            tick.remove(order_id).ok_or(PoolError::InvalidOrderId)?
        };
        // `price` came from `owner`'s own open-order index, so this can
        // never actually fire; kept as a guard against index corruption.
        debug_assert_eq!(order.owner, owner, "open-order index pointed at another owner's order");
        side.remove_tick_if_empty(handle);
        forget_open_order(&mut self.usr_open_orders, &mut self.order_owner, owner, order_id);

        if is_bid {
            let margin = fixed_point::mul(order.quantity, order.price).expect("margin always fits u64");
            self.quote_custodian.unlock(owner, margin);
        } else {
            self.base_custodian.unlock(owner, order.quantity);
        }
        sink.emit(Event::OrderCanceled {
            order_id,
            owner,
            is_bid,
            price: order.price,
            quantity: order.quantity,
        });
        Ok(())
    }

    /// Cancels every order the caller owns. Never errors — an owner with no
    /// open orders simply cancels nothing.
    pub fn cancel_all_orders(&mut self, cap: &AccountCap, sink: &mut impl EventSink) {
        let owner = cap.owner();
        let entries = self.usr_open_orders.remove(&owner).unwrap_or_default();
        let mut cancels = Vec::with_capacity(entries.len());
        for (order_id, price) in entries {
            let is_bid = order_id < MIN_ASK_ORDER_ID;
            let side = if is_bid { &mut self.bids } else { &mut self.asks };
            let (_, handle) = side.tree.find(price);
            if handle == crit_bit::SENTINEL {
                continue;
            }
            let removed = {
                let tick = side.tree.get_mut(handle).expect("handle from find() is valid");
                tick.remove(order_id)
            };
            let Some(order) = removed else { continue };
            side.remove_tick_if_empty(handle);
            self.order_owner.remove(&order_id);
            if is_bid {
                let margin = fixed_point::mul(order.quantity, order.price).expect("margin always fits u64");
                self.quote_custodian.unlock(owner, margin);
            } else {
                self.base_custodian.unlock(owner, order.quantity);
            }
            cancels.push(CancelComponent {
                order_id,
                owner,
                is_bid,
                price: order.price,
                quantity: order.quantity,
            });
        }
        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
    }

    /// Cancels a caller-supplied batch of order ids. Unlike
    /// `clean_up_expired_orders`, an invalid id here (unknown, or not owned
    /// by `cap`) aborts the entire call with no mutation — there is no
    /// owner/expiry mismatch to tolerate, since every id is supposed to be
    /// the caller's own. Consecutive ids sharing a price reuse the tick
    /// handle from the previous iteration instead of re-running `tree.find`.
    pub fn batch_cancel_order(
        &mut self,
        cap: &AccountCap,
        order_ids: &[u64],
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        let owner = cap.owner();
        for &order_id in order_ids {
            if self.price_of_open_order(owner, order_id).is_none() {
                return Err(PoolError::InvalidOrderId);
            }
        }

        let mut cancels = Vec::with_capacity(order_ids.len());
        let mut cached: Option<(bool, u64, crit_bit::Index)> = None;
        for &order_id in order_ids {
            let is_bid = order_id < MIN_ASK_ORDER_ID;
            let price = self
                .price_of_open_order(owner, order_id)
                .expect("validated as present above");

            let handle = match cached {
                Some((cb, cp, ch)) if cb == is_bid && cp == price => ch,
                _ => {
                    let side = if is_bid { &self.bids } else { &self.asks };
                    let (found, handle) = side.tree.find(price);
                    debug_assert!(found, "price came from the owner's own open-order index");
                    handle
                }
            };

            let side = if is_bid { &mut self.bids } else { &mut self.asks };
            let order = {
                let tick = side.tree.get_mut(handle).expect("handle just looked up or cached");
                tick.remove(order_id).expect("validated as present above")
            };
            forget_open_order(&mut self.usr_open_orders, &mut self.order_owner, owner, order_id);

            if side.tree.get(handle).map(|t| t.is_empty()).unwrap_or(false) {
                side.remove_tick_if_empty(handle);
                cached = None;
            } else {
                cached = Some((is_bid, price, handle));
            }

            if is_bid {
                let margin = fixed_point::mul(order.quantity, order.price).expect("margin always fits u64");
                self.quote_custodian.unlock(owner, margin);
            } else {
                self.base_custodian.unlock(owner, order.quantity);
            }
            cancels.push(CancelComponent {
                order_id,
                owner,
                is_bid,
                price: order.price,
                quantity: order.quantity,
            });
        }
        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
        Ok(())
    }

    fn price_of_open_order(&self, owner: OwnerId, order_id: u64) -> Option<u64> {
        self.usr_open_orders
            .get(&owner)?
            .iter()
            .find(|(id, _)| *id == order_id)
            .map(|(_, price)| *price)
    }

    /// Cleans up a caller-supplied batch of `(order_id, owner)` pairs
    /// (parallel slices). Anyone may call this — there is no owner
    /// authentication. Each pair is looked up through `owner`'s own
    /// open-order index: a pair naming an id that isn't actually open for
    /// that owner (wrong owner, unknown id, already removed) is silently
    /// skipped. If a pair *does* resolve to a live order whose expiry has
    /// not yet passed, the whole call aborts with no mutation — callers are
    /// expected to only submit orders they've confirmed are expired.
    pub fn clean_up_expired_orders(
        &mut self,
        now: u64,
        order_ids: &[u64],
        owners: &[OwnerId],
        sink: &mut impl EventSink,
    ) -> Result<(), PoolError> {
        for (&order_id, &owner) in order_ids.iter().zip(owners.iter()) {
            if let Some(order) = self.find_open_order(owner, order_id) {
                if !order.is_expired(now) {
                    return Err(PoolError::OrderNotYetExpired);
                }
            }
        }

        let mut cancels = Vec::new();
        for (&order_id, &owner) in order_ids.iter().zip(owners.iter()) {
            let Some(price) = self.price_of_open_order(owner, order_id) else { continue };
            let is_bid = order_id < MIN_ASK_ORDER_ID;
            let side = if is_bid { &mut self.bids } else { &mut self.asks };
            let (found, handle) = side.tree.find(price);
            if !found {
                continue;
            }
            let removed = {
                let tick = side.tree.get_mut(handle).expect("handle from find() is valid");
                tick.remove(order_id)
            };
            let Some(order) = removed else { continue };
            side.remove_tick_if_empty(handle);
            forget_open_order(&mut self.usr_open_orders, &mut self.order_owner, owner, order_id);
            if is_bid {
                let margin = fixed_point::mul(order.quantity, order.price).expect("margin always fits u64");
                self.quote_custodian.unlock(owner, margin);
            } else {
                self.base_custodian.unlock(owner, order.quantity);
            }
            cancels.push(CancelComponent {
                order_id,
                owner,
                is_bid,
                price: order.price,
                quantity: order.quantity,
            });
        }
        if !cancels.is_empty() {
            sink.emit(Event::AllOrdersCanceled(cancels));
        }
        Ok(())
    }

    /// Read-only lookup of a still-open order by `(owner, order_id)`,
    /// routed through the owner's own open-order index rather than a full
    /// tree scan. Used by `clean_up_expired_orders`'s precheck pass.
    fn find_open_order(&self, owner: OwnerId, order_id: u64) -> Option<&Order> {
        let price = self.price_of_open_order(owner, order_id)?;
        let is_bid = order_id < MIN_ASK_ORDER_ID;
        let tree = if is_bid { &self.bids.tree } else { &self.asks.tree };
        let (found, handle) = tree.find(price);
        if !found {
            return None;
        }
        tree.get(handle)?.get(order_id)
    }

    // ---- queries ----

    pub fn get_market_price(&self) -> (Option<u64>, Option<u64>) {
        let best_bid = if self.bids.tree.is_empty() { None } else { Some(self.bids.tree.max().0) };
        let best_ask = if self.asks.tree.is_empty() { None } else { Some(self.asks.tree.min().0) };
        (best_bid, best_ask)
    }

    /// `(price, total_open_quantity)` for every bid level, best price first
    /// (descending).
    pub fn get_level2_book_status_bid_side(&self) -> Vec<(u64, u64)> {
        level2(&self.bids.tree, false)
    }

    /// `(price, total_open_quantity)` for every ask level, best price first
    /// (ascending).
    pub fn get_level2_book_status_ask_side(&self) -> Vec<(u64, u64)> {
        level2(&self.asks.tree, true)
    }

    pub fn get_order_status(&self, is_bid: bool, order_id: u64) -> Option<Order> {
        let tree = if is_bid { &self.bids.tree } else { &self.asks.tree };
        find_order_readonly(tree, order_id)
    }

    pub fn list_open_orders(&self, owner: OwnerId) -> Vec<(u64, u64)> {
        self.usr_open_orders.get(&owner).cloned().unwrap_or_default()
    }
}

fn record_open_order(
    map: &mut HashMap<OwnerId, Vec<(u64, u64)>>,
    owners: &mut HashMap<u64, OwnerId>,
    owner: OwnerId,
    order_id: u64,
    price: u64,
) {
    map.entry(owner).or_default().push((order_id, price));
    owners.insert(order_id, owner);
}

fn forget_open_order(
    map: &mut HashMap<OwnerId, Vec<(u64, u64)>>,
    owners: &mut HashMap<u64, OwnerId>,
    owner: OwnerId,
    order_id: u64,
) {
    if let Some(entries) = map.get_mut(&owner) {
        entries.retain(|(id, _)| *id != order_id);
        if entries.is_empty() {
            map.remove(&owner);
        }
    }
    owners.remove(&order_id);
}

fn front_of(tree: &crit_bit::Tree<crate::types::TickLevel>, handle: crit_bit::Index) -> Order {
    tree.get(handle)
        .expect("handle from min()/max() is valid")
        .front()
        .expect("tick level returned by min()/max() is never empty")
        .clone()
}

fn skip_maker(maker: &Order, taker_owner: OwnerId, now: u64) -> bool {
    maker.is_expired(now) || maker.owner == taker_owner
}

/// Settles one fill of a bid taker against an ask maker (maker's base is
/// locked). Returns `(taker's total quote cost, base the taker receives)`.
#[allow(clippy::too_many_arguments)]
fn settle_bid_fill(
    maker: &Order,
    taker_order_id: u64,
    filled_base: u64,
    price: u64,
    taker_fee_rate: u64,
    maker_rebate_rate: u64,
    base_custodian: &mut Custodian<Base>,
    quote_custodian: &mut Custodian<Quote>,
    quote_fee_acc: &mut u64,
    sink: &mut impl EventSink,
) -> (u64, u64) {
    let mr = fixed_point::unsafe_mul_round(filled_base, price);
    let quote_no_commission = mr.result;
    let dust = u64::from(mr.rounded_down);
    let commission = math::taker_commission(quote_no_commission, taker_fee_rate);
    let rebate = math::maker_rebate(quote_no_commission, maker_rebate_rate);

    base_custodian.decrease_locked(maker.owner, filled_base);
    quote_custodian.increase_available(
        maker.owner,
        quote_no_commission.saturating_sub(dust).saturating_add(rebate),
    );
    *quote_fee_acc = quote_fee_acc
        .saturating_add(commission.saturating_sub(rebate))
        .saturating_add(dust);

    sink.emit(Event::OrderFilled {
        maker_order_id: maker.order_id,
        taker_order_id,
        is_bid: true,
        price,
        base_quantity: filled_base,
        quote_quantity: quote_no_commission,
        maker_rebate: rebate,
        taker_commission: commission,
    });

    (quote_no_commission.saturating_add(commission), filled_base)
}

/// Settles one fill of an ask taker against a bid maker (maker's quote is
/// locked). Returns `(quote the taker receives, base the taker spends)`.
#[allow(clippy::too_many_arguments)]
fn settle_ask_fill(
    maker: &Order,
    taker_order_id: u64,
    filled_base: u64,
    price: u64,
    taker_fee_rate: u64,
    maker_rebate_rate: u64,
    base_custodian: &mut Custodian<Base>,
    quote_custodian: &mut Custodian<Quote>,
    quote_fee_acc: &mut u64,
    sink: &mut impl EventSink,
) -> (u64, u64) {
    let mr = fixed_point::unsafe_mul_round(filled_base, price);
    let quote_no_commission = mr.result;
    let dust = u64::from(mr.rounded_down);
    let commission = math::taker_commission(quote_no_commission, taker_fee_rate);
    let rebate = math::maker_rebate(quote_no_commission, maker_rebate_rate);

    quote_custodian.decrease_locked(maker.owner, quote_no_commission.saturating_add(dust));
    base_custodian.increase_available(maker.owner, filled_base);
    quote_custodian.increase_available(maker.owner, rebate);
    *quote_fee_acc = quote_fee_acc
        .saturating_add(commission.saturating_sub(rebate))
        .saturating_add(dust);

    sink.emit(Event::OrderFilled {
        maker_order_id: maker.order_id,
        taker_order_id,
        is_bid: false,
        price,
        base_quantity: filled_base,
        quote_quantity: quote_no_commission,
        maker_rebate: rebate,
        taker_commission: commission,
    });

    (quote_no_commission.saturating_sub(commission), filled_base)
}

fn find_order_readonly(tree: &crit_bit::Tree<crate::types::TickLevel>, order_id: u64) -> Option<Order> {
    if tree.is_empty() {
        return None;
    }
    let (mut key, _) = tree.min();
    loop {
        let (_, handle) = tree.find(key);
        if let Some(order) = tree.get(handle).and_then(|t| t.get(order_id)) {
            return Some(order.clone());
        }
        let (next_key, next_handle) = tree.next(key);
        if next_handle == crit_bit::SENTINEL {
            return None;
        }
        key = next_key;
    }
}

fn level2(tree: &crit_bit::Tree<crate::types::TickLevel>, ascending: bool) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    if tree.is_empty() {
        return out;
    }
    let (mut key, _) = if ascending { tree.min() } else { tree.max() };
    loop {
        let (_, handle) = tree.find(key);
        let tick = tree.get(handle).expect("handle from find() is valid");
        out.push((key, tick.total_quantity()));
        let (next_key, next_handle) = if ascending { tree.next(key) } else { tree.previous(key) };
        if next_handle == crit_bit::SENTINEL {
            break;
        }
        key = next_key;
    }
    out
}

