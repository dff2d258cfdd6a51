//! Integration-level scenario tests against `Pool`, exercising the matching
//! loops, settlement, and cancellation end to end rather than one module at
//! a time. Mirrors the distilled spec's §8 scenarios A-F plus a handful of
//! the quantified invariants that only make sense once custody, the tree,
//! and the matching loop are wired together.

extern crate std;

use crate::Pool;
use account_cap::{AccountCap, CapMinter};
use clob_common::events::{Event, VecEventSink};
use clob_common::{OwnerId, PoolError, TimeInForce, MIN_ASK_ORDER_ID, MIN_BID_ORDER_ID};
use fixed_point::SCALE;

const FAR_FUTURE: u64 = u64::MAX - 1;

fn trader(minter: &mut CapMinter) -> AccountCap {
    minter.mint_account_cap()
}

fn fund(pool: &mut Pool, owner: OwnerId, base: u64, quote: u64) {
    let mut sink = VecEventSink::default();
    pool.deposit_base(owner, base, &mut sink);
    pool.deposit_quote(owner, quote, &mut sink);
}

/// Scenario A: zero-fee pool, a ladder of resting bids, then a taker FOK
/// sell too large to fully fill aborts with no state change.
#[test]
fn scenario_a_basic_fill_ladder_and_fok_abort() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    let bob = trader(&mut minter);

    fund(&mut pool, alice.owner(), 10_000, 10_000 * SCALE);
    fund(&mut pool, bob.owner(), 10_000, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    pool.place_limit(&alice, true, 5 * SCALE, 200, 1, FAR_FUTURE, TimeInForce::PostOrAbort, 0, 0, &mut sink)
        .unwrap();
    pool.place_limit(&alice, true, 4 * SCALE, 200, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    pool.place_limit(&alice, true, 4 * SCALE, 200, 3, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    pool.place_limit(&alice, false, 10 * SCALE, 1000, 4, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();

    assert_eq!(pool.bids.peek_next_order_id(), MIN_BID_ORDER_ID + 3);
    assert_eq!(pool.asks.peek_next_order_id(), MIN_ASK_ORDER_ID + 1);

    let (_, _, quote_locked) = {
        let (_, _, qa, ql) = pool.account_balance(alice.owner());
        (qa, ql, ql)
    };
    let _ = quote_locked;
    let (base_avail, base_locked, _quote_avail, quote_locked) = pool.account_balance(alice.owner());
    assert_eq!(quote_locked, 2600, "200@5 + 200@4 + 200@4 = 1000+800+800");
    assert_eq!(base_locked, 1000);
    let _ = base_avail;

    let before = pool.account_balance(bob.owner());
    let err = pool
        .place_limit(&bob, false, 4 * SCALE, 601, 5, FAR_FUTURE, TimeInForce::FillOrKill, 0, 0, &mut sink)
        .unwrap_err();
    assert_eq!(err, PoolError::OrderCannotBeFullyFilled);
    assert_eq!(pool.account_balance(bob.owner()), before, "FOK abort must not mutate custody");
    assert_eq!(pool.bids.peek_next_order_id(), MIN_BID_ORDER_ID + 3, "no order id consumed on abort");
}

/// Scenario B: an IOC taker partially fills across two price levels, drains
/// the last one, and the unsold remainder returns to the taker's available
/// balance.
#[test]
fn scenario_b_ioc_partial_fill() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    let bob = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);
    fund(&mut pool, bob.owner(), 10_000, 0);

    let mut sink = VecEventSink::default();
    pool.place_limit(&alice, true, 5 * SCALE, 200, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    pool.place_limit(&alice, true, 4 * SCALE, 200, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    pool.place_limit(&alice, true, 4 * SCALE, 200, 3, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    let (order_id, filled_base, filled_quote) = pool
        .place_limit(&bob, false, 4 * SCALE, 800, 4, FAR_FUTURE, TimeInForce::ImmediateOrCancel, 0, 0, &mut sink)
        .unwrap();
    assert_eq!(order_id, 0, "IOC never rests");
    assert_eq!(filled_base, 600, "200@5 + 200@4 + 200@4");
    assert_eq!(filled_quote, 2600);

    let (_, ask_book) = pool.get_market_price();
    assert!(ask_book.is_none(), "taker never rested");
    assert!(pool.get_level2_book_status_bid_side().is_empty(), "both bid levels fully drained");

    let (base_avail, base_locked, _, _) = pool.account_balance(bob.owner());
    assert_eq!(base_locked, 0, "nothing left locked for an IOC taker");
    assert_eq!(base_avail, 10_000 - 800 + (800 - filled_base), "unsold remainder returned to available");
}

/// Scenario C: a taker whose own resting bid sits at the crossing price is
/// skipped (not matched), its margin unlocked, and the new order rests.
#[test]
fn scenario_c_self_match_skip() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    fund(&mut pool, alice.owner(), 1_000, 1_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (bid_id, _, _) = pool
        .place_limit(&alice, true, 5 * SCALE, 100, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    assert_ne!(bid_id, 0);

    let before_quote_locked = pool.account_balance(alice.owner()).3;
    assert_eq!(before_quote_locked, 500);

    sink.0.clear();
    let (ask_id, filled_base, _) = pool
        .place_limit(&alice, false, 5 * SCALE, 100, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    assert_eq!(filled_base, 0, "the only candidate maker is self-owned, so nothing fills");
    assert_ne!(ask_id, 0, "the sell rests since it matched nothing");

    let (_, quote_locked_after) = (pool.account_balance(alice.owner()).2, pool.account_balance(alice.owner()).3);
    assert_eq!(quote_locked_after, 0, "self-matched bid's margin was unlocked");

    let cancel_batches: std::vec::Vec<_> = sink
        .0
        .iter()
        .filter_map(|e| match e {
            Event::AllOrdersCanceled(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(cancel_batches.len(), 1, "exactly one batched event per match call");
    assert_eq!(cancel_batches[0].len(), 1);
    assert_eq!(cancel_batches[0][0].order_id, bid_id);
}

/// Scenario D: a fractional price causes `mul_round` to round down; the
/// rounding residue is skimmed into `quote_asset_trading_fees` rather than
/// credited to the maker.
#[test]
fn scenario_d_dust_to_protocol() {
    let mut pool = Pool::new_custom(1, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let taker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 3, 0);
    fund(&mut pool, taker.owner(), 0, 100);

    let price = SCALE + 1;
    let mut sink = VecEventSink::default();
    pool.place_limit(&maker, false, price, 3, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    let (_, filled_base, filled_quote) = pool
        .place_limit(&taker, true, price, 3, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    assert_eq!(filled_base, 3);
    assert_eq!(filled_quote, 3, "3 * (S+1) / S floors to 3 with taker_fee_rate = 0");

    assert_eq!(pool.quote_asset_trading_fees, 1, "the 1-unit rounding residue accrues to the protocol");
    let (_, _, maker_quote_avail, _) = pool.account_balance(maker.owner());
    assert_eq!(maker_quote_avail, 2, "maker receives filled_quote_no_commission - dust");
}

/// Scenario E: a quote-bounded market buy fills only as much of the best
/// ask level as its quote budget affords, lot-aligned to the hard-coded
/// `LOT_SIZE` granularity (scaled up from the distilled spec's illustrative
/// numbers so the fill lands on a `LOT_SIZE`-aligned quantity).
#[test]
fn scenario_e_quote_bounded_match() {
    let mut pool = Pool::new_custom(1 * SCALE, 1000, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    let bob = trader(&mut minter);
    fund(&mut pool, alice.owner(), 20_000, 0);
    fund(&mut pool, bob.owner(), 0, 1_000_000 * SCALE);

    let mut sink = VecEventSink::default();
    pool.place_limit(&alice, false, 100 * SCALE, 10_000, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    pool.place_limit(&alice, false, 101 * SCALE, 10_000, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    // `place_market_by_quote`'s budget is a plain quote amount (the same
    // units `mul(base, price)` returns, i.e. `base * 100` here at this
    // price) — not pre-multiplied by `SCALE` the way `price` itself is.
    let (filled_base, quote_spent) = pool.place_market_by_quote(&bob, 500_000, 0, &mut sink).unwrap();
    assert_eq!(filled_base, 5000, "500_000 / 100 = 5000 base, lot-aligned");
    assert_eq!(quote_spent, 500_000, "zero fee rates: exact cost, no leftover");

    let (_, _, quote_avail, quote_locked) = pool.account_balance(bob.owner());
    assert_eq!(quote_locked, 0, "fully spent, nothing left locked");
    assert_eq!(quote_avail, 1_000_000 * SCALE - 500_000);

    assert_eq!(pool.get_level2_book_status_bid_side(), std::vec::Vec::new());
    let remaining_ask = pool.get_level2_book_status_ask_side();
    assert_eq!(remaining_ask[0], (100 * SCALE, 5000), "half the first level remains");
}

/// Open Question (spec §9): at the exact boundary where the taker's
/// remaining quote equals the maker's full-fill cost, the quote-bounded
/// path recomputes `filled_base` from the taker-side budget rather than
/// special-casing a full maker fill — this asserts the two arithmetic
/// routes agree when the division is exact, as DESIGN.md documents.
#[test]
fn quote_bound_exact_boundary() {
    let mut pool = Pool::new_custom(1 * SCALE, 1000, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let taker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 10_000, 0);
    fund(&mut pool, taker.owner(), 0, 1_000_000 * SCALE);

    let mut sink = VecEventSink::default();
    pool.place_limit(&maker, false, 100 * SCALE, 10_000, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    // exact cost of a full 10_000-base fill at 100*S with zero fees, in the
    // same plain quote units `mul(base, price)` returns (not pre-scaled).
    let exact_cost = 10_000 * 100;
    let (filled_base, quote_spent) = pool.place_market_by_quote(&taker, exact_cost, 0, &mut sink).unwrap();
    assert_eq!(filled_base, 10_000, "exact boundary fills the maker fully either way");
    assert_eq!(quote_spent, exact_cost);
    assert!(pool.get_level2_book_status_ask_side().is_empty(), "maker fully drained and tick removed");
}

/// Scenario F: an expired resting order is skipped (not matched) by a later
/// taker, and `clean_up_expired_orders` is idempotent against an order
/// that's already gone.
#[test]
fn scenario_f_expiry_cleanup() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let taker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 1_000, 0);
    fund(&mut pool, taker.owner(), 0, 1_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (order_id, _, _) = pool
        .place_limit(&maker, false, 10 * SCALE, 100, 1, 1000, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();

    // a taker arrives after the order expired; it is skipped, not matched.
    let (filled_base, _) = pool.place_market(&taker, true, 100, 2000, &mut sink).unwrap();
    assert_eq!(filled_base, 0, "expired maker is skipped, not filled");
    assert!(pool.get_level2_book_status_ask_side().is_empty(), "the skip removed the now-empty tick");

    let (_, base_locked) = (pool.account_balance(maker.owner()).0, pool.account_balance(maker.owner()).1);
    assert_eq!(base_locked, 0, "margin was unlocked on skip");

    // clean_up_expired_orders on the now-removed order is a silent no-op,
    // not an error, and can be called again without effect.
    pool.clean_up_expired_orders(2000, &[order_id], &[maker.owner()], &mut sink).unwrap();
    pool.clean_up_expired_orders(2000, &[order_id], &[maker.owner()], &mut sink).unwrap();
}

#[test]
fn clean_up_expired_orders_aborts_on_not_yet_expired_entry() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 1_000, 0);

    let mut sink = VecEventSink::default();
    let (order_id, _, _) = pool
        .place_limit(&maker, false, 10 * SCALE, 100, 1, 5000, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();

    let err = pool
        .clean_up_expired_orders(1000, &[order_id], &[maker.owner()], &mut sink)
        .unwrap_err();
    assert_eq!(err, PoolError::OrderNotYetExpired);
    // order must still be resting: no partial mutation on abort.
    assert!(pool.get_order_status(false, order_id).is_some());
}

#[test]
fn clean_up_expired_orders_skips_mismatched_pairs() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let stranger = trader(&mut minter);
    fund(&mut pool, maker.owner(), 1_000, 0);

    let mut sink = VecEventSink::default();
    let (order_id, _, _) = pool
        .place_limit(&maker, false, 10 * SCALE, 100, 1, 500, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();

    // wrong owner paired with a real order id: silently skipped, not an error.
    pool.clean_up_expired_orders(1000, &[order_id], &[stranger.owner()], &mut sink).unwrap();
    assert!(pool.get_order_status(false, order_id).is_some(), "mismatched pair must not remove the order");

    // unknown order id: also silently skipped.
    pool.clean_up_expired_orders(1000, &[999_999], &[maker.owner()], &mut sink).unwrap();
}

/// `place_limit` must credit the taker's own side of the trade into
/// `available` immediately, the same way `place_market` does — a bid taker
/// receives base, an ask taker receives quote, independent of whether
/// anything is left to rest afterward.
#[test]
fn place_limit_credits_taker_with_its_own_fill() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let bid_taker = trader(&mut minter);
    let ask_taker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 200, 200 * SCALE);
    fund(&mut pool, bid_taker.owner(), 0, 1_000 * SCALE);
    fund(&mut pool, ask_taker.owner(), 100, 0);

    let mut sink = VecEventSink::default();
    // maker rests an ask; bid_taker crosses it and must receive the base.
    pool.place_limit(&maker, false, 10 * SCALE, 100, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    let (_, filled_base, _) = pool
        .place_limit(&bid_taker, true, 10 * SCALE, 100, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    assert_eq!(filled_base, 100);
    let (base_avail, _, _, _) = pool.account_balance(bid_taker.owner());
    assert_eq!(base_avail, 100, "bid taker must receive the base it bought");

    // maker rests a bid; ask_taker crosses it and must receive the quote.
    pool.place_limit(&maker, true, 10 * SCALE, 100, 3, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    let (_, filled_base2, filled_quote2) = pool
        .place_limit(&ask_taker, false, 10 * SCALE, 100, 4, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();
    assert_eq!(filled_base2, 100);
    let (_, _, quote_avail, _) = pool.account_balance(ask_taker.owner());
    assert_eq!(quote_avail, filled_quote2, "ask taker must receive the quote its sale fetched");
    assert_eq!(quote_avail, 1000, "100 base * real price 10, zero fees");
}

/// Property 1 (custody conservation): the sum of every open order's margin
/// for an owner always equals that owner's locked balance of the
/// appropriate asset.
#[test]
fn property_custody_conservation() {
    let mut pool = Pool::new_custom(1 * SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    fund(&mut pool, alice.owner(), 10_000, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    pool.place_limit(&alice, true, 5 * SCALE, 100, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    pool.place_limit(&alice, true, 6 * SCALE, 200, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    pool.place_limit(&alice, false, 20 * SCALE, 300, 3, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    let mut expected_quote_locked = 0u64;
    let mut expected_base_locked = 0u64;
    for (order_id, _price) in pool.list_open_orders(alice.owner()) {
        let is_bid = order_id < MIN_ASK_ORDER_ID;
        let order = pool.get_order_status(is_bid, order_id).unwrap();
        if is_bid {
            expected_quote_locked += fixed_point::mul(order.quantity, order.price).unwrap();
        } else {
            expected_base_locked += order.quantity;
        }
    }

    let (_, base_locked, _, quote_locked) = pool.account_balance(alice.owner());
    assert_eq!(base_locked, expected_base_locked);
    assert_eq!(quote_locked, expected_quote_locked);
}

/// Property 2 (fee monotonicity): across a sequence of fills that never
/// calls `withdraw_fees`, `quote_asset_trading_fees` never decreases.
#[test]
fn property_fees_are_monotonically_nondecreasing() {
    let mut pool = Pool::new_custom(SCALE, 1, 2_500_000, 1_500_000, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let taker = trader(&mut minter);
    fund(&mut pool, maker.owner(), 100_000, 0);
    fund(&mut pool, taker.owner(), 0, 100_000 * SCALE);

    let mut sink = VecEventSink::default();
    let mut last_fees = pool.quote_asset_trading_fees;
    for i in 0..5u64 {
        pool.place_limit(&maker, false, (10 + i) * SCALE, 100, i + 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
        pool.place_market(&taker, true, 100, 0, &mut sink).unwrap();
        assert!(pool.quote_asset_trading_fees >= last_fees);
        last_fees = pool.quote_asset_trading_fees;
    }
    assert!(last_fees > 0, "a nonzero taker fee rate must have accrued something");
}

/// Property 3 (price-time priority): among makers at the same price, a
/// taker always consumes the smallest `order_id` first.
#[test]
fn property_price_time_priority_fifo_within_level() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let first = trader(&mut minter);
    let second = trader(&mut minter);
    let taker = trader(&mut minter);
    fund(&mut pool, first.owner(), 100, 0);
    fund(&mut pool, second.owner(), 100, 0);
    fund(&mut pool, taker.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (first_id, _, _) = pool.place_limit(&first, false, 10 * SCALE, 50, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    let (second_id, _, _) = pool.place_limit(&second, false, 10 * SCALE, 50, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    assert!(first_id < second_id);

    pool.place_market(&taker, true, 50, 0, &mut sink).unwrap();
    assert!(pool.get_order_status(false, first_id).is_none(), "the older order was consumed first");
    assert!(pool.get_order_status(false, second_id).is_some(), "the younger order is untouched");
}

/// Property 5 (no empty tick levels): canceling the sole order at a price
/// removes that price from the tree entirely.
#[test]
fn property_no_empty_tick_levels_survive_cancellation() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (order_id, _, _) = pool.place_limit(&alice, true, 5 * SCALE, 10, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    assert_eq!(pool.get_level2_book_status_bid_side().len(), 1);

    pool.cancel_order(&alice, true, order_id, &mut sink).unwrap();
    assert!(pool.get_level2_book_status_bid_side().is_empty(), "the only order at that price is gone, so is the level");
}

/// Property 6: cloning an `Order` yields an equal `Order`.
#[test]
fn property_order_clone_round_trips() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (order_id, _, _) = pool.place_limit(&alice, true, 5 * SCALE, 10, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    let order = pool.get_order_status(true, order_id).unwrap();
    assert_eq!(order.clone(), order);
}

#[test]
fn post_or_abort_rejects_when_it_would_cross() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let maker = trader(&mut minter);
    let poster = trader(&mut minter);
    fund(&mut pool, maker.owner(), 100, 0);
    fund(&mut pool, poster.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    pool.place_limit(&maker, false, 10 * SCALE, 100, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    let before = pool.account_balance(poster.owner());
    let err = pool
        .place_limit(&poster, true, 10 * SCALE, 50, 2, FAR_FUTURE, TimeInForce::PostOrAbort, 0, 0, &mut sink)
        .unwrap_err();
    assert_eq!(err, PoolError::OrderCannotBeFullyPassive);
    assert_eq!(pool.account_balance(poster.owner()), before);
}

/// `batch_cancel_order` cancels every listed order in one call, including
/// two ids that share a price (exercising the cached-handle path) alongside
/// one at a distinct price.
#[test]
fn batch_cancel_order_cancels_mixed_prices_in_one_call() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (a, _, _) = pool.place_limit(&alice, true, 5 * SCALE, 10, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    let (b, _, _) = pool.place_limit(&alice, true, 5 * SCALE, 20, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    let (c, _, _) = pool.place_limit(&alice, true, 6 * SCALE, 30, 3, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    pool.batch_cancel_order(&alice, &[a, b, c], &mut sink).unwrap();

    assert!(pool.get_level2_book_status_bid_side().is_empty(), "every level must be gone");
    assert_eq!(pool.account_balance(alice.owner()).3, 0, "all margin unlocked");
    assert_eq!(pool.list_open_orders(alice.owner()).len(), 0);

    let cancel_batches: std::vec::Vec<_> = sink
        .0
        .iter()
        .filter_map(|e| match e {
            Event::AllOrdersCanceled(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(cancel_batches.last().unwrap().len(), 3, "one batched event carrying all three");
}

/// An invalid id anywhere in the batch aborts the whole call with no
/// mutation, unlike `clean_up_expired_orders`'s silent-skip semantics.
#[test]
fn batch_cancel_order_aborts_on_any_invalid_id() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    let stranger = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (a, _, _) = pool.place_limit(&alice, true, 5 * SCALE, 10, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();

    let before = pool.account_balance(alice.owner());
    let err = pool.batch_cancel_order(&alice, &[a, 999_999], &mut sink).unwrap_err();
    assert_eq!(err, PoolError::InvalidOrderId);
    assert_eq!(pool.account_balance(alice.owner()), before, "no partial cancellation on abort");
    assert!(pool.get_order_status(true, a).is_some(), "order a must still be resting");

    // an id belonging to a different owner is just as invalid for `alice`.
    let (b, _, _) = pool.place_limit(&stranger, true, 5 * SCALE, 10, 2, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink).unwrap();
    let err = pool.batch_cancel_order(&alice, &[a, b], &mut sink).unwrap_err();
    assert_eq!(err, PoolError::InvalidOrderId);
    assert!(pool.get_order_status(true, a).is_some());
    assert!(pool.get_order_status(true, b).is_some());
}

/// `cancel_order` distinguishes an id nobody owns from an id somebody
/// *else* owns: the latter must report `UnauthorizedCancel`, not
/// `InvalidOrderId`, and must leave the order resting and the caller's
/// balances untouched.
#[test]
fn cancel_order_rejects_another_owners_order_id() {
    let mut pool = Pool::new_custom(SCALE, 1, 0, 0, 0).unwrap();
    let mut minter = CapMinter::new();
    let alice = trader(&mut minter);
    let bob = trader(&mut minter);
    fund(&mut pool, alice.owner(), 0, 10_000 * SCALE);

    let mut sink = VecEventSink::default();
    let (a, _, _) = pool
        .place_limit(&alice, true, 5 * SCALE, 10, 1, FAR_FUTURE, TimeInForce::NoRestriction, 0, 0, &mut sink)
        .unwrap();

    let before = pool.account_balance(alice.owner());
    let err = pool.cancel_order(&bob, true, a, &mut sink).unwrap_err();
    assert_eq!(err, PoolError::UnauthorizedCancel);
    assert_eq!(pool.account_balance(alice.owner()), before, "rejected cancel must not unlock alice's margin");
    assert!(pool.get_order_status(true, a).is_some(), "order must still be resting");

    // an id nobody has ever placed is reported differently: unknown, not unauthorized.
    let err = pool.cancel_order(&bob, true, a + 1, &mut sink).unwrap_err();
    assert_eq!(err, PoolError::InvalidOrderId);

    // the true owner can still cancel it.
    pool.cancel_order(&alice, true, a, &mut sink).unwrap();
    assert!(pool.get_order_status(true, a).is_none());
}
