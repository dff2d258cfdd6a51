//! Settlement arithmetic layered on top of `fixed-point`'s raw `mul`/
//! `unsafe_mul_round`: turning a fill's notional quote into the taker's
//! commission (always rounded up, so the protocol never accrues a deficit)
//! and the maker's rebate (floored).

use clob_common::LOT_SIZE;

/// `ceil(filled_quote_no_commission * taker_fee_rate / S)`. The
/// quote-quantity match path additionally floors a zero result up to `1`
/// when the multiplication itself rounded down (see
/// `taker_commission_quote_bounded`); the direct bid/ask paths always round
/// up any nonzero residue and never need that floor.
pub fn taker_commission(filled_quote_no_commission: u64, taker_fee_rate: u64) -> u64 {
    let r = fixed_point::unsafe_mul_round(filled_quote_no_commission, taker_fee_rate);
    if r.rounded_down {
        r.result + 1
    } else {
        r.result
    }
}

/// Same rounding contract as [`taker_commission`], but forces a nonzero
/// result up to `1` when the source spec's quote-quantity path would
/// otherwise underflow to `0` on a nonzero notional.
pub fn taker_commission_quote_bounded(filled_quote_no_commission: u64, taker_fee_rate: u64) -> u64 {
    let commission = taker_commission(filled_quote_no_commission, taker_fee_rate);
    if commission == 0 && filled_quote_no_commission > 0 {
        1
    } else {
        commission
    }
}

/// `floor(filled_quote_no_commission * maker_rebate_rate / S)`. May be `0`
/// by underflow — that's the spec's contract, not a bug.
pub fn maker_rebate(filled_quote_no_commission: u64, maker_rebate_rate: u64) -> u64 {
    fixed_point::unsafe_mul(filled_quote_no_commission, maker_rebate_rate)
}

/// Rounds `base` down to the nearest multiple of the hard-coded
/// quote-quantity-match granularity (`LOT_SIZE`, distinct from a pool's
/// configurable `lot_size`).
pub fn round_down_to_lot(base: u64) -> u64 {
    (base / LOT_SIZE) * LOT_SIZE
}
