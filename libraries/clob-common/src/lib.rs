#![no_std]

extern crate alloc;

pub mod events;

use sails_rs::prelude::*;

/// Opaque identity tag. The host runtime is responsible for binding this to
/// a real chain address/object id; this crate only ever compares, hashes and
/// copies it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct OwnerId(pub [u8; 32]);

impl OwnerId {
    pub const ZERO: OwnerId = OwnerId([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        OwnerId(bytes)
    }
}

/// Order side. `Buy` orders are bids, `Sell` orders are asks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_bid(self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Self-match prevention policy. Only `CancelOldest` (value `0`) exists
/// today; the field width in the wire encoding leaves room for more.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum SelfMatchPrevention {
    CancelOldest = 0,
}

impl SelfMatchPrevention {
    pub fn from_u8(v: u8) -> Result<Self, PoolError> {
        match v {
            0 => Ok(SelfMatchPrevention::CancelOldest),
            _ => Err(PoolError::InvalidSelfMatchingPreventionArg),
        }
    }
}

/// Time-in-force restriction for `place_limit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum TimeInForce {
    NoRestriction,
    ImmediateOrCancel,
    FillOrKill,
    PostOrAbort,
}

/// A point in time, in milliseconds, supplied by the host. The crate never
/// reads a wall clock itself.
pub trait Clock {
    fn timestamp_ms(&self) -> u64;
}

/// Fixed-point scale shared by `taker_fee_rate`, `maker_rebate_rate` and the
/// fixed-point math helpers: a rate/ratio of `r` means `r / FLOAT_SCALING`.
pub const FLOAT_SCALING: u64 = 1_000_000_000;
pub const MAX_PRICE: u64 = u64::MAX;
pub const MIN_PRICE: u64 = 0;
pub const MIN_ASK_ORDER_ID: u64 = 1 << 63;
pub const MIN_BID_ORDER_ID: u64 = 1;

/// Hard-coded base-quantity granularity used only inside the quote-quantity
/// matching path (`match_bid_by_quote`); independent of a pool's
/// configurable `lot_size`.
pub const LOT_SIZE: u64 = 1000;

pub const FEE_AMOUNT_FOR_CREATE_POOL: u64 = 1_000_000_000;
pub const REFERENCE_TAKER_FEE_RATE: u64 = 2_500_000;
pub const REFERENCE_MAKER_REBATE_RATE: u64 = 1_500_000;

/// Every error this crate's public entry points can return. Grouped into the
/// four categories the engine distinguishes; every entry point validates
/// before mutating so that an `Err` here always means zero state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum PoolError {
    // --- Validation ---
    InvalidPrice,
    InvalidQuantity,
    InvalidTickPrice,
    InvalidTickSizeMinSize,
    InvalidPair,
    InvalidFee,
    InvalidExpireTimestamp,
    InvalidRestriction,
    InvalidSelfMatchingPreventionArg,
    InvalidFeeRateRebateRate,
    InsufficientBaseCoin,
    InsufficientQuoteCoin,

    // --- Authorization ---
    UnauthorizedCancel,
    IncorrectPoolOwner,
    AdminAccountCapRequired,
    InvalidUser,

    // --- Lookup ---
    InvalidOrderId,
    /// No pool is registered under the given pool id.
    PoolNotFound,

    // --- Time-in-force violation ---
    OrderCannotBeFullyFilled,
    OrderCannotBeFullyPassive,

    // --- Expiry cleanup: an entry resolved to a still-live order whose
    // expiry has not yet passed; the whole clean_up_expired_orders call
    // aborts rather than skipping it.
    OrderNotYetExpired,

    // --- Internal consistency (should never surface in practice) ---
    MathOverflow,
}
