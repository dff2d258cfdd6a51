//! Event construction. Dispatching an event to the outside world (chain log,
//! indexer, etc.) is the host's job; this crate only builds the payloads and
//! hands them to whatever `EventSink` the caller supplies.

use crate::OwnerId;
use sails_rs::prelude::*;

/// One maker swept by self-match prevention or expiry cleanup, batched into
/// a single `AllOrdersCanceled` event per match/cleanup call.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub struct CancelComponent {
    pub order_id: u64,
    pub owner: OwnerId,
    pub is_bid: bool,
    pub price: u64,
    pub quantity: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
#[codec(crate = sails_rs::scale_codec)]
#[scale_info(crate = sails_rs::scale_info)]
pub enum Event {
    PoolCreated {
        tick_size: u64,
        lot_size: u64,
        taker_fee_rate: u64,
        maker_rebate_rate: u64,
    },
    OrderPlaced {
        order_id: u64,
        client_order_id: u64,
        owner: OwnerId,
        is_bid: bool,
        price: u64,
        original_quantity: u64,
        expire_timestamp: u64,
    },
    OrderCanceled {
        order_id: u64,
        owner: OwnerId,
        is_bid: bool,
        price: u64,
        quantity: u64,
    },
    AllOrdersCanceled(Vec<CancelComponent>),
    OrderFilled {
        maker_order_id: u64,
        taker_order_id: u64,
        is_bid: bool,
        price: u64,
        base_quantity: u64,
        quote_quantity: u64,
        maker_rebate: u64,
        taker_commission: u64,
    },
    DepositAsset {
        owner: OwnerId,
        is_base: bool,
        quantity: u64,
    },
    WithdrawAsset {
        owner: OwnerId,
        is_base: bool,
        quantity: u64,
    },
}

/// Destination for events raised while a `Pool` method runs. The host wraps
/// this around its real dispatch mechanism; tests use `VecEventSink`.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

#[derive(Default, Debug)]
pub struct VecEventSink(pub Vec<Event>);

impl EventSink for VecEventSink {
    fn emit(&mut self, event: Event) {
        self.0.push(event);
    }
}

/// Convenience sink that drops everything, for call sites that don't care.
#[derive(Default, Debug)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: Event) {}
}
