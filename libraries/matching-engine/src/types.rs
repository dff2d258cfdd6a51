//! Maker order record and the tick-level FIFO queue that holds them.

use clob_common::OwnerId;
use intrusive_arena::{Arena, Index, Node};
use sails_rs::collections::HashMap;

/// A resting (maker) order. Mutated only by the matching engine (quantity
/// decrements) or by cancellation; destroyed at fill, cancel, expiry, or
/// self-match skip.
///
/// Invariants: `quantity <= original_quantity`; `price % tick_size == 0`;
/// `original_quantity % lot_size == 0`; `(order_id < MIN_ASK_ORDER_ID) ==
/// is_bid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: u64,
    pub client_order_id: u64,
    pub price: u64,
    pub original_quantity: u64,
    pub quantity: u64,
    pub is_bid: bool,
    pub owner: OwnerId,
    pub expire_timestamp: u64,
    pub self_matching_prevention: u8,
}

impl Order {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_timestamp <= now
    }
}

/// The set of resting orders at one exact price, FIFO-ordered by insertion.
/// Destroyed (removed from the owning `Tree`) in the same call that empties
/// its `open_orders`.
#[derive(Debug)]
pub struct TickLevel {
    pub price: u64,
    arena: Arena<Node<Order>>,
    list: intrusive_arena::List,
    by_order_id: HashMap<u64, Index>,
}

impl TickLevel {
    pub fn new(price: u64) -> Self {
        Self {
            price,
            arena: Arena::new(),
            list: intrusive_arena::List::new(),
            by_order_id: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.list.head.is_none()
    }

    /// Appends `order` to the back of the FIFO queue.
    pub fn push_back(&mut self, order: Order) {
        let order_id = order.order_id;
        let idx = self.list.push_back(&mut self.arena, order);
        self.by_order_id.insert(order_id, idx);
    }

    /// The order at the front of the FIFO queue (the next maker a taker
    /// visits at this price), if any.
    pub fn front(&self) -> Option<&Order> {
        self.list.peek_front(&self.arena)
    }

    pub fn front_mut(&mut self) -> Option<&mut Order> {
        let idx = self.list.head?;
        self.arena.get_mut(idx).map(|n| &mut n.value)
    }

    /// Removes and returns the order currently at the front of the queue.
    /// Caller must ensure the level is non-empty.
    pub fn remove_front(&mut self) -> Order {
        let order = self
            .list
            .pop_front(&mut self.arena)
            .expect("remove_front on empty tick level");
        self.by_order_id.remove(&order.order_id);
        order
    }

    /// Removes an order anywhere in the queue by id, used by direct
    /// cancellation (as opposed to matching, which always consumes the
    /// front).
    pub fn remove(&mut self, order_id: u64) -> Option<Order> {
        let idx = self.by_order_id.remove(&order_id)?;
        self.list.remove(&mut self.arena, idx)
    }

    pub fn get(&self, order_id: u64) -> Option<&Order> {
        let idx = *self.by_order_id.get(&order_id)?;
        self.arena.get(idx).map(|n| &n.value)
    }

    /// Sum of fillable quantity at this level against a taker from
    /// `taker_owner`, skipping orders that would be skipped by expiry or
    /// self-match prevention, capped at `budget`. Read-only — used by
    /// `FillOrKill`/`PostOrAbort` prechecks that must not mutate anything
    /// before deciding whether to proceed.
    pub fn fillable(&self, taker_owner: OwnerId, now: u64, budget: u64) -> u64 {
        let mut filled = 0u64;
        let mut cur = self.list.head;
        while let Some(idx) = cur {
            if filled >= budget {
                break;
            }
            let node = self.arena.get(idx).expect("list node missing from arena");
            let order = &node.value;
            if !order.is_expired(now) && order.owner != taker_owner {
                filled += order.quantity.min(budget - filled);
            }
            cur = node.next;
        }
        filled
    }

    /// Sum of `quantity` across every order resting at this level,
    /// regardless of owner or expiry — used for level2 book depth, which
    /// reports raw resting size rather than what a specific taker could
    /// fill.
    pub fn total_quantity(&self) -> u64 {
        let mut total = 0u64;
        let mut cur = self.list.head;
        while let Some(idx) = cur {
            let node = self.arena.get(idx).expect("list node missing from arena");
            total += node.value.quantity;
            cur = node.next;
        }
        total
    }
}
