//! One side (bids or asks) of a `Pool`'s book: a crit-bit-indexed set of
//! `TickLevel`s plus the side's own order-id counter.

use crate::types::TickLevel;
use crit_bit::Tree;

/// Wraps a `Tree<TickLevel>` with the side's order-id counter. Bids and
/// asks never share a counter — `order_id`'s high bit is how the rest of
/// the engine tells which side an id belongs to.
#[derive(Debug)]
pub struct OrderSide {
    pub tree: Tree<TickLevel>,
    next_order_id: u64,
}

impl OrderSide {
    pub fn new(first_order_id: u64) -> Self {
        Self {
            tree: Tree::new(),
            next_order_id: first_order_id,
        }
    }

    pub fn alloc_order_id(&mut self) -> u64 {
        let id = self.next_order_id;
        self.next_order_id = self
            .next_order_id
            .checked_add(1)
            .expect("order id counter overflow");
        id
    }

    pub fn peek_next_order_id(&self) -> u64 {
        self.next_order_id
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the tick level at `price`, creating an empty one and
    /// inserting it into the tree if absent.
    pub fn find_or_create_tick(&mut self, price: u64) -> crit_bit::Index {
        let (found, handle) = self.tree.find(price);
        if found {
            return handle;
        }
        self.tree.insert(price, TickLevel::new(price))
    }

    /// Removes the tick level at `handle` from the tree if it is empty.
    /// No-op (and a bug if called on a non-empty level) otherwise.
    pub fn remove_tick_if_empty(&mut self, handle: crit_bit::Index) {
        let empty = self
            .tree
            .get(handle)
            .map(|t| t.is_empty())
            .unwrap_or(false);
        if empty {
            self.tree.remove_leaf_by_index(handle);
        }
    }
}
