//! Price Level - A FIFO queue of orders at a single price point.
//!
//! Implements a doubly-linked list using arena indices for O(1)
//! insertion, removal from head, and removal from arbitrary position.

use crate::arena::{Arena, ArenaIndex, NULL_INDEX};
use crate::codec::LevelIndex;
use crate::command::{OwnerId, Side};

/// A resting order (or remainder) as stored in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderNode {
    /// Remaining quantity
    pub qty: u32,
    pub owner: OwnerId,
    /// Stored explicitly so cancel never has to infer it from the cursors
    pub side: Side,
    /// Level this order rests on
    pub level: LevelIndex,
    /// Next (younger) order at the same level
    pub next: ArenaIndex,
    /// Previous (older) order at the same level
    pub prev: ArenaIndex,
}

impl OrderNode {
    #[inline]
    pub const fn new(qty: u32, owner: OwnerId, side: Side, level: LevelIndex) -> Self {
        Self {
            qty,
            owner,
            side,
            level,
            next: NULL_INDEX,
            prev: NULL_INDEX,
        }
    }
}

/// A queue of orders at a specific price level.
///
/// Orders are processed in FIFO order (price-time priority).
/// The doubly-linked structure enables O(1) cancel from any position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceLevel {
    /// Index of the oldest order (highest priority, first to match)
    pub head: ArenaIndex,
    /// Index of the newest order (last to match)
    pub tail: ArenaIndex,
    /// Total quantity across all orders at this level
    pub total_qty: u64,
    /// Number of orders at this level
    pub count: u32,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceLevel {
    /// Create a new empty price level
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: NULL_INDEX,
            tail: NULL_INDEX,
            total_qty: 0,
            count: 0,
        }
    }

    /// Returns true if there are no orders at this level
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an order to the tail of the queue (newest order).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn push_back(&mut self, arena: &mut Arena<OrderNode>, index: ArenaIndex) {
        let qty = arena[index].qty;

        if self.tail == NULL_INDEX {
            // Empty list: new node becomes both head and tail
            debug_assert!(self.head == NULL_INDEX);
            self.head = index;
            arena[index].prev = NULL_INDEX;
        } else {
            arena[self.tail].next = index;
            arena[index].prev = self.tail;
        }
        arena[index].next = NULL_INDEX;
        self.tail = index;

        self.count += 1;
        self.total_qty += u64::from(qty);
    }

    /// Unlink and return the head order (oldest/highest priority).
    ///
    /// The order is NOT freed from the arena; caller must do that.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn pop_front(&mut self, arena: &mut Arena<OrderNode>) -> Option<ArenaIndex> {
        if self.head == NULL_INDEX {
            return None;
        }
        let index = self.head;
        self.remove(arena, index);
        Some(index)
    }

    /// Unlink an order from anywhere in the queue (for cancel).
    ///
    /// Returns `true` if the level is now empty.
    /// The order is NOT freed from the arena; caller must do that.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn remove(&mut self, arena: &mut Arena<OrderNode>, index: ArenaIndex) -> bool {
        let node = arena[index];

        if node.prev == NULL_INDEX {
            debug_assert!(self.head == index);
            self.head = node.next;
        } else {
            arena[node.prev].next = node.next;
        }

        if node.next == NULL_INDEX {
            debug_assert!(self.tail == index);
            self.tail = node.prev;
        } else {
            arena[node.next].prev = node.prev;
        }

        self.count -= 1;
        self.total_qty -= u64::from(node.qty);

        // Clear the removed node's linkage
        arena[index].prev = NULL_INDEX;
        arena[index].next = NULL_INDEX;

        self.count == 0
    }

    /// Index of the head order, or `NULL_INDEX` if empty.
    #[inline]
    pub const fn peek_head(&self) -> ArenaIndex {
        self.head
    }

    /// Update total quantity after a partial fill.
    ///
    /// Call this after modifying an order's qty directly.
    #[inline]
    pub fn subtract_qty(&mut self, qty: u32) {
        debug_assert!(self.total_qty >= u64::from(qty));
        self.total_qty -= u64::from(qty);
    }

    /// Walk the queue from head to tail.
    pub fn iter<'a>(&self, arena: &'a Arena<OrderNode>) -> LevelIter<'a> {
        LevelIter {
            arena,
            cursor: self.head,
        }
    }
}

/// Iterator over the orders of one level in priority order.
pub struct LevelIter<'a> {
    arena: &'a Arena<OrderNode>,
    cursor: ArenaIndex,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (ArenaIndex, &'a OrderNode);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NULL_INDEX {
            return None;
        }
        let index = self.cursor;
        let node = &self.arena[index];
        self.cursor = node.next;
        Some((index, node))
    }
}
