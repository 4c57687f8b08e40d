//! Arena Allocator - O(1) slab allocator with a free list of indices.
//!
//! The arena pre-allocates every slot at construction, so a long-running
//! book with heavy order turnover never grows. Freed slots are pushed onto
//! a free list threaded through the vacant slots and reused first.
//!
//! Each slot carries a generation that is bumped when the slot is freed.
//! [`Arena::key`] combines generation and index into a 64-bit key that stops
//! resolving once its slot is freed, even after the index is reused.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::error::ArenaError;

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: ArenaIndex = u32::MAX;

/// Type alias for arena indices - our "compressed pointers"
pub type ArenaIndex = u32;

struct Slot<T> {
    value: Option<T>,
    generation: u32,
    /// Next vacant slot while this one is on the free list
    next_free: ArenaIndex,
}

/// Pre-allocated pool with O(1) allocation and deallocation.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,

    /// Head of the free list (index of first available slot)
    free_head: ArenaIndex,

    /// Number of currently occupied slots
    allocated_count: u32,

    capacity: u32,
}

impl<T> Arena<T> {
    /// Create a new arena with the specified capacity.
    ///
    /// # Panics
    /// Panics if capacity is not below `NULL_INDEX`, which is reserved.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        // Thread the free list through all slots: slot i points to i + 1,
        // the last one to NULL
        let slots = (0..capacity)
            .map(|i| Slot {
                value: None,
                generation: 0,
                next_free: if i + 1 < capacity { i + 1 } else { NULL_INDEX },
            })
            .collect();

        Self {
            slots,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
        }
    }

    /// Store a value and return its index together with a handle to it.
    ///
    /// # Errors
    /// [`ArenaError::CapacityExceeded`] if every slot is occupied.
    ///
    /// # Complexity
    /// O(1) - pops from head of free list
    #[inline]
    pub fn insert(&mut self, value: T) -> Result<(ArenaIndex, &mut T), ArenaError> {
        if self.free_head == NULL_INDEX {
            return Err(ArenaError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let index = self.free_head;
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.value.is_none(), "free list points at an occupied slot");
        self.free_head = slot.next_free;
        slot.next_free = NULL_INDEX;
        self.allocated_count += 1;

        let handle = slot.value.insert(value);
        Ok((index, handle))
    }

    /// Release a slot for reuse, returning its value.
    ///
    /// Returns `None` if the slot was already vacant. Keys issued for the slot
    /// stop resolving.
    ///
    /// # Complexity
    /// O(1) - pushes to head of free list
    #[inline]
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        let value = slot.value.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_head;
        self.free_head = index;
        self.allocated_count -= 1;

        Some(value)
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        self.slots.get(index as usize)?.value.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        self.slots.get_mut(index as usize)?.value.as_mut()
    }

    #[inline]
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Stable key of the value currently stored at `index`.
    ///
    /// Only meaningful while the slot is occupied.
    #[inline]
    pub fn key(&self, index: ArenaIndex) -> u64 {
        let generation = self.slots[index as usize].generation;
        (u64::from(generation) << 32) | u64::from(index)
    }

    /// Resolve a key back to its index, if its value is still live.
    #[inline]
    pub fn resolve(&self, key: u64) -> Option<ArenaIndex> {
        let index = (key & u64::from(u32::MAX)) as ArenaIndex;
        let generation = (key >> 32) as u32;
        let slot = self.slots.get(index as usize)?;
        (slot.value.is_some() && slot.generation == generation).then_some(index)
    }

    /// Iterate over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.value.as_ref().map(|v| (i as ArenaIndex, v)))
    }

    /// Iterate over the indices of occupied slots.
    pub fn indices(&self) -> impl Iterator<Item = ArenaIndex> + '_ {
        self.iter().map(|(i, _)| i)
    }

    /// Returns the number of currently occupied slots.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Returns the total capacity of the arena.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Returns true if the arena is full (no free slots).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_INDEX
    }
}

/// # Panics
/// Indexing a vacant slot panics; holders of an index must keep it live.
impl<T> Index<ArenaIndex> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: ArenaIndex) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("vacant arena slot {index}"),
        }
    }
}

impl<T> IndexMut<ArenaIndex> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, index: ArenaIndex) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("vacant arena slot {index}"),
        }
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}
