use core::{fmt, mem};
use sails_rs::Vec;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Index(u32);

impl Index {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.0)
    }
}

#[derive(Debug)]
pub enum Entry<T> {
    Occupied(T),
    Free(Option<Index>),
}

#[derive(Debug)]
pub struct Arena<T> {
    storage: Vec<Entry<T>>,
    free_head: Option<Index>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            storage: Vec::new(),
            free_head: None,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            storage: Vec::with_capacity(cap),
            free_head: None,
        }
    }

    /// Allocate a new value and return its stable Index.
    pub fn alloc(&mut self, value: T) -> Index {
        if let Some(idx) = self.free_head {
            // Reuse a free slot
            let entry = self.storage.get_mut(idx.as_usize()).unwrap_or_else(|| {
                panic!("Corrupted free list: free_head out of bounds: {:?}", idx)
            });

            match entry {
                Entry::Free(next_free) => {
                    self.free_head = *next_free;
                    *entry = Entry::Occupied(value);
                    idx
                }
                Entry::Occupied(_) => {
                    panic!(
                        "Corrupted free list: free_head points to occupied slot: {:?}",
                        idx
                    );
                }
            }
        } else {
            // Append new slot
            let len = self.storage.len();
            let idx_u32: u32 = len
                .try_into()
                .unwrap_or_else(|_| panic!("Arena overflow: too many elements (>{})", u32::MAX));

            let idx = Index(idx_u32);
            self.storage.push(Entry::Occupied(value));
            idx
        }
    }

    pub fn get(&self, index: Index) -> Option<&T> {
        match self.storage.get(index.as_usize())? {
            Entry::Occupied(val) => Some(val),
            Entry::Free(_) => None,
        }
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        match self.storage.get_mut(index.as_usize())? {
            Entry::Occupied(val) => Some(val),
            Entry::Free(_) => None,
        }
    }

    /// Remove a value from the arena, returning it if the slot was occupied.
    ///
    /// Slot becomes free and is pushed to the free-list head (LIFO).
    pub fn remove(&mut self, index: Index) -> Option<T> {
        let slot = self.storage.get_mut(index.as_usize())?;

        // swap the slot with Free(free_head), moving out the old entry
        let old_entry = mem::replace(slot, Entry::Free(self.free_head));

        match old_entry {
            Entry::Occupied(val) => {
                self.free_head = Some(index);
                Some(val)
            }
            Entry::Free(next) => {
                // restore original free entry (so we don't break free list)
                *slot = Entry::Free(next);
                None
            }
        }
    }

    pub fn dealloc(&mut self, index: Index) {
        let _ = self.remove(index);
    }
}
