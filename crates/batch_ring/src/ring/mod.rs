// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bookkeeping for the regions of the ring storage.
//!
//! The ring does not own the storage itself, only the metadata describing who owns which part
//! of it. Regions are tracked as a circular doubly-linked list of entries in storage order, with
//! the oldest region at the head. Free space is never tracked explicitly - it is whatever lies
//! between the end of the newest entry and the start of the oldest one.

mod read;
mod write;

use crate::entry::{Entry, EntryId, EntryPool, EntryStatus};

/// A region of the ring storage handed out to the reading or writing side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub(crate) entry: EntryId,
    pub(crate) start: usize,
    pub(crate) length: usize,
}

#[derive(Debug)]
pub(crate) struct RingBuffer {
    pool: EntryPool,

    // Oldest entry in storage order. `None` when nothing is allocated.
    head: Option<EntryId>,

    // Physical length of the storage array.
    capacity: usize,

    // Logical budget - the sum of all entry lengths never exceeds this.
    max_buffer_length: usize,

    // Start of the oldest entry.
    free_position: usize,

    // Physical distance from `free_position` to the end of the newest entry, including the
    // unused tail of the array if the allocations have wrapped around.
    allocated_size: usize,

    allocation_limit_left: usize,
}

impl RingBuffer {
    /// Sizes the physical storage for a logical budget of `max_buffer_length` items.
    ///
    /// The physical array is twice the next power of two, which leaves enough headroom that a
    /// single contiguous region can be found without splitting data across the end of the array.
    pub(crate) fn new(max_buffer_length: usize) -> Self {
        debug_assert!(max_buffer_length > 0);

        Self {
            pool: EntryPool::new(),
            head: None,
            capacity: physical_capacity(max_buffer_length),
            max_buffer_length,
            free_position: 0,
            allocated_size: 0,
            allocation_limit_left: max_buffer_length,
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) const fn max_buffer_length(&self) -> usize {
        self.max_buffer_length
    }

    #[cfg(test)]
    pub(crate) const fn allocation_limit_left(&self) -> usize {
        self.allocation_limit_left
    }

    /// Number of items held by entries of any status.
    pub(crate) const fn allocated_count(&self) -> usize {
        self.max_buffer_length - self.allocation_limit_left
    }

    #[cfg(test)]
    pub(crate) const fn free_position(&self) -> usize {
        self.free_position
    }

    #[cfg(test)]
    pub(crate) const fn allocated_size(&self) -> usize {
        self.allocated_size
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn entry(&self, id: EntryId) -> &Entry {
        self.pool.get(id)
    }

    fn entry_mut(&mut self, id: EntryId) -> &mut Entry {
        self.pool.get_mut(id)
    }

    pub(crate) fn tail(&self) -> Option<EntryId> {
        self.head.map(|head| self.entry(head).prev)
    }

    fn is_tail(&self, id: EntryId) -> bool {
        self.tail() == Some(id)
    }

    fn is_head(&self, id: EntryId) -> bool {
        self.head == Some(id)
    }

    /// Iterates over the entries in storage order, oldest first.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (EntryId, &Entry)> + '_ {
        let mut cursor = self.head;

        std::iter::from_fn(move || {
            let id = cursor?;
            let entry = self.entry(id);

            cursor = Some(entry.next).filter(|next| Some(*next) != self.head);
            Some((id, entry))
        })
    }

    /// Number of items that a reader may take right now, in order.
    ///
    /// Counting stops at the first region still being written, as anything beyond it would be
    /// delivered out of order.
    pub(crate) fn readable_len(&self) -> usize {
        self.entries()
            .map(|(_, entry)| entry)
            .take_while(|entry| entry.status != EntryStatus::AllocatedForWrite)
            .filter(|entry| entry.status == EntryStatus::Data)
            .map(|entry| entry.length)
            .sum()
    }

    /// Takes a fresh entry from the pool and links it in directly after `after`.
    pub(crate) fn insert_new_entry_after(&mut self, after: EntryId) -> EntryId {
        let id = self.pool.acquire();
        let next = self.entry(after).next;

        {
            let entry = self.entry_mut(id);
            entry.prev = after;
            entry.next = next;
        }

        self.entry_mut(after).next = id;
        self.entry_mut(next).prev = id;

        id
    }

    /// Takes a fresh entry from the pool and links it in as the newest entry.
    pub(crate) fn insert_new_entry_last(&mut self) -> EntryId {
        match self.tail() {
            Some(tail) => self.insert_new_entry_after(tail),
            None => {
                // A lone entry links to itself, which `acquire()` already arranged.
                let id = self.pool.acquire();
                self.head = Some(id);
                id
            }
        }
    }

    /// Unlinks an entry and returns it to the pool.
    pub(crate) fn remove_entry(&mut self, id: EntryId) {
        let (prev, next) = {
            let entry = self.entry(id);
            (entry.prev, entry.next)
        };

        if next == id {
            self.head = None;
        } else {
            self.entry_mut(prev).next = next;
            self.entry_mut(next).prev = prev;

            if self.is_head(id) {
                self.head = Some(next);
            }
        }

        self.pool.release(id);
    }

    /// Folds an entry into its predecessor, returning the surviving entry.
    pub(crate) fn join_to_prev_entry(&mut self, id: EntryId) -> EntryId {
        let (prev, length) = {
            let entry = self.entry(id);
            (entry.prev, entry.length)
        };

        debug_assert!(self.is_connected_with_next(prev));

        self.entry_mut(prev).length += length;
        self.remove_entry(id);

        prev
    }

    /// Folds an entry into its successor, returning the surviving entry.
    pub(crate) fn join_to_next_entry(&mut self, id: EntryId) -> EntryId {
        let (next, start, length) = {
            let entry = self.entry(id);
            (entry.next, entry.start, entry.length)
        };

        debug_assert!(self.is_connected_with_next(id));

        {
            let next_entry = self.entry_mut(next);
            next_entry.start = start;
            next_entry.length += length;
        }
        self.remove_entry(id);

        next
    }

    /// Whether the entry ends exactly where the next one in the list begins.
    pub(crate) fn is_connected_with_next(&self, id: EntryId) -> bool {
        let entry = self.entry(id);

        entry.next != id && entry.end() == self.entry(entry.next).start
    }

    /// Merges a freshly published `Data` entry with its `Data` neighbours.
    ///
    /// The forward merge is skipped for the newest entry, whose successor is the oldest entry and
    /// therefore not a neighbour in storage order. The same holds for the backward merge of the
    /// oldest entry.
    fn coalesce(&mut self, id: EntryId) -> EntryId {
        debug_assert_eq!(self.entry(id).status, EntryStatus::Data);

        let mut current = id;

        if !self.is_tail(current) {
            let next = self.entry(current).next;

            if self.entry(next).status == EntryStatus::Data && self.is_connected_with_next(current) {
                current = self.join_to_next_entry(current);
            }
        }

        if !self.is_head(current) {
            let prev = self.entry(current).prev;

            if self.entry(prev).status == EntryStatus::Data && self.is_connected_with_next(prev) {
                current = self.join_to_prev_entry(current);
            }
        }

        current
    }

    /// Recomputes the physical bounds after the head or tail may have changed.
    fn refresh_bounds(&mut self) {
        let Some(head) = self.head else {
            // Once everything is released, start over from the beginning of the array so that the
            // next allocation gets the largest possible contiguous window.
            self.free_position = 0;
            self.allocated_size = 0;
            return;
        };

        let head_start = self.entry(head).start;
        let (tail_start, tail_end) = {
            let tail = self.entry(self.entry(head).prev);
            (tail.start, tail.end())
        };

        self.free_position = head_start;
        self.allocated_size = if tail_start >= head_start {
            tail_end - head_start
        } else {
            self.capacity - head_start + tail_end
        };
    }

    /// Validates every structural invariant, panicking with a description of the first violation.
    #[cfg(test)]
    #[expect(clippy::panic, reason = "test helper")]
    pub(crate) fn assert_invariants(&self) {
        let mut count = 0;
        let mut sum = 0;
        let mut wrapped = false;
        let mut previous: Option<(EntryId, &Entry)> = None;

        for (id, entry) in self.entries() {
            count += 1;
            sum += entry.length;

            assert!(entry.end() <= self.capacity, "entry {id:?} runs past the end of the storage");
            assert_eq!(self.entry(entry.next).prev, id, "broken back link after {id:?}");

            if let Some((prev_id, prev)) = previous {
                assert_eq!(entry.prev, prev_id, "broken list order at {id:?}");

                if entry.start < prev.end() {
                    assert!(!wrapped, "entries wrap around the storage more than once");
                    wrapped = true;
                }

                if prev.status == EntryStatus::Data && entry.status == EntryStatus::Data {
                    assert!(prev.end() != entry.start, "adjacent data entries {prev_id:?} and {id:?} were not merged");
                }
            }

            previous = Some((id, entry));
        }

        if wrapped {
            let (Some(head), Some(tail)) = (self.head, self.tail()) else {
                panic!("wrapped list without entries");
            };
            assert!(
                self.entry(tail).end() <= self.entry(head).start,
                "newest entry overlaps the oldest entry"
            );
        }

        assert_eq!(count, self.pool.in_use(), "entries leaked from the pool");
        assert_eq!(sum, self.allocated_count(), "allocated count does not match entry lengths");
        assert!(self.allocated_count() <= self.max_buffer_length, "allocation budget exceeded");
        assert!(self.allocated_size <= self.capacity, "allocated size exceeds the storage");
    }

    /// Snapshot of `(status, start, length)` per entry, oldest first.
    #[cfg(test)]
    pub(crate) fn layout(&self) -> Vec<(EntryStatus, usize, usize)> {
        self.entries()
            .map(|(_, entry)| (entry.status, entry.start, entry.length))
            .collect()
    }
}

fn physical_capacity(max_buffer_length: usize) -> usize {
    max_buffer_length
        .checked_next_power_of_two()
        .and_then(|rounded| rounded.checked_mul(2))
        .expect("max_buffer_length is too large to size the ring storage")
}
