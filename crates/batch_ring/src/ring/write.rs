// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::{Level, event};

use super::{Allocation, RingBuffer};
use crate::entry::EntryStatus;

impl RingBuffer {
    /// Finds the region a write of up to `count` items would be given, without reserving it.
    ///
    /// Returns `(start, length)`. If the space up to the end of the array does not hold the whole
    /// request, whichever of the two windows on either side of the wrap point is larger wins, even
    /// if that means handing out less than requested.
    fn plan_write(&self, count: usize) -> Option<(usize, usize)> {
        let count = count.min(self.allocation_limit_left);
        if count == 0 {
            return None;
        }

        let (Some(head), Some(tail)) = (self.head, self.tail()) else {
            return Some((0, count));
        };

        let head_start = self.entry(head).start;
        let tail = self.entry(tail);
        let write_start = tail.end();

        debug_assert_eq!(
            (self.free_position + self.allocated_size) % self.capacity,
            write_start % self.capacity
        );

        let (pre_wrap, post_wrap) = if tail.start >= head_start {
            (self.capacity - write_start, head_start)
        } else {
            (head_start - write_start, 0)
        };

        if pre_wrap >= count {
            Some((write_start, count))
        } else if post_wrap > pre_wrap {
            Some((0, count.min(post_wrap)))
        } else if pre_wrap > 0 {
            Some((write_start, pre_wrap))
        } else {
            None
        }
    }

    /// Largest write that [`try_start_write()`][Self::try_start_write] would grant right now.
    pub(crate) fn writable_len(&self) -> usize {
        self.plan_write(usize::MAX).map_or(0, |(_, length)| length)
    }

    /// Reserves a contiguous region of up to `count` items for the writing side.
    pub(crate) fn try_start_write(&mut self, count: usize) -> Option<Allocation> {
        let (start, length) = self.plan_write(count)?;

        let id = self.insert_new_entry_last();
        {
            let entry = self.entry_mut(id);
            entry.status = EntryStatus::AllocatedForWrite;
            entry.start = start;
            entry.length = length;
        }

        self.allocation_limit_left -= length;
        self.refresh_bounds();

        event!(
            Level::TRACE,
            message = "write allocated",
            entry = id.0,
            start,
            length,
            requested = count
        );

        Some(Allocation { entry: id, start, length })
    }

    /// Publishes the first `processed` items of a write region as readable data.
    ///
    /// The rest of the region goes back to the allocation budget. Publishing nothing drops the
    /// entry altogether.
    pub(crate) fn complete_write(&mut self, allocation: Allocation, processed: usize) {
        let id = allocation.entry;
        let length = self.entry(id).length;

        debug_assert_eq!(self.entry(id).status, EntryStatus::AllocatedForWrite);
        debug_assert_eq!(self.entry(id).start, allocation.start);
        debug_assert_eq!(length, allocation.length);
        debug_assert!(processed <= length, "completed {processed} items of a {length} item write");

        let processed = processed.min(length);
        self.allocation_limit_left += length - processed;

        if processed == 0 {
            self.remove_entry(id);
        } else {
            let entry = self.entry_mut(id);
            entry.length = processed;
            entry.status = EntryStatus::Data;

            self.coalesce(id);
        }

        self.refresh_bounds();

        event!(Level::TRACE, message = "write completed", entry = id.0, processed, length);
    }

    /// Shrinks an in-flight write region to `new_count` items.
    pub(crate) fn partial_free_write(&mut self, allocation: Allocation, new_count: usize) {
        let id = allocation.entry;
        let length = self.entry(id).length;

        debug_assert_eq!(self.entry(id).status, EntryStatus::AllocatedForWrite);
        debug_assert_eq!(self.entry(id).start, allocation.start);
        debug_assert!(new_count <= length, "cannot grow a {length} item write to {new_count}");

        let new_count = new_count.min(length);
        self.allocation_limit_left += length - new_count;
        self.entry_mut(id).length = new_count;

        self.refresh_bounds();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::entry::EntryStatus::{AllocatedForWrite, Data};

    #[test]
    fn first_write_starts_at_zero() {
        let mut ring = RingBuffer::new(8);

        let allocation = ring.try_start_write(5).unwrap();

        assert_eq!((allocation.start, allocation.length), (0, 5));
        assert_eq!(ring.allocation_limit_left(), 3);
        assert_eq!(ring.layout(), vec![(AllocatedForWrite, 0, 5)]);
        ring.assert_invariants();
    }

    #[test]
    fn write_is_capped_by_budget() {
        let mut ring = RingBuffer::new(8);

        let allocation = ring.try_start_write(100).unwrap();
        assert_eq!(allocation.length, 8);

        assert!(ring.try_start_write(1).is_none());
        assert_eq!(ring.writable_len(), 0);
        ring.assert_invariants();
    }

    #[test]
    fn zero_sized_write_is_refused() {
        let mut ring = RingBuffer::new(8);

        assert!(ring.try_start_write(0).is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn consecutive_writes_coalesce() {
        let mut ring = RingBuffer::new(8);

        let first = ring.try_start_write(3).unwrap();
        ring.complete_write(first, 3);
        let second = ring.try_start_write(3).unwrap();
        ring.complete_write(second, 3);

        assert_eq!(ring.layout(), vec![(Data, 0, 6)]);
        assert_eq!(ring.allocated_count(), 6);
        ring.assert_invariants();
    }

    #[test]
    fn partial_completion_returns_budget() {
        let mut ring = RingBuffer::new(8);

        let allocation = ring.try_start_write(5).unwrap();
        ring.complete_write(allocation, 2);

        assert_eq!(ring.layout(), vec![(Data, 0, 2)]);
        assert_eq!(ring.allocation_limit_left(), 6);
        // The newest region shrank, so the physical window shrinks with it.
        assert_eq!(ring.allocated_size(), 2);
        ring.assert_invariants();
    }

    #[test]
    fn completing_nothing_removes_entry() {
        let mut ring = RingBuffer::new(8);

        let allocation = ring.try_start_write(5).unwrap();
        ring.complete_write(allocation, 0);

        assert!(ring.is_empty());
        assert_eq!(ring.allocation_limit_left(), 8);
        ring.assert_invariants();
    }

    #[test]
    fn out_of_order_completion_merges_both_ways() {
        let mut ring = RingBuffer::new(8);

        let a = ring.try_start_write(2).unwrap();
        let b = ring.try_start_write(2).unwrap();
        let c = ring.try_start_write(2).unwrap();

        ring.complete_write(c, 2);
        ring.complete_write(a, 2);
        assert_eq!(ring.layout(), vec![(Data, 0, 2), (AllocatedForWrite, 2, 2), (Data, 4, 2)]);

        // The middle region joins its successor first, then its predecessor.
        ring.complete_write(b, 2);
        assert_eq!(ring.layout(), vec![(Data, 0, 6)]);
        ring.assert_invariants();
    }

    #[test]
    fn partial_completion_in_the_middle_leaves_a_gap() {
        let mut ring = RingBuffer::new(8);

        let a = ring.try_start_write(4).unwrap();
        let b = ring.try_start_write(2).unwrap();

        ring.complete_write(b, 2);
        ring.complete_write(a, 1);

        assert_eq!(ring.layout(), vec![(Data, 0, 1), (Data, 4, 2)]);
        assert_eq!(ring.allocated_count(), 3);
        ring.assert_invariants();
    }

    #[test]
    fn partial_free_shrinks_reservation() {
        let mut ring = RingBuffer::new(8);

        let allocation = ring.try_start_write(6).unwrap();
        ring.partial_free_write(allocation, 4);

        assert_eq!(ring.layout(), vec![(AllocatedForWrite, 0, 4)]);
        assert_eq!(ring.allocation_limit_left(), 4);

        let next = ring.try_start_write(4).unwrap();
        assert_eq!((next.start, next.length), (4, 4));
        ring.assert_invariants();
    }

    #[test]
    fn wraps_into_larger_window() {
        let mut ring = RingBuffer::new(8);
        assert_eq!(ring.capacity(), 16);

        // Fill and drain once.
        let filler = ring.try_start_write(8).unwrap();
        ring.complete_write(filler, 8);
        let reader = ring.try_start_read(8).unwrap();
        ring.complete_read(reader, 8);
        assert!(ring.is_empty());

        // Emptying the ring resets the write position.
        let first = ring.try_start_write(6).unwrap();
        assert_eq!(first.start, 0);
        ring.complete_write(first, 6);
        let second = ring.try_start_write(2).unwrap();
        ring.complete_write(second, 2);
        let third = ring.try_start_read(6).unwrap();
        ring.complete_read(third, 6);

        // Data now sits at [6, 8). 8 items remain up to the end of the array, 6 before the data.
        assert_eq!(ring.layout(), vec![(Data, 6, 2)]);
        let fourth = ring.try_start_write(6).unwrap();
        assert_eq!((fourth.start, fourth.length), (8, 6));
        ring.complete_write(fourth, 6);
        assert_eq!(ring.layout(), vec![(Data, 6, 8)]);
        ring.assert_invariants();
    }

    #[test]
    fn prefers_post_wrap_window_when_larger() {
        let mut ring = RingBuffer::new(8);

        // Walk the data window up the array until it ends at 14.
        let a = ring.try_start_write(8).unwrap();
        ring.complete_write(a, 8);
        let read = ring.try_start_read(7).unwrap();
        ring.complete_read(read, 7);
        let b = ring.try_start_write(6).unwrap();
        assert_eq!((b.start, b.length), (8, 6));
        ring.complete_write(b, 6);
        assert_eq!(ring.layout(), vec![(Data, 7, 7)]);

        ring.assert_invariants();
        let read = ring.try_start_read(6).unwrap();
        ring.complete_read(read, 6);
        assert_eq!(ring.layout(), vec![(Data, 13, 1)]);

        // Two items fit before the end of the array, thirteen after the wrap. The larger one wins.
        let c = ring.try_start_write(5).unwrap();
        assert_eq!((c.start, c.length), (0, 5));
        assert_eq!(ring.allocated_size(), 16 - 13 + 5);
        ring.complete_write(c, 5);

        // Not merged: the regions are on opposite sides of the wrap point.
        assert_eq!(ring.layout(), vec![(Data, 13, 1), (Data, 0, 5)]);
        ring.assert_invariants();
    }
}
