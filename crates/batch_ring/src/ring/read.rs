// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::{Level, event};

use super::{Allocation, RingBuffer};
use crate::entry::EntryStatus;

impl RingBuffer {
    /// Reserves up to `count` items of the oldest published data for the reading side.
    ///
    /// Regions already being read are skipped. The search gives up at the first region that is
    /// still being written, so data is always handed out in the order it was allocated.
    pub(crate) fn try_start_read(&mut self, count: usize) -> Option<Allocation> {
        if count == 0 {
            return None;
        }

        let head = self.head?;
        let mut current = head;

        loop {
            let entry = self.entry(current);

            match entry.status {
                EntryStatus::Data => break,
                EntryStatus::AllocatedForWrite => return None,
                EntryStatus::AllocatedForRead => {}
            }

            current = entry.next;
            if current == head {
                return None;
            }
        }

        let (start, available) = {
            let entry = self.entry(current);
            (entry.start, entry.length)
        };
        let length = available.min(count);

        if available > length {
            let rest = self.insert_new_entry_after(current);
            let rest = self.entry_mut(rest);
            rest.status = EntryStatus::Data;
            rest.start = start + length;
            rest.length = available - length;
        }

        {
            let entry = self.entry_mut(current);
            entry.status = EntryStatus::AllocatedForRead;
            entry.length = length;
        }

        event!(
            Level::TRACE,
            message = "read allocated",
            entry = current.0,
            start,
            length,
            requested = count
        );

        Some(Allocation {
            entry: current,
            start,
            length,
        })
    }

    /// Releases the first `processed` items of a read region back to the writing side.
    ///
    /// Anything not processed is published as data again, ahead of everything still unread.
    pub(crate) fn complete_read(&mut self, allocation: Allocation, processed: usize) {
        let id = allocation.entry;
        let length = self.entry(id).length;

        debug_assert_eq!(self.entry(id).status, EntryStatus::AllocatedForRead);
        debug_assert_eq!(self.entry(id).start, allocation.start);
        debug_assert_eq!(length, allocation.length);
        debug_assert!(processed <= length, "completed {processed} items of a {length} item read");

        let processed = processed.min(length);
        self.allocation_limit_left += processed;

        if processed == length {
            self.remove_entry(id);
        } else {
            let entry = self.entry_mut(id);
            entry.start += processed;
            entry.length -= processed;
            entry.status = EntryStatus::Data;

            self.coalesce(id);
        }

        self.refresh_bounds();

        event!(Level::TRACE, message = "read completed", entry = id.0, processed, length);
    }

    /// Shrinks an in-flight read region to `new_count` items, publishing the rest as data again.
    pub(crate) fn partial_free_read(&mut self, allocation: Allocation, new_count: usize) {
        let id = allocation.entry;
        let (start, length) = {
            let entry = self.entry(id);
            (entry.start, entry.length)
        };

        debug_assert_eq!(self.entry(id).status, EntryStatus::AllocatedForRead);
        debug_assert_eq!(start, allocation.start);
        debug_assert!(new_count <= length, "cannot grow a {length} item read to {new_count}");

        let new_count = new_count.min(length);
        if new_count == length {
            return;
        }

        let rest = self.insert_new_entry_after(id);
        {
            let entry = self.entry_mut(rest);
            entry.status = EntryStatus::Data;
            entry.start = start + new_count;
            entry.length = length - new_count;
        }
        self.entry_mut(id).length = new_count;

        self.coalesce(rest);
        self.refresh_bounds();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::entry::EntryStatus::{AllocatedForRead, AllocatedForWrite, Data};

    fn ring_with_data(max_buffer_length: usize, count: usize) -> RingBuffer {
        let mut ring = RingBuffer::new(max_buffer_length);
        let allocation = ring.try_start_write(count).unwrap();
        ring.complete_write(allocation, count);
        ring
    }

    #[test]
    fn empty_ring_has_nothing_to_read() {
        let mut ring = RingBuffer::new(8);

        assert!(ring.try_start_read(4).is_none());
    }

    #[test]
    fn read_returns_only_what_is_available() {
        let mut ring = ring_with_data(8, 5);

        let allocation = ring.try_start_read(8).unwrap();
        assert_eq!((allocation.start, allocation.length), (0, 5));
        assert_eq!(ring.layout(), vec![(AllocatedForRead, 0, 5)]);

        ring.complete_read(allocation, 5);
        assert!(ring.is_empty());
        assert_eq!(ring.allocated_count(), 0);
        ring.assert_invariants();
    }

    #[test]
    fn read_splits_larger_region() {
        let mut ring = ring_with_data(8, 6);

        let allocation = ring.try_start_read(2).unwrap();
        assert_eq!((allocation.start, allocation.length), (0, 2));
        assert_eq!(ring.layout(), vec![(AllocatedForRead, 0, 2), (Data, 2, 4)]);
        assert_eq!(ring.readable_len(), 4);

        // A second read picks up where the first one ended.
        let second = ring.try_start_read(10).unwrap();
        assert_eq!((second.start, second.length), (2, 4));

        ring.complete_read(allocation, 2);
        ring.complete_read(second, 4);
        assert!(ring.is_empty());
        ring.assert_invariants();
    }

    #[test]
    fn unconsumed_remainder_merges_back() {
        let mut ring = ring_with_data(8, 6);

        let allocation = ring.try_start_read(4).unwrap();
        ring.complete_read(allocation, 1);

        assert_eq!(ring.layout(), vec![(Data, 1, 5)]);
        assert_eq!(ring.allocated_count(), 5);
        assert_eq!(ring.readable_len(), 5);
        ring.assert_invariants();
    }

    #[test]
    fn completing_nothing_keeps_all_data() {
        let mut ring = ring_with_data(8, 3);

        let allocation = ring.try_start_read(3).unwrap();
        ring.complete_read(allocation, 0);

        assert_eq!(ring.layout(), vec![(Data, 0, 3)]);
        assert_eq!(ring.allocated_count(), 3);
        ring.assert_invariants();
    }

    #[test]
    fn partial_free_publishes_suffix() {
        let mut ring = ring_with_data(8, 6);
        let extra = ring.try_start_write(2).unwrap();
        ring.complete_write(extra, 2);

        let mut allocation = ring.try_start_read(5).unwrap();
        assert_eq!(ring.layout(), vec![(AllocatedForRead, 0, 5), (Data, 5, 3)]);

        ring.partial_free_read(allocation, 2);
        allocation.length = 2;
        assert_eq!(ring.layout(), vec![(AllocatedForRead, 0, 2), (Data, 2, 6)]);

        ring.complete_read(allocation, 2);
        assert_eq!(ring.layout(), vec![(Data, 2, 6)]);
        ring.assert_invariants();
    }

    #[test]
    fn reads_never_skip_ahead_of_pending_writes() {
        let mut ring = RingBuffer::new(8);

        let first = ring.try_start_write(3).unwrap();
        let second = ring.try_start_write(3).unwrap();
        ring.complete_write(second, 3);

        assert_eq!(ring.layout(), vec![(AllocatedForWrite, 0, 3), (Data, 3, 3)]);
        assert_eq!(ring.readable_len(), 0);
        assert!(ring.try_start_read(8).is_none());

        ring.complete_write(first, 3);
        let allocation = ring.try_start_read(8).unwrap();
        assert_eq!((allocation.start, allocation.length), (0, 6));
        ring.assert_invariants();
    }

    #[test]
    fn concurrent_reads_skip_regions_in_progress() {
        let mut ring = ring_with_data(8, 8);

        let first = ring.try_start_read(3).unwrap();
        let second = ring.try_start_read(3).unwrap();
        assert_eq!((second.start, second.length), (3, 3));

        ring.complete_read(second, 3);
        assert_eq!(ring.layout(), vec![(AllocatedForRead, 0, 3), (Data, 6, 2)]);
        // Budget is returned even though the physical space only frees up once the oldest
        // region is done.
        assert_eq!(ring.allocation_limit_left(), 3);

        ring.complete_read(first, 3);
        assert_eq!(ring.layout(), vec![(Data, 6, 2)]);
        assert_eq!(ring.free_position(), 6);
        ring.assert_invariants();
    }

    #[test]
    fn zero_sized_read_is_refused() {
        let mut ring = ring_with_data(8, 3);

        assert!(ring.try_start_read(0).is_none());
        assert_eq!(ring.layout(), vec![(Data, 0, 3)]);
    }
}
