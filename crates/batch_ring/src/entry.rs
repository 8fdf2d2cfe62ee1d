// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::{Level, event};

/// Number of entries the pool starts out with.
const INITIAL_POOL_SIZE: usize = 4;

/// Stable identifier of a slice entry.
///
/// The identifier is the index of the entry in the channel's entry arena. It stays valid for as long
/// as the entry is in use, which allows slices handed out to callers to find their metadata again
/// in O(1) even after neighbouring entries have been split or merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ownership state of a region of the ring storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryStatus {
    /// Reserved by the writing side; only the matching write slice may touch the region.
    AllocatedForWrite,

    /// Written and published, owned by neither side.
    Data,

    /// Reserved by the reading side; only the matching read slice may touch the region.
    AllocatedForRead,
}

/// Metadata describing one contiguous, non-wrapping run of the ring storage.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) status: EntryStatus,
    pub(crate) start: usize,
    pub(crate) length: usize,

    // Neighbours in the circular list, in storage order. An entry that is alone in the list
    // points at itself in both directions.
    pub(crate) prev: EntryId,
    pub(crate) next: EntryId,

    // Only maintained for debug checks - a free entry must never be addressed.
    in_use: bool,
}

impl Entry {
    const fn vacant(id: EntryId) -> Self {
        Self {
            status: EntryStatus::Data,
            start: 0,
            length: 0,
            prev: id,
            next: id,
            in_use: false,
        }
    }

    pub(crate) const fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Index-stable registry of slice entries.
///
/// Entries are never deallocated. Released entries go back onto a free stack and are handed out
/// again by [`acquire()`][Self::acquire]. When the free stack runs empty the arena doubles.
#[derive(Debug)]
pub(crate) struct EntryPool {
    entries: Vec<Entry>,
    free: Vec<EntryId>,
}

impl EntryPool {
    pub(crate) fn new() -> Self {
        let mut pool = Self {
            entries: Vec::with_capacity(INITIAL_POOL_SIZE),
            free: Vec::with_capacity(INITIAL_POOL_SIZE),
        };

        pool.grow(INITIAL_POOL_SIZE);
        pool
    }

    /// Total number of entries in the arena, whether in use or not.
    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries currently handed out.
    #[cfg(test)]
    pub(crate) fn in_use(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// Takes an entry off the free stack, growing the arena if that leaves the stack empty.
    pub(crate) fn acquire(&mut self) -> EntryId {
        // The stack is refilled as soon as it runs empty, so there is always an entry to take.
        let Some(id) = self.free.pop() else {
            unreachable!("slice entry free stack is never left empty");
        };

        if self.free.is_empty() {
            self.grow(self.entries.len());
        }

        let entry = &mut self.entries[id.index()];
        *entry = Entry::vacant(id);
        entry.in_use = true;

        id
    }

    /// Returns an entry to the free stack.
    pub(crate) fn release(&mut self, id: EntryId) {
        let entry = &mut self.entries[id.index()];
        debug_assert!(entry.in_use, "released an entry that was not in use: {id:?}");

        entry.in_use = false;
        self.free.push(id);
    }

    pub(crate) fn get(&self, id: EntryId) -> &Entry {
        let entry = &self.entries[id.index()];
        debug_assert!(entry.in_use, "addressed an entry that is not in use: {id:?}");
        entry
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> &mut Entry {
        let entry = &mut self.entries[id.index()];
        debug_assert!(entry.in_use, "addressed an entry that is not in use: {id:?}");
        entry
    }

    fn grow(&mut self, additional: usize) {
        let first = self.entries.len();
        let last = first + additional;

        assert!(
            u32::try_from(last).is_ok(),
            "slice entry pool cannot grow beyond {} entries",
            u32::MAX
        );

        // Pushed in reverse so that lower ids are handed out first.
        for index in (first..last).rev() {
            #[expect(clippy::cast_possible_truncation, reason = "bounds checked above")]
            let id = EntryId(index as u32);
            self.entries.push(Entry::vacant(id));
            self.free.push(id);
        }

        event!(
            Level::TRACE,
            message = "slice entry pool grown",
            capacity = self.entries.len()
        );
    }
}
