// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{Level, event};

use crate::EntryId;
use crate::ring::Allocation;
use crate::shared::Shared;

/// A contiguous region of the channel reserved for the writing side.
///
/// The slice dereferences to the reserved items. Fill a prefix of it and hand it back through
/// [`complete()`][Self::complete] (or the writer's `complete_write()`) with the number of items
/// written, which publishes them to the reading side in allocation order.
///
/// Dropping the slice without completing it releases the region with nothing published.
pub struct WriteSlice<T> {
    shared: Arc<Shared<T>>,
    allocation: Allocation,
    finished: bool,
}

impl<T> WriteSlice<T> {
    pub(crate) const fn new(shared: Arc<Shared<T>>, allocation: Allocation) -> Self {
        Self {
            shared,
            allocation,
            finished: false,
        }
    }

    /// Number of items in the reserved region.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocation.length
    }

    /// Whether the reserved region is empty. Reservations are never empty, so this only holds
    /// after the slice was shrunk to zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocation.length == 0
    }

    /// Stable identity of the region within the channel, valid until the slice is completed.
    #[must_use]
    pub const fn entry_id(&self) -> EntryId {
        self.allocation.entry
    }

    /// Publishes the first `processed` items and releases the rest of the region.
    ///
    /// # Panics
    ///
    /// Panics if `processed` exceeds the length of the slice.
    pub fn complete(mut self, processed: usize) {
        assert!(processed <= self.len(), "completed more items than the slice holds");

        self.finished = true;
        self.shared.complete_write(self.allocation, processed);
    }

    /// Shrinks the reservation to its first `new_count` items, returning the rest to the channel
    /// without publishing it.
    ///
    /// # Panics
    ///
    /// Panics if `new_count` exceeds the length of the slice.
    pub fn shrink(&mut self, new_count: usize) {
        assert!(new_count <= self.len(), "cannot grow a slice");

        if new_count == self.len() {
            return;
        }

        self.shared.partial_free_write(self.allocation, new_count);
        self.allocation.length = new_count;
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared<T>>) -> bool {
        Arc::ptr_eq(&self.shared, shared)
    }
}

impl<T> Deref for WriteSlice<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        // SAFETY: The ring hands the region to this slice alone until the slice is completed,
        // which consumes it.
        unsafe { self.shared.storage().region(self.allocation.start, self.allocation.length) }
    }
}

impl<T> DerefMut for WriteSlice<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: As above, and `&mut self` rules out other views through this slice.
        unsafe { self.shared.storage().region_mut(self.allocation.start, self.allocation.length) }
    }
}

impl<T> Drop for WriteSlice<T> {
    fn drop(&mut self) {
        if !self.finished {
            event!(
                Level::DEBUG,
                message = "write slice dropped without completion",
                length = self.allocation.length,
            );
            self.shared.complete_write(self.allocation, 0);
        }
    }
}

impl<T> Debug for WriteSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSlice")
            .field("entry", &self.allocation.entry)
            .field("start", &self.allocation.start)
            .field("len", &self.allocation.length)
            .finish_non_exhaustive()
    }
}

/// A contiguous region of published items reserved for the reading side.
///
/// Items are handed out oldest first. Consume a prefix of the slice and hand it back through
/// [`complete()`][Self::complete] (or the reader's `complete_read()`) with the number of items
/// consumed. Whatever was not consumed stays in the channel and is read again, ahead of anything
/// published later.
///
/// Dropping the slice without completing it consumes nothing.
pub struct ReadSlice<T> {
    shared: Arc<Shared<T>>,
    allocation: Allocation,
    finished: bool,
}

impl<T> ReadSlice<T> {
    pub(crate) const fn new(shared: Arc<Shared<T>>, allocation: Allocation) -> Self {
        Self {
            shared,
            allocation,
            finished: false,
        }
    }

    /// Number of items in the slice.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.allocation.length
    }

    /// Whether the slice is empty. Reads never return empty slices, so this only holds after the
    /// slice was shrunk to zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocation.length == 0
    }

    /// Stable identity of the region within the channel, valid until the slice is completed.
    #[must_use]
    pub const fn entry_id(&self) -> EntryId {
        self.allocation.entry
    }

    /// Consumes the first `processed` items and returns the rest to the channel.
    ///
    /// # Panics
    ///
    /// Panics if `processed` exceeds the length of the slice.
    pub fn complete(mut self, processed: usize) {
        assert!(processed <= self.len(), "completed more items than the slice holds");

        self.finished = true;
        self.shared.complete_read(self.allocation, processed);
    }

    /// Shrinks the slice to its first `new_count` items, returning the rest to the channel as
    /// readable data.
    ///
    /// # Panics
    ///
    /// Panics if `new_count` exceeds the length of the slice.
    pub fn shrink(&mut self, new_count: usize) {
        assert!(new_count <= self.len(), "cannot grow a slice");

        if new_count == self.len() {
            return;
        }

        self.shared.partial_free_read(self.allocation, new_count);
        self.allocation.length = new_count;
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<Shared<T>>) -> bool {
        Arc::ptr_eq(&self.shared, shared)
    }
}

impl<T> Deref for ReadSlice<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        // SAFETY: Published items are only written again after the reading side released them,
        // and this slice keeps them reserved until it is completed.
        unsafe { self.shared.storage().region(self.allocation.start, self.allocation.length) }
    }
}

impl<T> Drop for ReadSlice<T> {
    fn drop(&mut self) {
        if !self.finished {
            event!(
                Level::DEBUG,
                message = "read slice dropped without completion",
                length = self.allocation.length,
            );
            self.shared.complete_read(self.allocation, 0);
        }
    }
}

impl<T> Debug for ReadSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSlice")
            .field("entry", &self.allocation.entry)
            .field("start", &self.allocation.start)
            .field("len", &self.allocation.length)
            .finish_non_exhaustive()
    }
}
