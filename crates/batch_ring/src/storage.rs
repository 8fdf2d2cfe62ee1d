// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cell::UnsafeCell;
use std::fmt::{self, Debug};
use std::slice;

/// Types that can be carried through a channel.
///
/// Items are plain values: they are copied in and out of the ring storage and the storage is
/// initialized with [`Default`] values up front, so no region ever holds uninitialized memory.
pub trait Element: Copy + Default + Send + Sync + 'static {}

impl<T> Element for T where T: Copy + Default + Send + Sync + 'static {}

/// The physical array shared by the reading and writing side of a channel.
///
/// Access is not synchronized here. The region bookkeeping of the ring guarantees that every
/// region is either owned by exactly one write slice, by exactly one read slice or by nobody.
pub(crate) struct Storage<T> {
    cells: Box<[UnsafeCell<T>]>,
}

// SAFETY: Items are only ever accessed through read or write slices, and the ring hands out at most
// one slice per region, so there is never a shared and an exclusive reference to the same item.
unsafe impl<T: Send + Sync> Sync for Storage<T> {}

impl<T: Element> Storage<T> {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            cells: (0..len).map(|_| UnsafeCell::new(T::default())).collect(),
        }
    }
}

impl<T> Storage<T> {
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    fn region_ptr(&self, start: usize, len: usize) -> *mut T {
        assert!(
            start.checked_add(len).is_some_and(|end| end <= self.cells.len()),
            "region {start}+{len} is outside of the storage"
        );

        UnsafeCell::raw_get(self.cells[start..].as_ptr())
    }

    /// Returns a shared view of a region.
    ///
    /// # Safety
    ///
    /// Nobody may hold an exclusive view overlapping the region for the lifetime of the result.
    pub(crate) unsafe fn region(&self, start: usize, len: usize) -> &[T] {
        let ptr = self.region_ptr(start, len);

        // SAFETY: The region is in bounds and `UnsafeCell<T>` has the same layout as `T`. The
        // caller guarantees there is no overlapping exclusive view.
        unsafe { slice::from_raw_parts(ptr, len) }
    }

    /// Returns an exclusive view of a region.
    ///
    /// # Safety
    ///
    /// Nobody else may hold any view overlapping the region for the lifetime of the result.
    #[expect(clippy::mut_from_ref, reason = "interior mutability, exclusivity is upheld by the caller")]
    pub(crate) unsafe fn region_mut(&self, start: usize, len: usize) -> &mut [T] {
        let ptr = self.region_ptr(start, len);

        // SAFETY: The region is in bounds and `UnsafeCell<T>` has the same layout as `T`. The
        // caller guarantees exclusive access to the region.
        unsafe { slice::from_raw_parts_mut(ptr, len) }
    }
}

impl<T> Debug for Storage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage").field("len", &self.cells.len()).finish_non_exhaustive()
    }
}
