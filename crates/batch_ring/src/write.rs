// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use crate::{Element, Error, Result, WriteSlice};

/// The writing side of a batch channel.
///
/// Data is produced in batches: reserve a [`WriteSlice`], fill a prefix of it and complete the
/// slice with the number of items written. Slices are published to the reading side in the order
/// they were reserved, regardless of the order in which they are completed.
///
/// # Thread safety
///
/// This trait requires `Send` from both the implementation and any returned futures.
#[trait_variant::make(Send)]
pub trait BatchWrite: Debug {
    /// Type of the items carried by the channel.
    type Item: Element;

    /// Reserves a contiguous region of up to `count` items without waiting.
    ///
    /// Returns `None` if there is no free space right now, if `count` is zero or if the channel
    /// is completed. The slice may be shorter than `count`.
    fn try_start_write(&self, count: usize) -> Option<WriteSlice<Self::Item>>;

    /// Publishes the first `processed` items of `slice` and releases the rest.
    fn complete_write(&self, slice: WriteSlice<Self::Item>, processed: usize);

    /// Shrinks `slice` to its first `new_count` items, releasing the rest.
    fn partial_free(&self, slice: &mut WriteSlice<Self::Item>, new_count: usize);

    /// Publishes a single item without waiting. Returns `false` if it did not fit or the channel
    /// is completed.
    fn try_write(&self, item: Self::Item) -> bool;

    /// Waits until there is free space to write into.
    ///
    /// Returns `Ok(false)` once the channel is completed, or the completion error if the channel
    /// was completed with one.
    async fn wait_to_write(&self) -> Result<bool>;

    /// Publishes a single item, waiting for free space if necessary.
    async fn write(&self, item: Self::Item) -> Result<()>;

    /// Reserves a contiguous region of up to `count` items, waiting for free space if necessary.
    async fn start_write(&self, count: usize) -> Result<WriteSlice<Self::Item>>;

    /// Marks the channel as completed, optionally with an error for the reading side.
    ///
    /// Fails with [`Error::Closed`] if the channel was already completed.
    fn complete(&self, error: Option<Error>) -> Result<()>;

    /// Marks the channel as completed unless it already is. Returns whether this call completed it.
    fn try_complete(&self, error: Option<Error>) -> bool;
}
