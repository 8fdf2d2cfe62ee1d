// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;

use crate::{Element, ReadSlice, Result};

/// The reading side of a batch channel.
///
/// Data is consumed in batches: reserve a [`ReadSlice`] of published items, process a prefix of
/// it and complete the slice with the number of items consumed. Anything left unconsumed is
/// returned to the channel and handed out again before newer data.
///
/// Several reads may be in flight at the same time. Each is handed the oldest data not already
/// reserved by another read.
///
/// # Thread safety
///
/// This trait requires `Send` from both the implementation and any returned futures.
#[trait_variant::make(Send)]
pub trait BatchRead: Debug {
    /// Type of the items carried by the channel.
    type Item: Element;

    /// Reserves up to `count` of the oldest published items without waiting.
    ///
    /// Returns `None` if nothing is readable right now, or if `count` is zero. The slice may be
    /// shorter than `count`.
    fn try_start_read(&self, count: usize) -> Option<ReadSlice<Self::Item>>;

    /// Consumes the first `processed` items of `slice`, returning the rest to the channel.
    fn complete_read(&self, slice: ReadSlice<Self::Item>, processed: usize);

    /// Shrinks `slice` to its first `new_count` items, returning the rest to the channel.
    fn partial_free(&self, slice: &mut ReadSlice<Self::Item>, new_count: usize);

    /// Consumes a single item without waiting.
    fn try_read(&self) -> Option<Self::Item>;

    /// Waits until data can be read.
    ///
    /// Returns `Ok(false)` once the channel is completed and fully drained, or the completion
    /// error if the channel was completed with one.
    async fn wait_to_read(&self) -> Result<bool>;

    /// Consumes a single item, waiting for one to be published if necessary.
    ///
    /// Fails with [`Error::Closed`][crate::Error::Closed] once the channel is completed and
    /// fully drained.
    async fn read(&self) -> Result<Self::Item>;

    /// Reserves up to `count` of the oldest published items, waiting for data if necessary.
    ///
    /// Fails with [`Error::Closed`][crate::Error::Closed] once the channel is completed and
    /// fully drained.
    async fn start_read(&self, count: usize) -> Result<ReadSlice<Self::Item>>;

    /// Waits until the channel is completed and every item in it has been consumed.
    async fn completion(&self) -> Result<()>;
}
