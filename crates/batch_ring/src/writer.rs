// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::shared::Shared;
use crate::wait::Wait;
use crate::waiters::WaitKind;
use crate::{BatchWrite, Element, Error, Result, WriteSlice};

/// The writing endpoint of a [`BatchChannel`][crate::BatchChannel].
///
/// Writers are cheap to clone and any number of them may write into the same channel
/// concurrently. See [`BatchWrite`] for the operations.
///
/// # Example
///
/// ```
/// # futures::executor::block_on(async {
/// use batch_ring::BatchChannel;
///
/// let channel = BatchChannel::<u8>::new(64);
/// let writer = channel.open_writer();
///
/// let mut slice = writer.start_write(4).await.unwrap();
/// slice[..3].copy_from_slice(b"abc");
/// writer.complete_write(slice, 3);
///
/// assert_eq!(channel.allocated_count(), 3);
/// # });
/// ```
pub struct ChannelWriter<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ChannelWriter<T> {
    pub(crate) const fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Reserves a contiguous region of up to `count` items without waiting.
    ///
    /// Returns `None` if there is no free space right now, if `count` is zero or if the channel
    /// is completed.
    #[must_use]
    pub fn try_start_write(&self, count: usize) -> Option<WriteSlice<T>> {
        self.shared
            .try_start_write(count)
            .map(|allocation| WriteSlice::new(Arc::clone(&self.shared), allocation))
    }

    /// Publishes the first `processed` items of `slice` and releases the rest.
    ///
    /// # Panics
    ///
    /// Panics if `processed` exceeds the length of the slice.
    pub fn complete_write(&self, slice: WriteSlice<T>, processed: usize) {
        debug_assert!(slice.belongs_to(&self.shared), "slice belongs to a different channel");
        slice.complete(processed);
    }

    /// Shrinks `slice` to its first `new_count` items, releasing the rest.
    ///
    /// # Panics
    ///
    /// Panics if `new_count` exceeds the length of the slice.
    pub fn partial_free(&self, slice: &mut WriteSlice<T>, new_count: usize) {
        debug_assert!(slice.belongs_to(&self.shared), "slice belongs to a different channel");
        slice.shrink(new_count);
    }

    /// Waits until there is free space to write into.
    ///
    /// Returns `Ok(false)` once the channel is completed.
    ///
    /// # Errors
    ///
    /// Fails with the completion error if the channel was completed with one, or with
    /// [`Error::Canceled`] if
    /// [`BatchChannel::cancel_pending_waits()`][crate::BatchChannel::cancel_pending_waits] is
    /// called while waiting.
    pub async fn wait_to_write(&self) -> Result<bool> {
        Wait::new(&self.shared, WaitKind::Write).await
    }

    /// Reserves a contiguous region of up to `count` items, waiting for free space if necessary.
    ///
    /// A `count` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] if the channel is completed, or with the completion error if
    /// it was completed with one.
    pub async fn start_write(&self, count: usize) -> Result<WriteSlice<T>> {
        let count = count.max(1);

        loop {
            if let Some(slice) = self.try_start_write(count) {
                return Ok(slice);
            }

            if !self.wait_to_write().await? {
                return Err(Error::Closed);
            }
        }
    }

    /// Marks the channel as completed, optionally with an error for the reading side.
    ///
    /// Writes already in flight may still be completed and are delivered. New writes are
    /// refused.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] if the channel was already completed.
    pub fn complete(&self, error: Option<Error>) -> Result<()> {
        if self.shared.complete(error) {
            Ok(())
        } else {
            Err(Error::Closed)
        }
    }

    /// Marks the channel as completed unless it already is. Returns whether this call completed it.
    pub fn try_complete(&self, error: Option<Error>) -> bool {
        self.shared.complete(error)
    }

    /// Whether the channel has been completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.shared.is_completed()
    }
}

impl<T: Element> ChannelWriter<T> {
    /// Publishes a single item without waiting. Returns `false` if it did not fit or the channel
    /// is completed.
    #[must_use]
    pub fn try_write(&self, item: T) -> bool {
        let Some(mut slice) = self.try_start_write(1) else {
            return false;
        };

        slice[0] = item;
        slice.complete(1);
        true
    }

    /// Publishes a single item, waiting for free space if necessary.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] if the channel is completed, or with the completion error if
    /// it was completed with one.
    pub async fn write(&self, item: T) -> Result<()> {
        loop {
            if self.try_write(item) {
                return Ok(());
            }

            if !self.wait_to_write().await? {
                return Err(Error::Closed);
            }
        }
    }
}

impl<T> Clone for ChannelWriter<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Debug for ChannelWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelWriter").field("shared", &self.shared).finish()
    }
}

impl<T: Element> BatchWrite for ChannelWriter<T> {
    type Item = T;

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn try_start_write(&self, count: usize) -> Option<WriteSlice<T>> {
        self.try_start_write(count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn complete_write(&self, slice: WriteSlice<T>, processed: usize) {
        self.complete_write(slice, processed);
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn partial_free(&self, slice: &mut WriteSlice<T>, new_count: usize) {
        self.partial_free(slice, new_count);
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn try_write(&self, item: T) -> bool {
        self.try_write(item)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn wait_to_write(&self) -> Result<bool> {
        self.wait_to_write().await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn write(&self, item: T) -> Result<()> {
        self.write(item).await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn start_write(&self, count: usize) -> Result<WriteSlice<T>> {
        self.start_write(count).await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn complete(&self, error: Option<Error>) -> Result<()> {
        self.complete(error)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn try_complete(&self, error: Option<Error>) -> bool {
        self.try_complete(error)
    }
}
