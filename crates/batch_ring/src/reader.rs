// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::shared::Shared;
use crate::wait::Wait;
use crate::waiters::WaitKind;
use crate::{BatchRead, Element, Error, ReadSlice, Result};

/// The reading endpoint of a [`BatchChannel`][crate::BatchChannel].
///
/// Readers are cheap to clone and any number of them may read from the same channel
/// concurrently. See [`BatchRead`] for the operations.
///
/// # Example
///
/// ```
/// # futures::executor::block_on(async {
/// use batch_ring::BatchChannel;
///
/// let channel = BatchChannel::<u32>::new(64);
/// let reader = channel.open_reader();
/// let writer = channel.open_writer();
///
/// writer.write(1).await.unwrap();
/// writer.write(2).await.unwrap();
/// writer.complete(None).unwrap();
///
/// let slice = reader.start_read(16).await.unwrap();
/// assert_eq!(&*slice, &[1, 2]);
/// reader.complete_read(slice, 2);
///
/// reader.completion().await.unwrap();
/// # });
/// ```
pub struct ChannelReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ChannelReader<T> {
    pub(crate) const fn new(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    /// Reserves up to `count` of the oldest published items without waiting.
    ///
    /// Returns `None` if nothing is readable right now, or if `count` is zero.
    #[must_use]
    pub fn try_start_read(&self, count: usize) -> Option<ReadSlice<T>> {
        self.shared
            .try_start_read(count)
            .map(|allocation| ReadSlice::new(Arc::clone(&self.shared), allocation))
    }

    /// Consumes the first `processed` items of `slice`, returning the rest to the channel.
    ///
    /// # Panics
    ///
    /// Panics if `processed` exceeds the length of the slice.
    pub fn complete_read(&self, slice: ReadSlice<T>, processed: usize) {
        debug_assert!(slice.belongs_to(&self.shared), "slice belongs to a different channel");
        slice.complete(processed);
    }

    /// Shrinks `slice` to its first `new_count` items, returning the rest to the channel.
    ///
    /// # Panics
    ///
    /// Panics if `new_count` exceeds the length of the slice.
    pub fn partial_free(&self, slice: &mut ReadSlice<T>, new_count: usize) {
        debug_assert!(slice.belongs_to(&self.shared), "slice belongs to a different channel");
        slice.shrink(new_count);
    }

    /// Waits until data can be read.
    ///
    /// Returns `Ok(false)` once the channel is completed and fully drained.
    ///
    /// # Errors
    ///
    /// Fails with the completion error if the channel was completed with one, or with
    /// [`Error::Canceled`] if
    /// [`BatchChannel::cancel_pending_waits()`][crate::BatchChannel::cancel_pending_waits] is
    /// called while waiting.
    pub async fn wait_to_read(&self) -> Result<bool> {
        Wait::new(&self.shared, WaitKind::Read).await
    }

    /// Waits until the channel is completed and every item in it has been consumed.
    ///
    /// # Errors
    ///
    /// Fails with the completion error if the channel was completed with one, or with
    /// [`Error::Canceled`] if the wait is canceled.
    pub async fn completion(&self) -> Result<()> {
        Wait::new(&self.shared, WaitKind::Completion).await.map(|_| ())
    }

    /// Whether the writing side has completed the channel. There may still be data to read.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.shared.is_completed()
    }

    /// Number of items that can be read right now, in order.
    #[must_use]
    pub fn readable_count(&self) -> usize {
        self.shared.readable_count()
    }

    fn closed(&self) -> Error {
        self.shared.lock().completion.closed_error()
    }
}

impl<T: Element> ChannelReader<T> {
    /// Consumes a single item without waiting.
    #[must_use]
    pub fn try_read(&self) -> Option<T> {
        let slice = self.try_start_read(1)?;
        let item = slice[0];
        slice.complete(1);
        Some(item)
    }

    /// Consumes a single item, waiting for one to be published if necessary.
    ///
    /// Honors the read accumulation settings of the channel, unlike [`try_read()`][Self::try_read].
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] once the channel is completed and fully drained, or with the
    /// completion error if the channel was completed with one.
    pub async fn read(&self) -> Result<T> {
        loop {
            if !self.wait_to_read().await? {
                return Err(self.closed());
            }

            if let Some(item) = self.try_read() {
                return Ok(item);
            }
        }
    }

    /// Reserves up to `count` of the oldest published items, waiting for data if necessary.
    ///
    /// Honors the read accumulation settings of the channel, unlike
    /// [`try_start_read()`][Self::try_start_read]. A `count` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] once the channel is completed and fully drained, or with the
    /// completion error if the channel was completed with one.
    pub async fn start_read(&self, count: usize) -> Result<ReadSlice<T>> {
        let count = count.max(1);

        loop {
            if !self.wait_to_read().await? {
                return Err(self.closed());
            }

            if let Some(slice) = self.try_start_read(count) {
                return Ok(slice);
            }
        }
    }

    /// Turns the reader into a stream of items that ends once the channel is completed and
    /// drained.
    #[cfg(feature = "futures-stream")]
    #[must_use]
    pub fn into_stream(self) -> crate::ReadStream<T> {
        crate::ReadStream::new(self)
    }
}

impl<T> Clone for ChannelReader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Debug for ChannelReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelReader").field("shared", &self.shared).finish()
    }
}

impl<T: Element> BatchRead for ChannelReader<T> {
    type Item = T;

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn try_start_read(&self, count: usize) -> Option<ReadSlice<T>> {
        self.try_start_read(count)
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn complete_read(&self, slice: ReadSlice<T>, processed: usize) {
        self.complete_read(slice, processed);
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn partial_free(&self, slice: &mut ReadSlice<T>, new_count: usize) {
        self.partial_free(slice, new_count);
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    fn try_read(&self) -> Option<T> {
        self.try_read()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn wait_to_read(&self) -> Result<bool> {
        self.wait_to_read().await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn read(&self) -> Result<T> {
        self.read().await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn start_read(&self, count: usize) -> Result<ReadSlice<T>> {
        self.start_read(count).await
    }

    #[cfg_attr(test, mutants::skip)] // Trivial forwarder.
    async fn completion(&self) -> Result<()> {
        self.completion().await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use futures::executor::block_on;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::BatchChannel;

    assert_impl_all!(ChannelReader<u8>: Send, Sync, Clone, BatchRead);

    #[test]
    fn read_returns_items_in_order() {
        let channel = BatchChannel::<u8>::new(8);
        let reader = channel.open_reader();
        let writer = channel.open_writer();

        for item in 1..=3 {
            assert!(writer.try_write(item));
        }

        block_on(async {
            assert_eq!(reader.read().await.unwrap(), 1);
            assert_eq!(reader.read().await.unwrap(), 2);
            assert_eq!(reader.read().await.unwrap(), 3);
        });
    }

    #[test]
    fn read_after_completion_is_closed() {
        let channel = BatchChannel::<u8>::new(8);
        let reader = channel.open_reader();
        let writer = channel.open_writer();

        assert!(writer.try_write(1));
        writer.complete(None).unwrap();

        block_on(async {
            assert_eq!(reader.read().await.unwrap(), 1);
            assert!(matches!(reader.read().await, Err(Error::Closed)));
            assert!(matches!(reader.start_read(4).await, Err(Error::Closed)));
            assert!(!reader.wait_to_read().await.unwrap());
        });
    }

    #[test]
    fn failure_is_reported_after_drain() {
        let channel = BatchChannel::<u8>::new(8);
        let reader = channel.open_reader();
        let writer = channel.open_writer();

        assert!(writer.try_write(1));
        writer.complete(Some(Error::failed("producer crashed"))).unwrap();

        block_on(async {
            assert_eq!(reader.read().await.unwrap(), 1);
            assert!(matches!(reader.read().await, Err(Error::Failed(_))));
            assert!(matches!(reader.completion().await, Err(Error::Failed(_))));
        });
    }

    #[test]
    fn try_read_on_empty_channel() {
        let channel = BatchChannel::<u8>::new(8);

        assert_eq!(channel.open_reader().try_read(), None);
    }

    #[test]
    fn readable_count_tracks_published_data() {
        let channel = BatchChannel::<u8>::new(8);
        let reader = channel.open_reader();
        let writer = channel.open_writer();

        let slice = writer.try_start_write(4).unwrap();
        assert_eq!(reader.readable_count(), 0);

        writer.complete_write(slice, 3);
        assert_eq!(reader.readable_count(), 3);
    }

    #[test]
    fn readers_share_the_channel() {
        let channel = BatchChannel::<u8>::new(8);
        let first = channel.open_reader();
        let second = first.clone();
        let writer = channel.open_writer();

        assert!(writer.try_write(1));
        assert!(writer.try_write(2));

        let a = first.try_start_read(1).unwrap();
        let b = second.try_start_read(1).unwrap();
        assert_eq!((a[0], b[0]), (1, 2));

        second.complete_read(b, 1);
        first.complete_read(a, 1);
        assert_eq!(channel.allocated_count(), 0);
    }
}
