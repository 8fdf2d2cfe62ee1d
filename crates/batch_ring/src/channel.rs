// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::shared::Shared;
use crate::{ChannelOptions, ChannelReader, ChannelWriter, Element};

/// A bounded channel that moves items between producers and consumers in contiguous batches.
///
/// Items live in a single ring-shaped array owned by the channel. Writers reserve regions of it,
/// fill them in place and publish them; readers reserve regions of published items, consume them
/// in place and release them. No item is copied on its way through the channel.
///
/// The channel never holds more than `max_buffer_length` items, counting data that is published,
/// reserved for writing or reserved for reading.
///
/// Cloning the channel yields another handle to the same channel.
///
/// # Example
///
/// ```
/// # futures::executor::block_on(async {
/// use batch_ring::BatchChannel;
///
/// let channel = BatchChannel::<u16>::new(1024);
/// let writer = channel.open_writer();
/// let reader = channel.open_reader();
///
/// let mut slice = writer.start_write(3).await.unwrap();
/// slice.copy_from_slice(&[10, 20, 30]);
/// writer.complete_write(slice, 3);
///
/// let slice = reader.start_read(8).await.unwrap();
/// let sum: u16 = slice.iter().sum();
/// reader.complete_read(slice, 3);
///
/// assert_eq!(sum, 60);
/// # });
/// ```
///
/// # Thread safety
///
/// This type is thread-safe. Its endpoints may be used from any number of threads and tasks.
pub struct BatchChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Element> BatchChannel<T> {
    /// Creates a channel holding at most `max_buffer_length` items.
    ///
    /// # Panics
    ///
    /// Panics if `max_buffer_length` is zero, or so large that the backing array cannot be sized.
    #[must_use]
    pub fn new(max_buffer_length: usize) -> Self {
        Self::with_options(ChannelOptions::new(max_buffer_length))
    }

    /// Creates a channel with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `max_buffer_length` is so large that the backing array cannot be sized.
    #[must_use]
    pub fn with_options(options: ChannelOptions) -> Self {
        Self {
            shared: Arc::new(Shared::new(options)),
        }
    }
}

impl<T> BatchChannel<T> {
    /// Opens a reading endpoint.
    #[must_use]
    pub fn open_reader(&self) -> ChannelReader<T> {
        ChannelReader::new(Arc::clone(&self.shared))
    }

    /// Opens a writing endpoint.
    #[must_use]
    pub fn open_writer(&self) -> ChannelWriter<T> {
        ChannelWriter::new(Arc::clone(&self.shared))
    }

    /// The options the channel was created with.
    #[must_use]
    pub fn options(&self) -> &ChannelOptions {
        self.shared.options()
    }

    /// The maximum number of items the channel holds at any time.
    #[must_use]
    pub fn max_buffer_length(&self) -> usize {
        self.shared.options().max_buffer_length()
    }

    /// Number of items currently held, whether published or reserved by a read or write.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.shared.allocated_count()
    }

    /// Whether the writing side has completed the channel.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.shared.is_completed()
    }

    /// Resolves every pending wait on the channel with [`Error::Canceled`][crate::Error::Canceled].
    ///
    /// Returns the number of waits that were canceled. Waits started afterwards are not affected.
    pub fn cancel_pending_waits(&self) -> usize {
        self.shared.cancel_pending_waits()
    }
}

impl<T> Clone for BatchChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Debug for BatchChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchChannel").field("shared", &self.shared).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::pin::pin;
    use std::task::{Context, Poll};

    use futures::task::noop_waker_ref;
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    assert_impl_all!(BatchChannel<u8>: Send, Sync, Clone, Debug);

    #[test]
    fn new_channel_is_empty() {
        let channel = BatchChannel::<u64>::new(100);

        assert_eq!(channel.max_buffer_length(), 100);
        assert_eq!(channel.allocated_count(), 0);
        assert!(!channel.is_completed());
    }

    #[test]
    fn clones_share_state() {
        let channel = BatchChannel::<u8>::new(4);
        let clone = channel.clone();

        assert!(clone.open_writer().try_write(1));
        assert_eq!(channel.allocated_count(), 1);
    }

    #[test]
    fn cancel_pending_waits_only_affects_current_waits() {
        let channel = BatchChannel::<u8>::new(4);
        let reader = channel.open_reader();
        let mut cx = Context::from_waker(noop_waker_ref());

        let mut wait = pin!(reader.wait_to_read());
        assert!(wait.as_mut().poll(&mut cx).is_pending());

        assert_eq!(channel.cancel_pending_waits(), 1);
        assert!(matches!(wait.as_mut().poll(&mut cx), Poll::Ready(Err(Error::Canceled))));

        let mut later = pin!(reader.wait_to_read());
        assert!(later.as_mut().poll(&mut cx).is_pending());
        assert!(channel.open_writer().try_write(1));
        assert!(matches!(later.as_mut().poll(&mut cx), Poll::Ready(Ok(true))));
    }

    #[test]
    fn cancel_without_waits_is_noop() {
        let channel = BatchChannel::<u8>::new(4);

        assert_eq!(channel.cancel_pending_waits(), 0);
    }
}
