// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Configuration of a [`BatchChannel`][crate::BatchChannel].
///
/// # Read accumulation
///
/// By default a waiting reader is resumed as soon as any data is published. A reader that
/// prefers fewer, larger batches can raise `min_read_size`: waits for data then only complete
/// once that many items are readable, once the oldest unread item has been waiting for
/// `max_read_accumulation_delay`, or once the writing side completes the channel.
///
/// Accumulation only affects waiting. Non-blocking reads always return whatever is available.
///
/// A non-zero delay relies on the Tokio timer, so waits must then run inside a Tokio runtime
/// with the time driver enabled.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use batch_ring::ChannelOptions;
///
/// let options = ChannelOptions::builder()
///     .max_buffer_length(4096)
///     .min_read_size(512)
///     .max_read_accumulation_delay(Duration::from_millis(5))
///     .build();
///
/// assert_eq!(options.min_read_size(), 512);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOptions {
    max_buffer_length: usize,
    min_read_size: usize,
    max_read_accumulation_delay: Duration,
}

impl ChannelOptions {
    /// Creates options for a channel holding at most `max_buffer_length` items, with no read
    /// accumulation.
    ///
    /// # Panics
    ///
    /// Panics if `max_buffer_length` is zero.
    #[must_use]
    pub fn new(max_buffer_length: usize) -> Self {
        Self::builder().max_buffer_length(max_buffer_length).build()
    }

    /// Starts building a new `ChannelOptions`.
    #[must_use]
    pub fn builder() -> ChannelOptionsBuilder {
        ChannelOptionsBuilder {
            max_buffer_length: None,
            min_read_size: 1,
            max_read_accumulation_delay: Duration::ZERO,
        }
    }

    /// The maximum number of items the channel holds at any time, including items reserved by
    /// in-flight reads and writes.
    #[must_use]
    pub const fn max_buffer_length(&self) -> usize {
        self.max_buffer_length
    }

    /// The number of readable items at which a waiting reader is resumed.
    #[must_use]
    pub const fn min_read_size(&self) -> usize {
        self.min_read_size
    }

    /// How long published data may wait for `min_read_size` to be reached before a waiting
    /// reader is resumed anyway. Zero disables accumulation.
    #[must_use]
    pub const fn max_read_accumulation_delay(&self) -> Duration {
        self.max_read_accumulation_delay
    }

    /// Whether waits for data may be held back until more data arrives.
    pub(crate) fn accumulates(&self) -> bool {
        self.min_read_size > 1 && !self.max_read_accumulation_delay.is_zero()
    }
}

/// Creates an instance of [`ChannelOptions`].
///
/// Access through [`ChannelOptions::builder()`][ChannelOptions::builder].
#[derive(Debug)]
pub struct ChannelOptionsBuilder {
    max_buffer_length: Option<usize>,
    min_read_size: usize,
    max_read_accumulation_delay: Duration,
}

impl ChannelOptionsBuilder {
    /// The maximum number of items the channel holds at any time. Mandatory.
    #[must_use]
    pub fn max_buffer_length(mut self, max_buffer_length: usize) -> Self {
        self.max_buffer_length = Some(max_buffer_length);
        self
    }

    /// The number of readable items at which a waiting reader is resumed.
    ///
    /// Optional. Defaults to 1. Values above `max_buffer_length` are lowered to it, as more
    /// than that can never become readable.
    #[must_use]
    pub fn min_read_size(mut self, min_read_size: usize) -> Self {
        self.min_read_size = min_read_size;
        self
    }

    /// How long published data may wait for `min_read_size` to be reached.
    ///
    /// Optional. Defaults to zero, which disables accumulation. `Duration::MAX` waits for
    /// `min_read_size` (or completion) without a time limit.
    #[must_use]
    pub fn max_read_accumulation_delay(mut self, delay: Duration) -> Self {
        self.max_read_accumulation_delay = delay;
        self
    }

    /// Builds the `ChannelOptions` with the provided configuration.
    ///
    /// # Panics
    ///
    /// Panics if `max_buffer_length` has not been set or is zero.
    #[must_use]
    pub fn build(self) -> ChannelOptions {
        let max_buffer_length = self
            .max_buffer_length
            .expect("max_buffer_length must be set");
        assert!(max_buffer_length > 0, "max_buffer_length must be at least 1");

        ChannelOptions {
            max_buffer_length,
            min_read_size: self.min_read_size.clamp(1, max_buffer_length),
            max_read_accumulation_delay: self.max_read_accumulation_delay,
        }
    }
}
