// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use thiserror::Error;

/// An error signaled by a channel endpoint.
///
/// Errors are cheap to clone. A completion error is recorded once and the same instance is
/// handed to every observer afterwards.
///
/// # Thread safety
///
/// This type is thread-safe.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The channel was completed and no more data is available.
    #[error("channel closed")]
    Closed,

    /// The channel was completed with an error by the writing side.
    #[error("channel completed with an error: {0}")]
    Failed(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A pending wait was canceled before the channel became ready.
    #[error("operation canceled")]
    Canceled,
}

impl Error {
    /// Creates an error that completes a channel as failed.
    ///
    /// # Example
    ///
    /// ```
    /// use batch_ring::{BatchChannel, Error};
    ///
    /// let channel = BatchChannel::<u8>::new(16);
    /// let writer = channel.open_writer();
    ///
    /// assert!(writer.try_complete(Some(Error::failed("upstream went away"))));
    /// ```
    #[must_use]
    pub fn failed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Failed(Arc::from(error.into()))
    }
}

/// A specialized `Result` for channel operations.
pub type Result<T> = std::result::Result<T, Error>;
