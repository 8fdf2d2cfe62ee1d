// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::{ChannelReader, Element, Error, Result};

/// Adapts a [`ChannelReader`] to the `futures::Stream` API, one item at a time.
///
/// The stream ends once the channel is completed and drained. If the channel was completed with
/// an error, that error is the last element of the stream.
///
/// Obtained from [`ChannelReader::into_stream()`].
pub struct ReadStream<T> {
    inner: BoxStream<'static, Result<T>>,
}

impl<T: Element> ReadStream<T> {
    pub(crate) fn new(reader: ChannelReader<T>) -> Self {
        let inner = stream::unfold(Some(reader), |reader| async move {
            let reader = reader?;

            match reader.read().await {
                Ok(item) => Some((Ok(item), Some(reader))),
                Err(Error::Closed) => None,
                Err(error) => Some((Err(error), None)),
            }
        });

        Self { inner: inner.boxed() }
    }
}

impl<T> Stream for ReadStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<T> Debug for ReadStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadStream").finish_non_exhaustive()
    }
}
