// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use tracing::{Level, event};

use crate::{BatchRead, BatchWrite, Error, Result};

/// Moves every item from `source` into `destination`, `batch_size` items at a time, until the
/// source is completed and drained. Returns the number of items moved.
///
/// Once the source completes, the destination is completed the same way: without an error if the
/// source completed cleanly, or with the source's error if it failed. A destination that was
/// already completed is left as is.
///
/// # Errors
///
/// Fails with the source's completion error, with [`Error::Canceled`] if a wait on either side is
/// canceled, or with [`Error::Closed`] if the destination is completed before the source is
/// drained. Items read from the source but not yet written are left in the source.
///
/// # Example
///
/// ```
/// # futures::executor::block_on(async {
/// use batch_ring::{BatchChannel, copy_all};
///
/// let source = BatchChannel::<u8>::new(16);
/// let destination = BatchChannel::<u8>::new(4);
///
/// let writer = source.open_writer();
/// for item in 0..10 {
///     writer.write(item).await.unwrap();
/// }
/// writer.complete(None).unwrap();
///
/// let (source_reader, destination_writer) = (source.open_reader(), destination.open_writer());
/// let copy = copy_all(&source_reader, &destination_writer, 3);
/// let drain = async {
///     let reader = destination.open_reader();
///     let mut received = Vec::new();
///     while let Ok(item) = reader.read().await {
///         received.push(item);
///     }
///     received
/// };
///
/// let (copied, received) = futures::join!(copy, drain);
/// assert_eq!(copied.unwrap(), 10);
/// assert_eq!(received, (0..10).collect::<Vec<_>>());
/// # });
/// ```
pub async fn copy_all<R, W>(source: &R, destination: &W, batch_size: usize) -> Result<usize>
where
    R: BatchRead,
    W: BatchWrite<Item = R::Item>,
{
    let batch_size = batch_size.max(1);
    let mut copied = 0;

    loop {
        let input = match source.start_read(batch_size).await {
            Ok(input) => input,
            Err(Error::Closed) => {
                destination.try_complete(None);
                event!(Level::DEBUG, message = "copy finished", copied);
                return Ok(copied);
            }
            Err(error @ Error::Failed(_)) => {
                destination.try_complete(Some(error.clone()));
                event!(Level::DEBUG, message = "copy failed", copied, %error);
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        let mut offset = 0;
        while offset < input.len() {
            let mut output = match destination.start_write(input.len() - offset).await {
                Ok(output) => output,
                Err(error) => {
                    source.complete_read(input, offset);
                    return Err(error);
                }
            };

            let count = output.len();
            output.copy_from_slice(&input[offset..offset + count]);
            destination.complete_write(output, count);

            offset += count;
            copied += count;
        }

        source.complete_read(input, offset);
    }
}
