// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A bounded channel that moves items in batches through a single ring-shaped array.
//!
//! Producers reserve contiguous regions of the array, fill them in place and publish them.
//! Consumers reserve contiguous regions of published items, process them in place and release
//! them. Items are never copied by the channel itself, which makes it a good fit for pipelines
//! that hand large numbers of small values (bytes, samples, records) between stages.
//!
//! # Ordering
//!
//! Data is handed to readers in the order the writing regions were reserved, no matter in which
//! order the writes are completed. A reader never skips over a region that is still being
//! written. Items a reader does not consume are returned to the channel and read again before
//! anything newer.
//!
//! # Capacity
//!
//! A channel holds at most `max_buffer_length` items, counting published data and regions
//! reserved by in-flight reads and writes. The backing array is sized with enough headroom that
//! a region never has to be split across the end of the array.
//!
//! # Completion
//!
//! The writing side completes the channel, optionally with an error. Writes in flight at that
//! point may still be completed and are delivered. Readers drain the remaining data and then
//! observe the completion: [`Error::Closed`] for a clean completion, or the completion error.
//!
//! # Read accumulation
//!
//! [`ChannelOptions`] can hold back waiting readers until a minimum batch size is available or
//! a delay has passed, trading latency for larger batches.
//!
//! # Example
//!
//! ```
//! # futures::executor::block_on(async {
//! use batch_ring::{BatchChannel, Error};
//!
//! let channel = BatchChannel::<u32>::new(256);
//! let writer = channel.open_writer();
//! let reader = channel.open_reader();
//!
//! let mut slice = writer.start_write(4).await.unwrap();
//! slice.copy_from_slice(&[1, 2, 3, 4]);
//! writer.complete_write(slice, 4);
//! writer.complete(None).unwrap();
//!
//! let slice = reader.start_read(3).await.unwrap();
//! assert_eq!(&*slice, &[1, 2, 3]);
//!
//! // Consume two items, the third goes back to the channel.
//! reader.complete_read(slice, 2);
//!
//! assert_eq!(reader.read().await.unwrap(), 3);
//! assert_eq!(reader.read().await.unwrap(), 4);
//! assert!(matches!(reader.read().await, Err(Error::Closed)));
//! # });
//! ```
//!
//! The `futures-stream` feature exposes a reader as a `futures::Stream` of items.

#![doc(html_logo_url = "https://media.githubusercontent.com/media/microsoft/oxidizer/refs/heads/main/crates/batch_ring/logo.png")]
#![doc(html_favicon_url = "https://media.githubusercontent.com/media/microsoft/oxidizer/refs/heads/main/crates/batch_ring/favicon.ico")]

mod channel;
mod completion;
mod copy;
mod entry;
mod error;
mod options;
mod read;
#[cfg(feature = "futures-stream")]
mod read_stream;
mod reader;
mod ring;
mod shared;
mod slice;
mod storage;
mod wait;
mod waiters;
mod write;
mod writer;

pub use channel::BatchChannel;
pub use copy::copy_all;
pub use entry::EntryId;
pub use error::{Error, Result};
pub use options::{ChannelOptions, ChannelOptionsBuilder};
pub use read::BatchRead;
#[cfg(feature = "futures-stream")]
pub use read_stream::ReadStream;
pub use reader::ChannelReader;
pub use slice::{ReadSlice, WriteSlice};
pub use storage::Element;
pub use write::BatchWrite;
pub use writer::ChannelWriter;
