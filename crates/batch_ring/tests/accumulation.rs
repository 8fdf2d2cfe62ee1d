// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for read accumulation. Time is paused, so delays elapse instantly once every
//! task is idle.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
#![allow(clippy::assertions_on_result_states, reason = "Tests use assert!(x.is_err()) for clarity")]
#![allow(missing_docs, reason = "Tests")]

use std::time::Duration;

use batch_ring::{BatchChannel, ChannelOptions};
use tokio::time::{Instant, sleep, timeout};

const DELAY: Duration = Duration::from_millis(50);

fn accumulating_channel(min_read_size: usize, delay: Duration) -> BatchChannel<u32> {
    BatchChannel::with_options(
        ChannelOptions::builder()
            .max_buffer_length(64)
            .min_read_size(min_read_size)
            .max_read_accumulation_delay(delay)
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn small_batch_is_released_after_delay() {
    let channel = accumulating_channel(16, DELAY);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    let start = Instant::now();
    assert!(writer.try_write(1));

    assert!(reader.wait_to_read().await.unwrap());
    assert!(start.elapsed() >= DELAY);

    let slice = reader.start_read(64).await.unwrap();
    assert_eq!(slice.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn delay_counts_from_oldest_item() {
    let channel = accumulating_channel(16, DELAY);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    let start = Instant::now();
    assert!(writer.try_write(1));
    sleep(DELAY / 2).await;
    assert!(writer.try_write(2));

    let slice = reader.start_read(64).await.unwrap();
    assert_eq!(&*slice, &[1, 2]);

    // Released when the first item has waited long enough, not the second one.
    let waited = start.elapsed();
    assert!(waited >= DELAY);
    assert!(waited < DELAY + DELAY / 2);
}

#[tokio::test(start_paused = true)]
async fn reader_waiting_before_first_write_is_released_after_delay() {
    let channel = accumulating_channel(16, DELAY);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    let start = Instant::now();
    let waiting = tokio::spawn(async move { reader.start_read(64).await.map(|slice| slice.len()) });

    // Let the reader start waiting on the empty channel.
    tokio::task::yield_now().await;
    assert!(writer.try_write(1));

    let len = timeout(Duration::from_secs(10), waiting).await.unwrap().unwrap().unwrap();
    assert_eq!(len, 1);

    let waited = start.elapsed();
    assert!(waited >= DELAY);
    assert!(waited < DELAY * 2);
}

#[tokio::test(start_paused = true)]
async fn reaching_min_size_releases_early() {
    let channel = accumulating_channel(16, DELAY);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    let start = Instant::now();
    assert!(writer.try_write(0));

    let producer = tokio::spawn(async move {
        sleep(Duration::from_millis(10)).await;
        let mut slice = writer.start_write(15).await.unwrap();
        slice.fill(7);
        slice.complete(15);
    });

    let slice = reader.start_read(64).await.unwrap();
    assert_eq!(slice.len(), 16);
    assert!(start.elapsed() < DELAY);

    producer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn completion_flushes_accumulated_data() {
    let channel = accumulating_channel(16, Duration::MAX);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    assert!(writer.try_write(1));
    writer.complete(None).unwrap();

    assert_eq!(reader.read().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn unbounded_delay_waits_for_min_size() {
    let channel = accumulating_channel(16, Duration::MAX);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    assert!(writer.try_write(1));

    assert!(timeout(Duration::from_secs(3600), reader.wait_to_read()).await.is_err());

    // Non-blocking reads are not held back.
    assert_eq!(reader.try_read(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn zero_delay_disables_accumulation() {
    let channel = accumulating_channel(16, Duration::ZERO);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    let start = Instant::now();
    assert!(writer.try_write(1));

    assert_eq!(reader.read().await.unwrap(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn abandoned_wait_leaves_no_trace() {
    let channel = accumulating_channel(16, DELAY);
    let writer = channel.open_writer();
    let reader = channel.open_reader();

    assert!(writer.try_write(1));
    assert!(timeout(DELAY / 4, reader.wait_to_read()).await.is_err());

    assert_eq!(channel.cancel_pending_waits(), 0);
    assert!(reader.wait_to_read().await.unwrap());
}
