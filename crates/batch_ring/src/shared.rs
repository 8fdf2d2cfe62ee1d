// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::task::Waker;

use parking_lot::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{Level, event};

use crate::completion::Completion;
use crate::ring::{Allocation, RingBuffer};
use crate::storage::{Element, Storage};
use crate::waiters::{WaitKind, Waiters};
use crate::{ChannelOptions, Error, Result};

/// Where a wait stands after looking at the channel state.
#[derive(Debug)]
pub(crate) enum WaitStatus {
    /// The wait is over. `Ok(false)` means the channel was completed without error.
    Ready(Result<bool>),

    /// The wait has to continue. With a deadline, it is over once the deadline passes even if
    /// nothing else changes.
    Pending { deadline: Option<Instant> },
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) ring: RingBuffer,
    pub(crate) completion: Completion,
    pub(crate) waiters: Waiters,

    // When the oldest readable item was published. Only tracked while something is readable.
    data_since: Option<Instant>,
}

impl State {
    fn new(max_buffer_length: usize) -> Self {
        Self {
            ring: RingBuffer::new(max_buffer_length),
            completion: Completion::default(),
            waiters: Waiters::default(),
            data_since: None,
        }
    }

    pub(crate) fn wait_status(&self, kind: WaitKind, options: &ChannelOptions, now: Instant) -> WaitStatus {
        match kind {
            WaitKind::Read => self.read_status(options, now),
            WaitKind::Write => self.write_status(),
            WaitKind::Completion => self.completion_status(),
        }
    }

    fn read_status(&self, options: &ChannelOptions, now: Instant) -> WaitStatus {
        let readable = self.ring.readable_len();

        if readable == 0 {
            // Regions still being written may yet publish data, and regions still being read may
            // hand items back, so completion is only reported once both are gone.
            return match self.completion.outcome() {
                Some(outcome) if self.ring.is_empty() => WaitStatus::Ready(outcome.map(|()| false)),
                _ => WaitStatus::Pending { deadline: None },
            };
        }

        if !options.accumulates() || readable >= options.min_read_size() || self.completion.is_completed() {
            return WaitStatus::Ready(Ok(true));
        }

        // `None` here means the delay is too large to ever pass.
        let deadline = self
            .data_since
            .and_then(|since| since.checked_add(options.max_read_accumulation_delay()));

        match deadline {
            Some(deadline) if deadline <= now => WaitStatus::Ready(Ok(true)),
            deadline => WaitStatus::Pending { deadline },
        }
    }

    fn write_status(&self) -> WaitStatus {
        if let Some(outcome) = self.completion.outcome() {
            return WaitStatus::Ready(outcome.map(|()| false));
        }

        if self.ring.writable_len() > 0 {
            WaitStatus::Ready(Ok(true))
        } else {
            WaitStatus::Pending { deadline: None }
        }
    }

    fn completion_status(&self) -> WaitStatus {
        match self.completion.outcome() {
            Some(outcome) if self.ring.is_empty() => WaitStatus::Ready(outcome.map(|()| true)),
            _ => WaitStatus::Pending { deadline: None },
        }
    }

    /// Returns `true` when readable data just appeared, which starts a new accumulation deadline.
    fn refresh_data_since(&mut self, now: Instant) -> bool {
        if self.ring.readable_len() == 0 {
            self.data_since = None;
            false
        } else if self.data_since.is_none() {
            self.data_since = Some(now);
            true
        } else {
            false
        }
    }

    /// Removes every pending wait that the current state satisfies, collecting their wakers.
    ///
    /// With `deadline_started`, read waits are woken even if they still have to wait, so that
    /// they pick up the new deadline.
    fn take_ready(&mut self, options: &ChannelOptions, now: Instant, deadline_started: bool, wakers: &mut Vec<Waker>) {
        if self.waiters.is_empty() {
            return;
        }

        let read = (deadline_started && options.accumulates())
            || matches!(self.read_status(options, now), WaitStatus::Ready(_));
        let write = matches!(self.write_status(), WaitStatus::Ready(_));
        let completion = matches!(self.completion_status(), WaitStatus::Ready(_));

        self.waiters.take_ready(
            |kind| match kind {
                WaitKind::Read => read,
                WaitKind::Write => write,
                WaitKind::Completion => completion,
            },
            wakers,
        );
    }
}

/// Everything the endpoints and slices of one channel share.
pub(crate) struct Shared<T> {
    storage: Storage<T>,
    state: Mutex<State>,
    options: ChannelOptions,
}

impl<T: Element> Shared<T> {
    pub(crate) fn new(options: ChannelOptions) -> Self {
        let state = State::new(options.max_buffer_length());
        let storage = Storage::new(state.ring.capacity());

        event!(
            Level::DEBUG,
            message = "channel created",
            max_buffer_length = options.max_buffer_length(),
            capacity = storage.len(),
        );

        Self {
            storage,
            state: Mutex::new(state),
            options,
        }
    }
}

impl<T> Shared<T> {
    pub(crate) const fn storage(&self) -> &Storage<T> {
        &self.storage
    }

    pub(crate) const fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Applies a change under the lock, then wakes every wait the change satisfied.
    ///
    /// Wakers run after the lock is released.
    fn update<R>(&self, change: impl FnOnce(&mut State) -> R) -> R {
        let now = Instant::now();
        let mut wakers = Vec::new();

        let result = {
            let mut state = self.state.lock();
            let result = change(&mut state);
            let deadline_started = state.refresh_data_since(now);
            state.take_ready(&self.options, now, deadline_started, &mut wakers);
            result
        };

        wakers.into_iter().for_each(Waker::wake);
        result
    }

    pub(crate) fn try_start_write(&self, count: usize) -> Option<Allocation> {
        self.update(|state| {
            if state.completion.is_completed() {
                None
            } else {
                state.ring.try_start_write(count)
            }
        })
    }

    pub(crate) fn complete_write(&self, allocation: Allocation, processed: usize) {
        self.update(|state| state.ring.complete_write(allocation, processed));
    }

    pub(crate) fn partial_free_write(&self, allocation: Allocation, new_count: usize) {
        self.update(|state| state.ring.partial_free_write(allocation, new_count));
    }

    pub(crate) fn try_start_read(&self, count: usize) -> Option<Allocation> {
        self.update(|state| state.ring.try_start_read(count))
    }

    pub(crate) fn complete_read(&self, allocation: Allocation, processed: usize) {
        self.update(|state| state.ring.complete_read(allocation, processed));
    }

    pub(crate) fn partial_free_read(&self, allocation: Allocation, new_count: usize) {
        self.update(|state| state.ring.partial_free_read(allocation, new_count));
    }

    /// Marks the channel completed. Returns `false` if it already was.
    pub(crate) fn complete(&self, error: Option<Error>) -> bool {
        self.update(|state| {
            let failed = error.is_some();
            let completed = state.completion.complete(error);

            if completed {
                event!(
                    Level::DEBUG,
                    message = "channel completed",
                    failed,
                    unread = state.ring.allocated_count(),
                );
            }

            completed
        })
    }

    /// Resolves every pending wait with [`Error::Canceled`]. Returns how many were pending.
    pub(crate) fn cancel_pending_waits(&self) -> usize {
        let mut wakers = Vec::new();
        let canceled = self.state.lock().waiters.cancel_all(&mut wakers);

        if canceled > 0 {
            event!(Level::DEBUG, message = "pending waits canceled", canceled);
        }

        wakers.into_iter().for_each(Waker::wake);
        canceled
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state.lock().completion.is_completed()
    }

    pub(crate) fn allocated_count(&self) -> usize {
        self.state.lock().ring.allocated_count()
    }

    pub(crate) fn readable_count(&self) -> usize {
        self.state.lock().ring.readable_len()
    }
}

impl<T> Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("storage", &self.storage)
            .field("state", &*self.state.lock())
            .field("options", &self.options)
            .finish()
    }
}
