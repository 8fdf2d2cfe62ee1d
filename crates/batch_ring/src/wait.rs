// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::time::{self, Instant, Sleep};
use tracing::{Level, event};

use crate::shared::{Shared, WaitStatus};
use crate::waiters::{WaitKind, WaitToken};
use crate::{Error, Result};

/// Resolves once the channel state satisfies a wait of the given kind.
///
/// The wait is registered with the channel on first poll and deregistered when it resolves or is
/// dropped, so dropping the future is the way to abandon a wait.
#[derive(Debug)]
pub(crate) struct Wait<'a, T> {
    shared: &'a Shared<T>,
    kind: WaitKind,
    token: Option<WaitToken>,

    // Only created when read accumulation sets a deadline.
    sleep: Option<Pin<Box<Sleep>>>,
}

impl<'a, T> Wait<'a, T> {
    pub(crate) const fn new(shared: &'a Shared<T>, kind: WaitKind) -> Self {
        Self {
            shared,
            kind,
            token: None,
            sleep: None,
        }
    }
}

impl<T> Future for Wait<'_, T> {
    type Output = Result<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let shared = this.shared;
        let now = Instant::now();

        let deadline = {
            let mut state = shared.lock();

            if let Some(token) = this.token
                && state.waiters.take_canceled(token)
            {
                this.token = None;
                event!(Level::DEBUG, message = "wait canceled", kind = ?this.kind);
                return Poll::Ready(Err(Error::Canceled));
            }

            match state.wait_status(this.kind, shared.options(), now) {
                WaitStatus::Ready(result) => {
                    if let Some(token) = this.token.take() {
                        state.waiters.deregister(token);
                    }
                    return Poll::Ready(result);
                }
                WaitStatus::Pending { deadline } => {
                    this.token = Some(state.waiters.register(this.token, this.kind, cx.waker()));
                    deadline
                }
            }
        };

        if let Some(deadline) = deadline {
            let sleep = this.sleep.get_or_insert_with(|| Box::pin(time::sleep_until(deadline)));
            if sleep.deadline() != deadline {
                sleep.as_mut().reset(deadline);
            }

            // The deadline is checked against the channel state on the next poll.
            if sleep.as_mut().poll(cx).is_ready() {
                cx.waker().wake_by_ref();
            }
        }

        Poll::Pending
    }
}

impl<T> Drop for Wait<'_, T> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.shared.lock().waiters.deregister(token);
        }
    }
}
