// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::task::Waker;

/// What a pending wait is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitKind {
    /// Data to read, or completion of the channel.
    Read,

    /// Space to write into, or completion of the channel.
    Write,

    /// Completion of the channel with all data consumed.
    Completion,
}

/// Identifies a registered wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WaitToken(u64);

#[derive(Debug)]
struct Pending {
    token: WaitToken,
    kind: WaitKind,
    waker: Waker,
}

/// Registry of pending waits.
///
/// Waits are not resumed one by one. Whenever the channel state changes, every pending wait whose
/// condition now holds is removed and woken in the same pass, so waits of the same kind cannot
/// starve each other.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    next_token: u64,
    pending: Vec<Pending>,
    canceled: Vec<WaitToken>,
}

impl Waiters {
    /// Registers a wait, or refreshes the waker of a wait that is already registered.
    pub(crate) fn register(&mut self, token: Option<WaitToken>, kind: WaitKind, waker: &Waker) -> WaitToken {
        if let Some(token) = token
            && let Some(pending) = self.pending.iter_mut().find(|pending| pending.token == token)
        {
            pending.waker.clone_from(waker);
            return token;
        }

        let token = WaitToken(self.next_token);
        self.next_token += 1;

        self.pending.push(Pending {
            token,
            kind,
            waker: waker.clone(),
        });

        token
    }

    /// Forgets a wait, whether it is still pending or was canceled.
    pub(crate) fn deregister(&mut self, token: WaitToken) {
        self.pending.retain(|pending| pending.token != token);
        self.canceled.retain(|canceled| *canceled != token);
    }

    /// Removes every pending wait whose condition holds, collecting their wakers.
    pub(crate) fn take_ready(&mut self, mut is_ready: impl FnMut(WaitKind) -> bool, wakers: &mut Vec<Waker>) {
        self.pending.retain(|pending| {
            if is_ready(pending.kind) {
                wakers.push(pending.waker.clone());
                false
            } else {
                true
            }
        });
    }

    /// Cancels every pending wait, collecting their wakers. Returns the number of canceled waits.
    pub(crate) fn cancel_all(&mut self, wakers: &mut Vec<Waker>) -> usize {
        let count = self.pending.len();

        for pending in self.pending.drain(..) {
            self.canceled.push(pending.token);
            wakers.push(pending.waker);
        }

        count
    }

    /// Returns whether the wait was canceled, forgetting the cancellation.
    pub(crate) fn take_canceled(&mut self, token: WaitToken) -> bool {
        let before = self.canceled.len();
        self.canceled.retain(|canceled| *canceled != token);
        before != self.canceled.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
