// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Error;

/// Records how the writing side finished. Set at most once.
#[derive(Debug, Default)]
pub(crate) struct Completion {
    error: Option<Option<Error>>,
}

impl Completion {
    pub(crate) const fn is_completed(&self) -> bool {
        self.error.is_some()
    }

    /// Records the completion. Returns `false` if it had already been recorded, in which case the
    /// earlier outcome stands.
    pub(crate) fn complete(&mut self, error: Option<Error>) -> bool {
        if self.is_completed() {
            return false;
        }

        self.error = Some(error);
        true
    }

    /// The outcome to report to an observer once the channel has nothing left to offer.
    ///
    /// `None` while the channel is still open.
    pub(crate) fn outcome(&self) -> Option<Result<(), Error>> {
        self.error.as_ref().map(|error| error.clone().map_or(Ok(()), Err))
    }

    /// The error to report for an operation that needs the channel to still be open.
    pub(crate) fn closed_error(&self) -> Error {
        match &self.error {
            Some(Some(error)) => error.clone(),
            _ => Error::Closed,
        }
    }
}
