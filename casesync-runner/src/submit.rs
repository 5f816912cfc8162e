// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched submission of results to a remote run.
//!
//! Results are sent in fixed-size batches, each in its own request. A batch that fails is logged
//! and skipped: the cases in it stay untested remotely, and the remaining batches are still sent.
//! Nothing is retried.

use crate::{
    api::{RemoteId, ResultEntry, TestManagementApi},
    errors::DisplayErrorChain,
    helpers::plural,
};
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// The default number of results per batch.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(50).unwrap();

/// What happened when results were flushed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The number of results in batches the server accepted.
    pub submitted: usize,

    /// The number of batches sent.
    pub batches: usize,

    /// The number of batches the server rejected or that failed in transit.
    pub failed_batches: usize,

    /// The number of results in failed batches.
    pub failed_results: usize,
}

/// Submits results in batches.
#[derive(Debug)]
pub struct BatchSubmitter<'a, A> {
    api: &'a A,
    batch_size: NonZeroUsize,
}

impl<'a, A: TestManagementApi> BatchSubmitter<'a, A> {
    /// Creates a new submitter.
    pub fn new(api: &'a A, batch_size: NonZeroUsize) -> Self {
        Self { api, batch_size }
    }

    /// Submits `entries` to the run, in order, one batch per request.
    pub fn flush(&self, run_id: &RemoteId, entries: &[ResultEntry]) -> SubmitOutcome {
        let mut outcome = SubmitOutcome::default();
        let total_batches = entries.len().div_ceil(self.batch_size.get());

        for (index, batch) in entries.chunks(self.batch_size.get()).enumerate() {
            let batch_number = index + 1;
            outcome.batches += 1;
            match self.api.submit_results(run_id, batch) {
                Ok(response) => {
                    outcome.submitted += batch.len();
                    if response.updated != batch.len() {
                        debug!(
                            %run_id,
                            batch = batch_number,
                            sent = batch.len(),
                            updated = response.updated,
                            "server updated a different number of results than were sent",
                        );
                    }
                }
                Err(error) => {
                    outcome.failed_batches += 1;
                    outcome.failed_results += batch.len();
                    warn!(
                        %run_id,
                        batch = batch_number,
                        error = %DisplayErrorChain::new(&error),
                        "failed to submit batch {batch_number}/{total_batches} ({} {}), skipping",
                        batch.len(),
                        plural::results_str(batch.len()),
                    );
                }
            }
        }

        info!(
            %run_id,
            submitted = outcome.submitted,
            failed_batches = outcome.failed_batches,
            "submitted {} {} in {} batches",
            outcome.submitted,
            plural::results_str(outcome.submitted),
            outcome.batches,
        );
        outcome
    }
}
