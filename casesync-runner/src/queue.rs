// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffering of per-test outcomes until the end of the run.
//!
//! Outcomes are appended to a [`ResultQueue`] as the host reports them. At the end of the run the
//! queue is collapsed into [`DedupedResults`], which hold exactly one result per remote case: the
//! one reported last.
//!
//! Deduplication relies on repeated reports for the same test (retries) arriving in the order
//! they happened. Hosts run the attempts of a single test sequentially, so arrival order is
//! execution order; reports for *different* tests may interleave arbitrarily.

pub use crate::api::ResultStatus;
use crate::{
    api::{RemoteId, ResultEntry, RunStatus},
    config::AllSkippedStatus,
    reporter::HostTestError,
};
use indexmap::IndexMap;
use std::time::Duration;

/// One outcome waiting to be submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedResult {
    /// The host's identifier for the test that produced the outcome.
    pub test_id: String,

    /// The remote case the outcome is for.
    pub test_case_id: RemoteId,

    /// The key of the remote case, if known.
    pub case_key: Option<String>,

    /// The outcome.
    pub status: ResultStatus,

    /// How long the test took.
    pub duration: Duration,

    /// A short human-readable comment.
    pub comment: String,

    /// The test's display title.
    pub test_title: String,

    /// The error reported by the host, if any.
    pub error: Option<HostTestError>,
}

impl QueuedResult {
    /// Converts this outcome into the entry submitted to the server.
    pub fn to_entry(&self) -> ResultEntry {
        ResultEntry {
            test_case_id: self.test_case_id.clone(),
            status: self.status,
            duration: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            comment: self.comment.clone(),
        }
    }
}

/// An append-only buffer of outcomes, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct ResultQueue {
    entries: Vec<QueuedResult>,
}

impl ResultQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome. Never touches the network.
    pub fn enqueue(&mut self, result: QueuedResult) {
        self.entries.push(result);
    }

    /// Moves every outcome already reported by `test_id` to another remote case.
    ///
    /// Used when a test names its case at runtime, so that earlier attempts recorded under the
    /// previous mapping are deduplicated together with the latest one. Returns the number of
    /// outcomes moved.
    pub fn reassign(
        &mut self,
        test_id: &str,
        test_case_id: &RemoteId,
        case_key: Option<&str>,
    ) -> usize {
        let mut moved = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| entry.test_id == test_id && entry.test_case_id != *test_case_id)
        {
            entry.test_case_id = test_case_id.clone();
            entry.case_key = case_key.map(ToOwned::to_owned);
            moved += 1;
        }
        moved
    }

    /// The number of outcomes appended so far, including repeats for the same case.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collapses the queue so that each case keeps only its last-reported outcome.
    ///
    /// Cases appear in the order they were first reported.
    pub fn into_deduplicated(self) -> DedupedResults {
        let mut results = IndexMap::with_capacity(self.entries.len());
        for entry in self.entries {
            // IndexMap::insert replaces the value but keeps the original position.
            results.insert(entry.test_case_id.clone(), entry);
        }
        DedupedResults { results }
    }
}

/// Outcomes with at most one entry per remote case.
#[derive(Clone, Debug, Default)]
pub struct DedupedResults {
    results: IndexMap<RemoteId, QueuedResult>,
}

impl DedupedResults {
    /// The number of distinct cases.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns the result for a case, if any.
    pub fn get(&self, test_case_id: &RemoteId) -> Option<&QueuedResult> {
        self.results.get(test_case_id)
    }

    /// Iterates over results in submission order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &QueuedResult> + '_ {
        self.results.values()
    }

    /// Iterates over results whose final status is a failure.
    pub fn failed(&self) -> impl Iterator<Item = &QueuedResult> + '_ {
        self.iter()
            .filter(|result| result.status == ResultStatus::Failed)
    }

    /// Returns the wire entries in submission order.
    pub fn to_entries(&self) -> Vec<ResultEntry> {
        self.iter().map(QueuedResult::to_entry).collect()
    }

    /// Counts results by status.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for result in self.iter() {
            counts.add(result.status);
        }
        counts
    }

    /// Derives the terminal status of the run from these results.
    pub fn run_status(&self, all_skipped: AllSkippedStatus) -> RunStatus {
        self.counts().run_status(all_skipped)
    }
}

/// Result counts by status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Passed results.
    pub passed: usize,

    /// Failed results.
    pub failed: usize,

    /// Skipped results.
    pub skipped: usize,

    /// Blocked results.
    pub blocked: usize,
}

impl StatusCounts {
    fn add(&mut self, status: ResultStatus) {
        match status {
            ResultStatus::Passed => self.passed += 1,
            ResultStatus::Failed => self.failed += 1,
            ResultStatus::Skipped => self.skipped += 1,
            ResultStatus::Blocked => self.blocked += 1,
            // Never queued locally.
            ResultStatus::Untested => {}
        }
    }

    /// The total number of counted results.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.blocked
    }

    /// Derives a run status: any failure fails the run, otherwise any blocked result blocks it,
    /// otherwise it passed.
    ///
    /// A run whose results were all skipped finalizes according to `all_skipped`.
    pub fn run_status(&self, all_skipped: AllSkippedStatus) -> RunStatus {
        if self.failed > 0 {
            RunStatus::Failed
        } else if self.blocked > 0 {
            RunStatus::Blocked
        } else if self.skipped > 0 && self.passed == 0 {
            all_skipped.to_run_status()
        } else {
            RunStatus::Passed
        }
    }
}
