// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffering and upload of test output.
//!
//! Output is collected per test in a [`LogBuffer`] while the run executes. When the run ends, each
//! test's output is joined, split into chunks that fit within the server's payload limit (see
//! [`chunk_log`]) and appended to the run log, labeled with the test's title.

use crate::{
    api::{RemoteId, RunLogEntry, TestManagementApi},
    errors::DisplayErrorChain,
    helpers::plural,
};
use indexmap::IndexMap;
use std::{collections::HashSet, num::NonZeroUsize};
use tracing::{debug, info, warn};

/// The default maximum number of characters per uploaded chunk.
///
/// Kept below the server's 64 KiB request limit to leave room for the JSON envelope.
pub const DEFAULT_LOG_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(60_000).unwrap();

/// Prefix applied to chunks of standard error.
pub const STDERR_PREFIX: &str = "[stderr] ";

/// The stream a chunk of output was written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,

    /// Standard error.
    Stderr,
}

/// Output buffered per test, in the order it was written.
///
/// Output reaches the buffer in one of two ways: streamed while the test runs, or captured by
/// the host and handed over with each attempt's result. A test that streamed anything never has
/// its captured output added, so nothing is recorded twice.
#[derive(Clone, Debug, Default)]
pub struct LogBuffer {
    by_test: IndexMap<String, Vec<String>>,
    streamed: HashSet<String>,
}

impl LogBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of output streamed by a test while it runs.
    pub fn push_streamed(&mut self, test_id: &str, stream: OutputStream, chunk: &str) {
        if !self.streamed.contains(test_id) {
            self.streamed.insert(test_id.to_owned());
        }
        self.push(test_id, stream, chunk);
    }

    /// Appends the output captured for one attempt of a test, unless the test streamed its
    /// output. Returns true if the output was added.
    ///
    /// Called once per attempt, so retries accumulate in order.
    pub fn push_captured<S: AsRef<str>>(
        &mut self,
        test_id: &str,
        stdout: &[S],
        stderr: &[S],
    ) -> bool {
        if self.was_streamed(test_id) {
            return false;
        }
        for chunk in stdout {
            self.push(test_id, OutputStream::Stdout, chunk.as_ref());
        }
        for chunk in stderr {
            self.push(test_id, OutputStream::Stderr, chunk.as_ref());
        }
        true
    }

    /// Returns true if the test streamed any output.
    pub fn was_streamed(&self, test_id: &str) -> bool {
        self.streamed.contains(test_id)
    }

    fn push(&mut self, test_id: &str, stream: OutputStream, chunk: &str) {
        let chunk = match stream {
            OutputStream::Stdout => chunk.to_owned(),
            OutputStream::Stderr => format!("{STDERR_PREFIX}{chunk}"),
        };
        match self.by_test.get_mut(test_id) {
            Some(chunks) => chunks.push(chunk),
            None => {
                self.by_test.insert(test_id.to_owned(), vec![chunk]);
            }
        }
    }

    /// Returns true if any output was buffered for the test.
    /// The number of tests with buffered output.
    pub fn len(&self) -> usize {
        self.by_test.len()
    }

    /// Returns true if nothing was buffered.
    pub fn is_empty(&self) -> bool {
        self.by_test.is_empty()
    }

    /// Returns each test's output joined into a single string, in the order tests first wrote
    /// output.
    pub fn into_joined(self) -> impl Iterator<Item = (String, String)> {
        self.by_test
            .into_iter()
            .map(|(test_id, chunks)| (test_id, chunks.concat()))
    }
}

/// Splits `content` into consecutive slices of at most `chunk_size` characters.
///
/// Slices are cut on character boundaries and concatenate back to `content`. Empty content
/// produces no slices.
pub fn chunk_log(content: &str, chunk_size: NonZeroUsize) -> Vec<&str> {
    let size = chunk_size.get();
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (offset, _)) in content.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&content[start..offset]);
            start = offset;
        }
    }
    if start < content.len() {
        chunks.push(&content[start..]);
    }
    chunks
}

/// One test's output, ready to upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestLog {
    /// The step label: the test's display title.
    pub step: String,

    /// The joined output.
    pub content: String,
}

/// What happened when logs were uploaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogUploadOutcome {
    /// Tests whose output was uploaded, at least in part.
    pub tests: usize,

    /// Chunks the server accepted.
    pub uploaded: usize,

    /// Chunks that failed to upload.
    pub failed: usize,
}

/// Uploads test output to a run log.
#[derive(Debug)]
pub struct LogUploader<'a, A> {
    api: &'a A,
    chunk_size: NonZeroUsize,
}

impl<'a, A: TestManagementApi> LogUploader<'a, A> {
    /// Creates a new uploader.
    pub fn new(api: &'a A, chunk_size: NonZeroUsize) -> Self {
        Self { api, chunk_size }
    }

    /// Uploads every log, in order, chunk by chunk.
    ///
    /// Logs that are empty or contain only whitespace are skipped. A chunk that fails to upload is
    /// logged and skipped; later chunks and logs are still uploaded.
    pub fn upload(
        &self,
        run_id: &RemoteId,
        logs: impl IntoIterator<Item = TestLog>,
    ) -> LogUploadOutcome {
        let mut outcome = LogUploadOutcome::default();
        for log in logs {
            if log.content.trim().is_empty() {
                debug!(step = %log.step, "skipping whitespace-only output");
                continue;
            }

            let chunks = chunk_log(&log.content, self.chunk_size);
            let total = chunks.len();
            outcome.tests += 1;
            for (index, chunk) in chunks.into_iter().enumerate() {
                let entry = RunLogEntry {
                    content: chunk.to_owned(),
                    step: log.step.clone(),
                };
                match self.api.append_run_log(run_id, &entry) {
                    Ok(()) => outcome.uploaded += 1,
                    Err(error) => {
                        outcome.failed += 1;
                        warn!(
                            %run_id,
                            step = %log.step,
                            chunk = index + 1,
                            error = %DisplayErrorChain::new(&error),
                            "failed to upload log chunk {}/{total}, skipping",
                            index + 1,
                        );
                    }
                }
            }
        }

        if outcome.tests > 0 {
            info!(
                %run_id,
                uploaded = outcome.uploaded,
                failed = outcome.failed,
                "uploaded {} {} for {} {}",
                outcome.uploaded,
                plural::log_chunks_str(outcome.uploaded),
                outcome.tests,
                plural::tests_str(outcome.tests),
            );
        }
        outcome
    }
}
