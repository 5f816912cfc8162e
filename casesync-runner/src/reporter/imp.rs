// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lifecycle controller that drives synchronization of a run.
//!
//! The main structure in this module is [`SyncReporter`], constructed via a
//! [`SyncReporterBuilder`].

use super::{
    HostEvent, HostTest, HostTestResult, RunSummary,
    summary::Styles,
};
use crate::{
    api::{NewTestRun, RemoteId, RunStatus, TestManagementApi},
    config::CasesyncConfig,
    defects::DefectFiler,
    directory::DirectoryResolver,
    errors::{DisplayErrorChain, InitError},
    helpers::plural,
    logs::{LogBuffer, LogUploader, OutputStream, TestLog},
    mapping::{CaseIndex, CaseMapper, CaseMapping, MapperOptions},
    queue::{QueuedResult, ResultQueue},
    submit::BatchSubmitter,
};
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    io::{self, Write},
    mem,
};
use tracing::{debug, error, info, warn};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Sync reporter builder.
#[derive(Debug, Default)]
pub struct SyncReporterBuilder {
    should_colorize: bool,
    started_at: Option<DateTime<Utc>>,
}

impl SyncReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets the time the run started, used to name runs without a configured name.
    ///
    /// Defaults to the time the run begins.
    pub fn set_started_at(&mut self, started_at: DateTime<Utc>) -> &mut Self {
        self.started_at = Some(started_at);
        self
    }

    /// Creates a new sync reporter.
    ///
    /// If `config` fails validation, the reporter starts out errored and every hook is a no-op.
    pub fn build<'a, A: TestManagementApi>(
        &self,
        config: CasesyncConfig,
        api: A,
        output: ReporterStderr<'a>,
    ) -> SyncReporter<'a, A> {
        let mut styles = Styles::default();
        if self.should_colorize {
            styles.colorize();
        }

        let state = match config.validate() {
            Ok(()) => State::Uninitialized,
            Err(err) => {
                let err = InitError::from(err);
                error!(
                    error = %DisplayErrorChain::new(&err),
                    "casesync is disabled for this run",
                );
                State::Errored(err)
            }
        };

        SyncReporter {
            api,
            config,
            started_at: self.started_at,
            output,
            styles,
            state,
        }
    }
}

/// The lifecycle state of a [`SyncReporter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// The run hasn't begun.
    Uninitialized,

    /// The remote run is being set up.
    Initializing,

    /// Tests are running and their outcomes are being buffered.
    Running,

    /// Buffered outcomes are being sent.
    Finalizing,

    /// The run was synchronized.
    Done,

    /// Synchronization stopped because of an error. Tests are unaffected.
    Errored,
}

/// Observes a test run and synchronizes it to the remote test-management system.
///
/// The host calls the `on_*` hooks (or [`report_event`](Self::report_event)) as the run
/// progresses. Hooks never fail and never panic: once something goes wrong during
/// initialization, every later hook becomes a no-op.
///
/// Remote calls are made only when the run begins and when it ends. Per-test hooks only
/// update in-memory buffers.
pub struct SyncReporter<'a, A> {
    api: A,
    config: CasesyncConfig,
    started_at: Option<DateTime<Utc>>,
    output: ReporterStderr<'a>,
    styles: Styles,
    state: State,
}

enum State {
    Uninitialized,
    Initializing,
    Running(Box<ActiveRun>),
    Finalizing,
    Done(RunSummary),
    Errored(InitError),
}

struct ActiveRun {
    run_id: RemoteId,
    run_number: Option<u64>,
    project_id: RemoteId,
    total_tests: usize,
    titles: HashMap<String, String>,
    mapping: CaseMapping,
    index: CaseIndex,
    queue: ResultQueue,
    logs: LogBuffer,
}

impl<'a, A: TestManagementApi> SyncReporter<'a, A> {
    /// Returns the current lifecycle state.
    pub fn state(&self) -> RunState {
        match &self.state {
            State::Uninitialized => RunState::Uninitialized,
            State::Initializing => RunState::Initializing,
            State::Running(_) => RunState::Running,
            State::Finalizing => RunState::Finalizing,
            State::Done(_) => RunState::Done,
            State::Errored(_) => RunState::Errored,
        }
    }

    /// Returns the error that stopped synchronization, if any.
    pub fn error(&self) -> Option<&InitError> {
        match &self.state {
            State::Errored(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the summary of the run once it has been synchronized.
    pub fn summary(&self) -> Option<&RunSummary> {
        match &self.state {
            State::Done(summary) => Some(summary),
            _ => None,
        }
    }

    /// Report a host event.
    pub fn report_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::RunBegin { tests } => self.on_begin(&tests),
            HostEvent::TestEnd { test, result } => self.on_test_end(&test, &result),
            HostEvent::Stdout { test_id, chunk } => self.on_stdout(test_id.as_deref(), &chunk),
            HostEvent::Stderr { test_id, chunk } => self.on_stderr(test_id.as_deref(), &chunk),
            HostEvent::RunEnd => {
                self.on_end();
            }
            HostEvent::Exit => self.on_exit(),
        }
    }

    /// Called when the run begins, with every test that will run.
    ///
    /// Resolves the remote project, maps tests to remote cases and creates the remote run.
    pub fn on_begin(&mut self, tests: &[HostTest]) {
        match &self.state {
            State::Uninitialized => {}
            State::Errored(_) => return,
            _ => {
                warn!("run began more than once, ignoring");
                return;
            }
        }

        self.state = State::Initializing;
        self.state = match self.initialize(tests) {
            Ok(run) => State::Running(Box::new(run)),
            Err(err) => {
                error!(
                    error = %DisplayErrorChain::new(&err),
                    "failed to initialize run, results will not be synchronized",
                );
                State::Errored(err)
            }
        };
    }

    /// Called when an attempt of a test finishes.
    pub fn on_test_end(&mut self, test: &HostTest, result: &HostTestResult) {
        let State::Running(run) = &mut self.state else {
            return;
        };

        if let Some(case_key) = result.case_override() {
            if let Some(case_id) = run.mapping.apply_override(&test.id, &case_key, &run.index) {
                let case_id = case_id.clone();
                let case_key = run.mapping.case_key(&case_id);
                let moved = run.queue.reassign(&test.id, &case_id, case_key);
                if moved > 0 {
                    debug!(
                        test_id = %test.id,
                        case_id = %case_id,
                        "moved {moved} earlier {} to the overriding case",
                        plural::results_str(moved),
                    );
                }
            }
        }

        run.logs.push_captured(&test.id, &result.stdout, &result.stderr);

        let Some(case_id) = run.mapping.get(&test.id).cloned() else {
            debug!(test_id = %test.id, "test isn't mapped to a remote case, not recording");
            return;
        };
        let title = run
            .titles
            .entry(test.id.clone())
            .or_insert_with(|| test.title())
            .clone();
        let case_key = run.mapping.case_key(&case_id).map(ToOwned::to_owned);
        run.queue.enqueue(QueuedResult {
            test_id: test.id.clone(),
            test_case_id: case_id,
            case_key,
            status: result.status.to_result_status(),
            duration: result.duration(),
            comment: result.comment(),
            test_title: title,
            error: result.error.clone(),
        });
    }

    /// Called when a test writes to standard output.
    ///
    /// Output that isn't attributed to a test is ignored.
    pub fn on_stdout(&mut self, test_id: Option<&str>, chunk: &str) {
        self.buffer_output(test_id, OutputStream::Stdout, chunk);
    }

    /// Called when a test writes to standard error.
    ///
    /// Output that isn't attributed to a test is ignored.
    pub fn on_stderr(&mut self, test_id: Option<&str>, chunk: &str) {
        self.buffer_output(test_id, OutputStream::Stderr, chunk);
    }

    /// Called when every test has finished.
    ///
    /// Submits results, uploads logs, files defects and finalizes the remote run, then prints a
    /// summary. Returns the summary, or `None` if the run wasn't being synchronized.
    pub fn on_end(&mut self) -> Option<RunSummary> {
        let run = match mem::replace(&mut self.state, State::Finalizing) {
            State::Running(run) => run,
            other => {
                if matches!(other, State::Uninitialized) {
                    warn!("run ended before it began, nothing to synchronize");
                }
                self.state = other;
                return None;
            }
        };

        let summary = self.finalize(*run);
        self.write_summary(&summary);
        self.state = State::Done(summary.clone());
        Some(summary)
    }

    /// Called just before the host exits.
    pub fn on_exit(&mut self) {
        if let State::Running(run) = &self.state {
            warn!(
                run_id = %run.run_id,
                "host is exiting before the run ended, {} buffered {} not synchronized yet",
                run.queue.len(),
                plural::results_str(run.queue.len()),
            );
        }
    }

    // ---
    // Helper methods
    // ---

    fn initialize(&self, tests: &[HostTest]) -> Result<ActiveRun, InitError> {
        let directory = DirectoryResolver::new(&self.api).resolve(&self.config.run)?;
        let project_id = directory.project.id.clone();

        let existing = self.api.list_test_cases(&project_id)?;
        debug!(
            project_id = %project_id,
            cases = existing.len(),
            "fetched remote test cases",
        );
        let mut mapper = CaseMapper::new(
            &self.api,
            project_id.clone(),
            existing,
            MapperOptions {
                auto_create: self.config.sync.auto_create_test_cases,
                defaults: self.config.test_cases.clone(),
            },
        );
        let report = mapper.map_tests(tests);
        let index = mapper.into_index();

        let started_at = self.started_at.unwrap_or_else(Utc::now);
        let new_run = NewTestRun {
            name: self.config.run.run_name(started_at),
            project_id: project_id.clone(),
            test_case_ids: report.mapping.case_ids(),
            environment_id: directory.environment_id,
            cycle_id: directory.cycle_id,
        };
        let run = self.api.create_test_run(&new_run)?;
        self.api.update_test_run(&run.id, RunStatus::InProgress)?;
        info!(
            run_id = %run.id,
            run_number = ?run.run_number,
            cases = new_run.test_case_ids.len(),
            "started remote run `{}`",
            new_run.name,
        );

        let titles = tests
            .iter()
            .map(|test| (test.id.clone(), test.title()))
            .collect();
        Ok(ActiveRun {
            run_id: run.id,
            run_number: run.run_number,
            project_id,
            total_tests: tests.len(),
            titles,
            mapping: report.mapping,
            index,
            queue: ResultQueue::new(),
            logs: LogBuffer::new(),
        })
    }

    fn buffer_output(&mut self, test_id: Option<&str>, stream: OutputStream, chunk: &str) {
        let State::Running(run) = &mut self.state else {
            return;
        };
        if let Some(test_id) = test_id {
            run.logs.push_streamed(test_id, stream, chunk);
        }
    }

    fn finalize(&self, run: ActiveRun) -> RunSummary {
        let ActiveRun {
            run_id,
            run_number,
            project_id,
            total_tests,
            titles,
            mapping,
            index: _,
            queue,
            logs,
        } = run;
        let sync = &self.config.sync;

        // 1. Results.
        let results = queue.into_deduplicated();
        let submit = BatchSubmitter::new(&self.api, sync.batch_size)
            .flush(&run_id, &results.to_entries());

        // 2. Logs, for every test with output.
        let log_outcome = if sync.upload_logs {
            let test_logs = logs.into_joined().map(|(test_id, content)| TestLog {
                    step: titles.get(&test_id).cloned().unwrap_or(test_id),
                    content,
                });
            LogUploader::new(&self.api, sync.log_chunk_size).upload(&run_id, test_logs)
        } else {
            Default::default()
        };

        // 3. Defects, from the deduplicated results only.
        let defect_outcome = if sync.auto_create_defects {
            DefectFiler::new(&self.api, project_id, &self.config.defects).file(&run_id, &results)
        } else {
            Default::default()
        };

        // 4. Final status.
        let counts = results.counts();
        let final_status = counts.run_status(sync.all_skipped_status);
        let status_update_ok = match self.api.update_test_run(&run_id, final_status) {
            Ok(()) => {
                info!(%run_id, status = %final_status, "finalized remote run");
                true
            }
            Err(err) => {
                error!(
                    %run_id,
                    status = %final_status,
                    error = %DisplayErrorChain::new(&err),
                    "failed to record final run status",
                );
                false
            }
        };

        let mapped = mapping.len();
        RunSummary {
            run_id,
            run_number,
            total_tests,
            mapped,
            unmapped: total_tests.saturating_sub(mapped),
            submitted: submit.submitted,
            failed_batches: submit.failed_batches,
            passed: counts.passed,
            failed: counts.failed,
            skipped: counts.skipped,
            blocked: counts.blocked,
            log_chunks_uploaded: log_outcome.uploaded,
            log_chunks_failed: log_outcome.failed,
            defects_filed: defect_outcome.filed,
            defects_failed: defect_outcome.failed,
            final_status,
            status_update_ok,
        }
    }

    fn write_summary(&mut self, summary: &RunSummary) {
        let mut line = String::new();
        summary.write_line(&self.styles, &mut line);
        line.push('\n');

        let res = match &mut self.output {
            ReporterStderr::Terminal => io::stderr().lock().write_all(line.as_bytes()),
            ReporterStderr::Buffer(buf) => buf.write_all(line.as_bytes()),
        };
        if let Err(err) = res {
            warn!(error = %err, "failed to write run summary");
        }
    }
}
