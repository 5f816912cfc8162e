// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{CasesyncExitCode, ExpectedError, Result},
    output::{OutputContext, OutputOpts, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use casesync_runner::{
    api::{HttpApi, TestManagementApi},
    config::CasesyncConfig,
    errors::DisplayErrorChain,
    reporter::{HostEvent, ReporterStderr, RunState, SyncReporter, SyncReporterBuilder},
};
use clap::Parser;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};
use tracing::{debug, warn};

/// Synchronize test runs to a remote test-management system.
///
/// Reads host events as JSON lines, one per line, and reports them to the remote system as they
/// arrive.
#[derive(Debug, Parser)]
#[command(
    version,
    bin_name = "casesync",
    styles = clap_styles::style(),
    max_term_width = 100
)]
pub struct CasesyncApp {
    /// Config file [default: .config/casesync.toml in the working directory]
    #[arg(long, global = true, value_name = "PATH", env = "CASESYNC_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Directory to look for the default config file in
    #[arg(long, value_name = "DIR", default_value = ".")]
    workdir: Utf8PathBuf,

    /// Exit with a nonzero code if the run was not fully synchronized
    #[arg(long)]
    fail_on_sync_error: bool,

    /// File to read host events from ("-" for standard input) [default: standard input]
    #[arg(value_name = "EVENTS")]
    events: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

impl CasesyncApp {
    /// Returns the output context for this invocation, without installing the logger.
    pub fn output_context(&self) -> OutputContext {
        self.output.context()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        // Parse the config before installing the logger, since the config can turn on debug
        // output.
        let config = CasesyncConfig::from_sources(&self.workdir, self.config.as_deref());
        let debug = config.as_ref().is_ok_and(|config| config.debug);
        let output = self.output.init(debug);
        let config = config?;

        let api = HttpApi::new(&config.api);
        debug!(base_url = api.base_url(), "connecting to remote API");

        let mut builder = SyncReporterBuilder::default();
        builder.set_colorize(output.should_colorize_stderr());
        let mut reporter = builder.build(config, api, ReporterStderr::Terminal);

        let path = self.events_path();
        let outcome = match path {
            Some(path) => {
                let file = File::open(path).map_err(|err| ExpectedError::InputOpenError {
                    path: path.to_owned(),
                    err,
                })?;
                drive_events(BufReader::new(file), &mut reporter)
            }
            None => drive_events(io::stdin().lock(), &mut reporter),
        }
        .map_err(|(line, err)| ExpectedError::InputReadError {
            path: path.map(ToOwned::to_owned),
            line,
            err,
        })?;

        if outcome.malformed > 0 {
            warn!(
                "skipped {} malformed event {}",
                outcome.malformed,
                if outcome.malformed == 1 {
                    "line"
                } else {
                    "lines"
                },
            );
        }

        check_outcome(&reporter, self.fail_on_sync_error)
    }

    fn events_path(&self) -> Option<&Utf8Path> {
        self.events
            .as_deref()
            .filter(|path| path.as_str() != "-")
    }
}

/// What happened while reading an event stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DriveOutcome {
    pub(crate) events: usize,
    pub(crate) malformed: usize,
}

/// Feeds every JSON line in `reader` to `reporter`.
///
/// Blank lines are skipped, and lines that don't parse as events are logged and skipped. If the
/// stream ends while a run is active, the run is finalized.
///
/// On a read failure, returns the 1-based line number along with the error.
pub(crate) fn drive_events<R: BufRead, A: TestManagementApi>(
    reader: R,
    reporter: &mut SyncReporter<'_, A>,
) -> Result<DriveOutcome, (usize, io::Error)> {
    let mut outcome = DriveOutcome::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|err| (line_number, err))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                outcome.events += 1;
                reporter.report_event(event);
            }
            Err(err) => {
                outcome.malformed += 1;
                warn!(line = line_number, "ignoring malformed event: {err}");
            }
        }
    }

    if reporter.state() == RunState::Running {
        warn!("event stream ended before the run did, finalizing now");
        reporter.on_end();
    }

    Ok(outcome)
}

fn check_outcome<A: TestManagementApi>(
    reporter: &SyncReporter<'_, A>,
    fail_on_sync_error: bool,
) -> Result<i32> {
    let reason = if let Some(err) = reporter.error() {
        Some(DisplayErrorChain::new(err).to_string())
    } else if let Some(summary) = reporter.summary() {
        (!summary.is_fully_synced()).then(|| summary.to_string())
    } else {
        Some("no run was observed".to_owned())
    };

    match reason {
        Some(reason) if fail_on_sync_error => Err(ExpectedError::SyncIncomplete { reason }),
        Some(reason) => {
            debug!("run was not fully synchronized: {reason}");
            Ok(CasesyncExitCode::OK)
        }
        None => Ok(CasesyncExitCode::OK),
    }
}
