// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use casesync_runner::errors::{ConfigParseError, DisplayErrorChain};
use owo_colors::OwoColorize;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `casesync` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum CasesyncExitCode {}

impl CasesyncExitCode {
    /// Every event was processed, and the run was synchronized or synchronization was
    /// best-effort.
    pub const OK: i32 = 0;

    /// `--fail-on-sync-error` was passed and the run was not fully synchronized.
    pub const SYNC_INCOMPLETE: i32 = 3;

    /// The event stream could not be read to the end.
    pub const INPUT_READ_FAILED: i32 = 97;

    /// A user issue happened while setting up a casesync invocation.
    pub const SETUP_ERROR: i32 = 96;
}

// The #[error()] strings are placeholders: errors are printed with display_to_stderr.

/// An error that casesync reports to the user before exiting.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to open event stream")]
    InputOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read event stream")]
    InputReadError {
        path: Option<Utf8PathBuf>,
        line: usize,
        #[source]
        err: std::io::Error,
    },
    #[error("run was not fully synchronized")]
    SyncIncomplete { reason: String },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } | Self::InputOpenError { .. } => {
                CasesyncExitCode::SETUP_ERROR
            }
            Self::InputReadError { .. } => CasesyncExitCode::INPUT_READ_FAILED,
            Self::SyncIncomplete { .. } => CasesyncExitCode::SYNC_INCOMPLETE,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        match self {
            Self::ConfigParseError { err } => {
                error!("{}", DisplayErrorChain::new(err));
            }
            Self::InputOpenError { path, err } => {
                error!(
                    "failed to open event stream `{}`: {err}",
                    path.style(styles.bold),
                );
            }
            Self::InputReadError { path, line, err } => {
                let source = match path {
                    Some(path) => path.as_str(),
                    None => "standard input",
                };
                error!(
                    "failed to read line {} of {}: {err}",
                    line.style(styles.bold),
                    source.style(styles.bold),
                );
            }
            Self::SyncIncomplete { reason } => {
                error!(
                    "{}: {reason}",
                    "run was not fully synchronized".style(styles.error)
                );
            }
        }
    }
}
