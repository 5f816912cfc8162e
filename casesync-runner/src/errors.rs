// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by casesync.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse casesync config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// A configuration that parsed but cannot be used to synchronize a run.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigValidationError {
    /// A required key was empty or missing.
    #[error("required config key `{key}` is not set (environment variable: {env_var})")]
    MissingKey {
        /// The config key.
        key: &'static str,

        /// The environment variable that can provide it.
        env_var: &'static str,
    },
}

/// An error returned by the remote test-management API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The request could not be sent or the response could not be read.
    #[error("{operation}: request to `{url}` failed")]
    Transport {
        /// The operation being performed.
        operation: &'static str,

        /// The URL requested.
        url: String,

        /// The underlying transport error.
        #[source]
        err: ureq::Error,
    },

    /// The server responded with a non-success status code.
    #[error("{operation}: server returned status {status} for `{url}`")]
    Status {
        /// The operation being performed.
        operation: &'static str,

        /// The URL requested.
        url: String,

        /// The HTTP status code.
        status: u16,
    },

    /// The response body wasn't the expected JSON.
    #[error("{operation}: invalid response body from `{url}`")]
    Decode {
        /// The operation being performed.
        operation: &'static str,

        /// The URL requested.
        url: String,

        /// The deserialization error.
        #[source]
        err: serde_json::Error,
    },

    /// The request body couldn't be serialized.
    #[error("{operation}: failed to serialize request body")]
    Encode {
        /// The operation being performed.
        operation: &'static str,

        /// The serialization error.
        #[source]
        err: serde_json::Error,
    },
}

impl ApiError {
    /// Returns the name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Encode { operation, .. } => operation,
        }
    }
}

/// A terminal error that stops synchronization for the rest of the run.
///
/// Once recorded, every later reporter hook is a no-op. The host runner's own test execution is
/// never affected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InitError {
    /// The configuration cannot be used.
    #[error("invalid configuration")]
    Config(#[from] ConfigValidationError),

    /// No remote project matches the configured key.
    #[error(
        "project `{key}` not found (known projects: {})",
        display_known(.known)
    )]
    ProjectNotFound {
        /// The configured project key.
        key: String,

        /// The keys of all projects visible to the caller.
        known: Vec<String>,
    },

    /// A remote call required for initialization failed.
    #[error("initialization failed")]
    Api(#[from] ApiError),
}

fn display_known(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".to_owned()
    } else {
        known.join(", ")
    }
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain` for the given error.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}
