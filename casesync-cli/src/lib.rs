// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronize test run results to a remote test-management system.
//!
//! `casesync` reads events emitted by a host test runner as JSON lines and drives a
//! [`SyncReporter`](casesync_runner::reporter::SyncReporter) with them. See the
//! `casesync-runner` crate for the library interface.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
