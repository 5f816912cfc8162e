// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observe a host test run and synchronize it to the remote system.
//!
//! The main type here is [`SyncReporter`], which is constructed via a [`SyncReporterBuilder`].

mod events;
mod imp;
mod summary;

pub use events::*;
pub use imp::*;
pub use summary::RunSummary;
