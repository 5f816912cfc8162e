// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for casesync: a reporter that observes a test run and synchronizes its
//! results to a remote test-management system.
//!
//! The basic flow is driven by [`reporter::SyncReporter`]:
//!
//! 1. At the start of the run, the remote project, environment and cycle are resolved
//!    ([`directory`]), every test is mapped to a remote case ([`mapping`]), and a remote run is
//!    created.
//! 2. As tests finish, outcomes are buffered in memory ([`queue`], [`logs`]).
//! 3. At the end of the run, results are submitted in batches ([`submit`]), logs are uploaded,
//!    defects are filed for failures ([`defects`]), and the remote run is finalized.

pub mod api;
pub mod config;
pub mod defects;
pub mod directory;
pub mod errors;
mod helpers;
pub mod logs;
pub mod mapping;
pub mod queue;
pub mod reporter;
pub mod submit;
#[cfg(test)]
mod test_helpers;
pub mod title;
