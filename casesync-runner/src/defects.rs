// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filing of defects for failed tests.
//!
//! One defect is filed for every case whose final, deduplicated result is a failure. Filing is
//! best-effort: a defect that can't be created is logged, and the others are still filed.

use crate::{
    api::{NewDefect, RemoteId, TestManagementApi},
    config::DefectConfig,
    errors::DisplayErrorChain,
    helpers::plural,
    queue::{DedupedResults, QueuedResult},
    reporter::HostTestError,
};
use regex::Regex;
use std::sync::LazyLock;
use swrite::{SWrite, swrite};
use tracing::{info, warn};

/// The description used when a failure carries no error details.
pub const NO_ERROR_DETAILS: &str = "The test failed without reporting any error details.";

static ANSI_ESCAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ANSI escape regex is valid")
});

/// What happened when defects were filed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefectOutcome {
    /// Defects created.
    pub filed: usize,

    /// Defects that couldn't be created.
    pub failed: usize,
}

/// Files defects for failed results.
#[derive(Debug)]
pub struct DefectFiler<'a, A> {
    api: &'a A,
    project_id: RemoteId,
    config: &'a DefectConfig,
}

impl<'a, A: TestManagementApi> DefectFiler<'a, A> {
    /// Creates a new filer for the project.
    pub fn new(api: &'a A, project_id: RemoteId, config: &'a DefectConfig) -> Self {
        Self {
            api,
            project_id,
            config,
        }
    }

    /// Files a defect for every failed result in `results`.
    pub fn file(&self, run_id: &RemoteId, results: &DedupedResults) -> DefectOutcome {
        let mut outcome = DefectOutcome::default();
        for result in results.failed() {
            let defect = self.new_defect(run_id, result);
            match self.api.create_defect(&defect) {
                Ok(created) => {
                    outcome.filed += 1;
                    info!(
                        case_id = %result.test_case_id,
                        case_key = result.case_key.as_deref().unwrap_or("-"),
                        defect_id = %created.id,
                        defect_key = created.key.as_deref().unwrap_or("-"),
                        "filed defect for `{}`",
                        result.test_title,
                    );
                }
                Err(error) => {
                    outcome.failed += 1;
                    warn!(
                        case_id = %result.test_case_id,
                        case_key = result.case_key.as_deref().unwrap_or("-"),
                        error = %DisplayErrorChain::new(&error),
                        "failed to file defect for `{}`",
                        result.test_title,
                    );
                }
            }
        }

        if outcome.filed + outcome.failed > 0 {
            info!(
                %run_id,
                filed = outcome.filed,
                failed = outcome.failed,
                "filed {} {}",
                outcome.filed,
                plural::defects_str(outcome.filed),
            );
        }
        outcome
    }

    fn new_defect(&self, run_id: &RemoteId, result: &QueuedResult) -> NewDefect {
        NewDefect {
            title: format!("{}{}", self.config.title_prefix, result.test_title),
            project_id: self.project_id.clone(),
            description: format_error_summary(result.error.as_ref()),
            severity: self.config.severity.clone(),
            priority: self.config.priority.clone(),
            defect_type: self.config.defect_type.clone(),
            test_case_id: result.test_case_id.clone(),
            test_run_id: run_id.clone(),
        }
    }
}

/// Formats a host error as a defect description.
///
/// Terminal escape sequences are removed. Returns [`NO_ERROR_DETAILS`] if the error is missing or
/// empty.
pub fn format_error_summary(error: Option<&HostTestError>) -> String {
    let Some(error) = error.filter(|error| !error.is_empty()) else {
        return NO_ERROR_DETAILS.to_owned();
    };

    let mut out = String::new();
    if let Some(message) = non_blank(error.message.as_deref()) {
        swrite!(out, "{}\n", strip_ansi(message).trim_end());
    }
    if let Some(location) = &error.location {
        if !out.is_empty() {
            out.push('\n');
        }
        swrite!(out, "Location: {location}\n");
    }
    if let Some(stack) = non_blank(error.stack.as_deref()) {
        if !out.is_empty() {
            out.push('\n');
        }
        swrite!(out, "Stack trace:\n{}\n", strip_ansi(stack).trim_end());
    }
    out.truncate(out.trim_end().len());
    out
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE_REGEX.replace_all(s, "").into_owned()
}
