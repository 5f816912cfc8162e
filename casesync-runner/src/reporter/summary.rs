// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    api::{RemoteId, RunStatus},
    helpers::plural,
};
use owo_colors::{OwoColorize, Style};
use std::fmt;
use swrite::{SWrite, swrite};

/// What happened to a run, computed when it ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// The remote run.
    pub run_id: RemoteId,

    /// The run's human-facing number, if the server assigned one.
    pub run_number: Option<u64>,

    /// Tests announced by the host when the run began.
    pub total_tests: usize,

    /// Tests mapped to a remote case, including runtime overrides.
    pub mapped: usize,

    /// Tests not mapped to any remote case.
    pub unmapped: usize,

    /// Results the server accepted.
    pub submitted: usize,

    /// Result batches that failed.
    pub failed_batches: usize,

    /// Final results that passed.
    pub passed: usize,

    /// Final results that failed.
    pub failed: usize,

    /// Final results that were skipped.
    pub skipped: usize,

    /// Final results that were blocked.
    pub blocked: usize,

    /// Log chunks uploaded.
    pub log_chunks_uploaded: usize,

    /// Log chunks that failed to upload.
    pub log_chunks_failed: usize,

    /// Defects filed.
    pub defects_filed: usize,

    /// Defects that couldn't be filed.
    pub defects_failed: usize,

    /// The status computed for the run.
    pub final_status: RunStatus,

    /// Whether the server accepted the final status.
    pub status_update_ok: bool,
}

impl RunSummary {
    /// The number of distinct cases with a final result.
    pub fn result_count(&self) -> usize {
        self.passed + self.failed + self.skipped + self.blocked
    }

    /// Returns true if every remote operation at the end of the run succeeded.
    pub fn is_fully_synced(&self) -> bool {
        self.failed_batches == 0
            && self.log_chunks_failed == 0
            && self.defects_failed == 0
            && self.status_update_ok
    }

    pub(super) fn write_line(&self, styles: &Styles, out: &mut String) {
        let status_style = match self.final_status {
            RunStatus::Passed => styles.pass,
            RunStatus::Failed => styles.fail,
            _ => styles.skip,
        };

        swrite!(out, "{:>12} ", "Synced".style(status_style));
        match self.run_number {
            Some(number) => swrite!(out, "run #{number} (id {})", self.run_id),
            None => swrite!(out, "run {}", self.run_id),
        }

        let result_count = self.result_count();
        swrite!(
            out,
            ": {}/{} {} submitted (",
            self.submitted.style(styles.count),
            result_count.style(styles.count),
            plural::results_str(result_count),
        );
        swrite!(
            out,
            "{} {}, {} {}",
            self.passed.style(styles.count),
            "passed".style(styles.pass),
            self.failed.style(styles.count),
            "failed".style(styles.fail),
        );
        if self.skipped > 0 {
            swrite!(
                out,
                ", {} {}",
                self.skipped.style(styles.count),
                "skipped".style(styles.skip),
            );
        }
        if self.blocked > 0 {
            swrite!(
                out,
                ", {} {}",
                self.blocked.style(styles.count),
                "blocked".style(styles.skip),
            );
        }
        swrite!(out, ")");
        if self.failed_batches > 0 {
            swrite!(
                out,
                " [{} {}]",
                self.failed_batches.style(styles.count),
                if self.failed_batches == 1 {
                    "batch failed"
                } else {
                    "batches failed"
                }
                .style(styles.fail),
            );
        }

        swrite!(
            out,
            "; {}/{} {} mapped",
            self.mapped.style(styles.count),
            self.total_tests.style(styles.count),
            plural::tests_str(self.total_tests),
        );

        swrite!(
            out,
            "; {} {}",
            self.log_chunks_uploaded.style(styles.count),
            plural::log_chunks_str(self.log_chunks_uploaded),
        );
        if self.log_chunks_failed > 0 {
            swrite!(
                out,
                " [{} {}]",
                self.log_chunks_failed.style(styles.count),
                "failed".style(styles.fail),
            );
        }

        swrite!(
            out,
            "; {} {} filed",
            self.defects_filed.style(styles.count),
            plural::defects_str(self.defects_filed),
        );
        if self.defects_failed > 0 {
            swrite!(
                out,
                " [{} {}]",
                self.defects_failed.style(styles.count),
                "failed".style(styles.fail),
            );
        }

        swrite!(out, "; status {}", self.final_status.style(status_style));
        if !self.status_update_ok {
            swrite!(out, " {}", "(not recorded)".style(styles.fail));
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_line(&Styles::default(), &mut out);
        f.write_str(out.trim_start())
    }
}

#[derive(Clone, Debug, Default)]
pub(super) struct Styles {
    pub(super) count: Style,
    pub(super) pass: Style,
    pub(super) fail: Style,
    pub(super) skip: Style,
}

impl Styles {
    pub(super) fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: RemoteId::Int(1001),
            run_number: Some(7),
            total_tests: 3,
            mapped: 2,
            unmapped: 1,
            submitted: 2,
            failed_batches: 0,
            passed: 1,
            failed: 1,
            skipped: 0,
            blocked: 0,
            log_chunks_uploaded: 1,
            log_chunks_failed: 0,
            defects_filed: 1,
            defects_failed: 0,
            final_status: RunStatus::Failed,
            status_update_ok: true,
        }
    }

    #[test]
    fn display_plain() {
        assert_eq!(
            summary().to_string(),
            "Synced run #7 (id 1001): 2/2 results submitted (1 passed, 1 failed); \
             2/3 tests mapped; 1 log chunk; 1 defect filed; status failed"
        );
        assert!(summary().is_fully_synced());
    }

    #[test]
    fn display_partial_failures() {
        let summary = RunSummary {
            run_number: None,
            submitted: 0,
            failed_batches: 1,
            skipped: 2,
            log_chunks_uploaded: 0,
            log_chunks_failed: 2,
            defects_filed: 0,
            defects_failed: 1,
            status_update_ok: false,
            ..summary()
        };
        assert_eq!(
            summary.to_string(),
            "Synced run 1001: 0/4 results submitted (1 passed, 1 failed, 2 skipped) \
             [1 batch failed]; 2/3 tests mapped; 0 log chunks [2 failed]; \
             0 defects filed [1 failed]; status failed (not recorded)"
        );
        assert!(!summary.is_fully_synced());
    }
}
