// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced by the host test runner.

use crate::{api::ResultStatus, helpers::first_line, title::build_test_title};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use swrite::{SWrite, swrite};
use tracing::debug;

/// The name of the attachment a test uses to name its remote case at runtime.
///
/// The attachment body is JSON of the form `{ "caseKey": "ENG-12" }`.
pub const CASE_OVERRIDE_ATTACHMENT: &str = "casesync-case";

/// A test known to the host runner.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostTest {
    /// The host's identifier for the test, unique within a run.
    pub id: String,

    /// The test's position in the suite hierarchy, outermost first.
    #[serde(default)]
    pub title_path: Vec<String>,

    /// Tags attached to the test.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl HostTest {
    /// Returns the display title of the test.
    pub fn title(&self) -> String {
        build_test_title(&self.title_path)
    }
}

/// The outcome of one attempt of a test, as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostTestResult {
    /// The outcome.
    pub status: HostStatus,

    /// How long the attempt took, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,

    /// The retry number: 0 for the first attempt.
    #[serde(default)]
    pub retry: u32,

    /// The error the attempt failed with, if any.
    #[serde(default)]
    pub error: Option<HostTestError>,

    /// Chunks of standard output captured by the host.
    #[serde(default)]
    pub stdout: Vec<String>,

    /// Chunks of standard error captured by the host.
    #[serde(default)]
    pub stderr: Vec<String>,

    /// Attachments added by the test.
    #[serde(default)]
    pub attachments: Vec<HostAttachment>,
}

impl HostTestResult {
    /// Returns the duration of the attempt.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Returns the case key named by a [`CASE_OVERRIDE_ATTACHMENT`], if any.
    ///
    /// If several override attachments are present, the last one wins. Attachments with an
    /// unreadable body are ignored.
    pub fn case_override(&self) -> Option<String> {
        self.attachments
            .iter()
            .rev()
            .filter(|attachment| attachment.name == CASE_OVERRIDE_ATTACHMENT)
            .find_map(|attachment| {
                let body = attachment.body.as_deref()?;
                match serde_json::from_str::<CaseOverride>(body) {
                    Ok(case_override) => {
                        let case_key = case_override.case_key.trim();
                        (!case_key.is_empty()).then(|| case_key.to_owned())
                    }
                    Err(error) => {
                        debug!(%error, "ignoring unreadable {CASE_OVERRIDE_ATTACHMENT} attachment");
                        None
                    }
                }
            })
    }

    /// Returns a short comment describing the attempt.
    pub fn comment(&self) -> String {
        let mut comment = match self.status {
            HostStatus::Passed => format!(
                "passed in {}",
                humantime::format_duration(self.duration())
            ),
            HostStatus::Failed | HostStatus::TimedOut => {
                match self.error.as_ref().and_then(HostTestError::headline) {
                    Some(line) => format!("{}: {line}", self.status),
                    None => self.status.to_string(),
                }
            }
            HostStatus::Skipped => "skipped".to_owned(),
            HostStatus::Interrupted => "blocked (interrupted)".to_owned(),
        };
        if self.retry > 0 {
            swrite!(comment, " (attempt {})", self.retry + 1);
        }
        comment
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaseOverride {
    case_key: String,
}

/// The status of a test attempt, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostStatus {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test exceeded its time limit.
    TimedOut,

    /// The test was skipped.
    Skipped,

    /// The test was interrupted before it finished.
    Interrupted,
}

impl HostStatus {
    /// Maps the host status to the status recorded remotely.
    pub fn to_result_status(self) -> ResultStatus {
        match self {
            Self::Passed => ResultStatus::Passed,
            Self::Failed | Self::TimedOut => ResultStatus::Failed,
            Self::Skipped => ResultStatus::Skipped,
            Self::Interrupted => ResultStatus::Blocked,
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::TimedOut => "timed out",
            Self::Skipped => "skipped",
            Self::Interrupted => "interrupted",
        })
    }
}

/// A structured error reported by the host for a failed attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostTestError {
    /// The error message.
    #[serde(default)]
    pub message: Option<String>,

    /// The stack trace.
    #[serde(default)]
    pub stack: Option<String>,

    /// Where the error was raised.
    #[serde(default)]
    pub location: Option<HostLocation>,
}

impl HostTestError {
    /// Returns the first non-empty line of the message, or of the stack if there's no message.
    pub fn headline(&self) -> Option<&str> {
        self.message
            .as_deref()
            .and_then(first_line)
            .or_else(|| self.stack.as_deref().and_then(first_line))
    }

    /// Returns true if the error carries no information.
    pub fn is_empty(&self) -> bool {
        self.headline().is_none() && self.location.is_none()
    }
}

/// A source location.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostLocation {
    /// The file.
    pub file: String,

    /// The 1-based line.
    pub line: u32,

    /// The 1-based column.
    #[serde(default)]
    pub column: u32,
}

impl fmt::Display for HostLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.column > 0 {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

/// An attachment added to a test result.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostAttachment {
    /// The attachment's name.
    pub name: String,

    /// The attachment's media type.
    #[serde(default)]
    pub content_type: Option<String>,

    /// The attachment's body, if it was provided inline.
    #[serde(default)]
    pub body: Option<String>,
}

/// A lifecycle event from the host runner.
///
/// Serialized as JSON with a `type` field naming the event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEvent {
    /// The run is about to start.
    RunBegin {
        /// Every test that will run.
        tests: Vec<HostTest>,
    },

    /// An attempt of a test finished.
    TestEnd {
        /// The test.
        test: HostTest,

        /// The attempt's outcome.
        result: HostTestResult,
    },

    /// A chunk of standard output was written.
    Stdout {
        /// The test that wrote the chunk, if known.
        #[serde(default, rename = "test-id")]
        test_id: Option<String>,

        /// The output.
        chunk: String,
    },

    /// A chunk of standard error was written.
    Stderr {
        /// The test that wrote the chunk, if known.
        #[serde(default, rename = "test-id")]
        test_id: Option<String>,

        /// The output.
        chunk: String,
    },

    /// Every test finished.
    RunEnd,

    /// The host is about to exit.
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn result(status: HostStatus) -> HostTestResult {
        HostTestResult {
            status,
            duration_ms: 1500,
            retry: 0,
            error: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[test_case(HostStatus::Passed, ResultStatus::Passed)]
    #[test_case(HostStatus::Failed, ResultStatus::Failed)]
    #[test_case(HostStatus::TimedOut, ResultStatus::Failed)]
    #[test_case(HostStatus::Skipped, ResultStatus::Skipped)]
    #[test_case(HostStatus::Interrupted, ResultStatus::Blocked)]
    fn status_mapping(host: HostStatus, expected: ResultStatus) {
        assert_eq!(host.to_result_status(), expected);
    }

    #[test]
    fn comments() {
        assert_eq!(result(HostStatus::Passed).comment(), "passed in 1s 500ms");
        assert_eq!(result(HostStatus::Skipped).comment(), "skipped");
        assert_eq!(
            result(HostStatus::Interrupted).comment(),
            "blocked (interrupted)"
        );

        let mut failed = result(HostStatus::Failed);
        assert_eq!(failed.comment(), "failed");
        failed.error = Some(HostTestError {
            message: Some("\nexpected 1, got 2\n  at foo".to_owned()),
            ..Default::default()
        });
        failed.retry = 2;
        assert_eq!(failed.comment(), "failed: expected 1, got 2 (attempt 3)");

        let mut timed_out = result(HostStatus::TimedOut);
        timed_out.error = Some(HostTestError {
            stack: Some("Timeout of 5000ms exceeded".to_owned()),
            ..Default::default()
        });
        assert_eq!(
            timed_out.comment(),
            "timed out: Timeout of 5000ms exceeded"
        );
    }

    #[test]
    fn case_override_from_attachment() {
        let mut r = result(HostStatus::Passed);
        assert_eq!(r.case_override(), None);

        r.attachments = vec![
            HostAttachment {
                name: CASE_OVERRIDE_ATTACHMENT.to_owned(),
                content_type: Some("application/json".to_owned()),
                body: Some(r#"{"caseKey": "ENG-1"}"#.to_owned()),
            },
            HostAttachment {
                name: "screenshot".to_owned(),
                content_type: Some("image/png".to_owned()),
                body: None,
            },
            HostAttachment {
                name: CASE_OVERRIDE_ATTACHMENT.to_owned(),
                content_type: None,
                body: Some(r#"{"caseKey": " ENG-7 "}"#.to_owned()),
            },
        ];
        assert_eq!(r.case_override().as_deref(), Some("ENG-7"));

        r.attachments[2].body = Some("not json".to_owned());
        assert_eq!(r.case_override().as_deref(), Some("ENG-1"));
    }

    #[test]
    fn location_display() {
        let mut location = HostLocation {
            file: "tests/login.rs".to_owned(),
            line: 12,
            column: 5,
        };
        assert_eq!(location.to_string(), "tests/login.rs:12:5");
        location.column = 0;
        assert_eq!(location.to_string(), "tests/login.rs:12");
    }

    #[test]
    fn parse_events() {
        let input = indoc! {r#"
            {"type": "run-begin", "tests": [{"id": "t1", "title-path": ["a.rs", "works"], "tags": ["@ENG-1"]}]}
            {"type": "stdout", "test-id": "t1", "chunk": "hello\n"}
            {"type": "stderr", "chunk": "global\n"}
            {"type": "test-end", "test": {"id": "t1", "title-path": ["a.rs", "works"]}, "result": {"status": "timed-out", "duration-ms": 30, "error": {"message": "too slow", "location": {"file": "a.rs", "line": 3}}}}
            {"type": "run-end"}
            {"type": "exit"}
        "#};
        let events: Vec<HostEvent> = input
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(events.len(), 6);
        match &events[0] {
            HostEvent::RunBegin { tests } => {
                assert_eq!(tests[0].title(), "a.rs › works");
                assert_eq!(tests[0].tags, vec!["@ENG-1".to_owned()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(
            events[2],
            HostEvent::Stderr {
                test_id: None,
                chunk: "global\n".to_owned(),
            }
        );
        match &events[3] {
            HostEvent::TestEnd { test, result } => {
                assert!(test.tags.is_empty());
                assert_eq!(result.status, HostStatus::TimedOut);
                assert_eq!(result.duration(), Duration::from_millis(30));
                assert_eq!(result.retry, 0);
                let error = result.error.as_ref().unwrap();
                assert_eq!(error.location.as_ref().unwrap().column, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events[4], HostEvent::RunEnd);
        assert_eq!(events[5], HostEvent::Exit);
    }
}
