// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The remote test-management API.
//!
//! [`TestManagementApi`] describes every call casesync makes. [`HttpApi`] implements it over
//! HTTP; tests substitute an in-memory implementation.

mod http;
mod tree;

pub use http::HttpApi;
pub use tree::flatten_test_cases;

use crate::errors::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An identifier assigned by the remote system.
///
/// Servers use either integers or strings (such as UUIDs) for identifiers. The original
/// representation is preserved so that identifiers are sent back exactly as received.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    /// An integer identifier.
    Int(i64),

    /// A string identifier.
    Str(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for RemoteId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_owned())
    }
}

/// A project in the remote system.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    /// The project's identifier.
    pub id: RemoteId,

    /// The project's short key, for example `ENG`.
    pub key: String,

    /// The project's display name.
    #[serde(default)]
    pub name: String,
}

/// A named directory entry scoped to a project: an environment or a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNamed {
    /// The entry's identifier.
    pub id: RemoteId,

    /// The entry's display name.
    pub name: String,
}

/// A test case record in the remote system.
///
/// Servers name these fields inconsistently, so test cases are read out of JSON by
/// [`flatten_test_cases`] rather than through `Deserialize`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteTestCase {
    /// The case's identifier.
    pub id: RemoteId,

    /// The case's key, for example `ENG-12`.
    pub case_key: String,

    /// The case's number within its project.
    pub case_number: Option<u64>,

    /// The case's title.
    pub title: String,
}

/// The fields sent to create a test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestCase {
    /// The project the case belongs to.
    pub project_id: RemoteId,

    /// The case's title.
    pub title: String,

    /// A description of where the case came from.
    pub description: String,

    /// The case's priority.
    pub priority: String,

    /// The case's type, for example `automated`.
    #[serde(rename = "type")]
    pub case_type: String,
}

/// The status of a single result.
///
/// `Untested` is the remote default for a case in a run; it is never produced locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// The case passed.
    Passed,

    /// The case failed.
    Failed,

    /// The case was skipped.
    Skipped,

    /// The case could not run to completion.
    Blocked,

    /// The case has no result yet.
    Untested,
}

impl ResultStatus {
    /// Returns the status as the string used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Blocked => "blocked",
            Self::Untested => "untested",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The status of a remote run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has been created but not started.
    Pending,

    /// Results are being recorded.
    InProgress,

    /// The run passed.
    Passed,

    /// At least one result failed.
    Failed,

    /// At least one result was blocked.
    Blocked,

    /// Every result was skipped.
    Skipped,

    /// A status casesync doesn't know about. Never sent.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns the status as the string used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Skipped => "skipped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields sent to create a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestRun {
    /// The run's name.
    pub name: String,

    /// The project the run belongs to.
    pub project_id: RemoteId,

    /// The cases included in the run.
    pub test_case_ids: Vec<RemoteId>,

    /// The environment the run is associated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_id: Option<RemoteId>,

    /// The cycle the run is associated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<RemoteId>,
}

/// A run in the remote system.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTestRun {
    /// The run's identifier.
    pub id: RemoteId,

    /// The run's number within its project.
    #[serde(default)]
    pub run_number: Option<u64>,

    /// The number of cases in the run.
    #[serde(default)]
    pub total_cases: Option<u64>,

    /// The run's status.
    #[serde(default)]
    pub status: Option<RunStatus>,
}

/// One result submitted to a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    /// The case the result is for.
    pub test_case_id: RemoteId,

    /// The result's status.
    pub status: ResultStatus,

    /// The duration of the test, in milliseconds.
    pub duration: u64,

    /// A short human-readable comment.
    pub comment: String,
}

/// The response to a result submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SubmitResponse {
    /// The number of results the server recorded.
    #[serde(default)]
    pub updated: usize,
}

/// One chunk of log text appended to a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunLogEntry {
    /// The log text.
    pub content: String,

    /// The step the text belongs to: the test's display title.
    pub step: String,
}

/// The fields sent to file a defect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDefect {
    /// The defect's title.
    pub title: String,

    /// The project the defect belongs to.
    pub project_id: RemoteId,

    /// The defect's description.
    pub description: String,

    /// The defect's severity.
    pub severity: String,

    /// The defect's priority.
    pub priority: String,

    /// The defect's type.
    pub defect_type: String,

    /// The case the defect is linked to.
    pub test_case_id: RemoteId,

    /// The run the defect is linked to.
    pub test_run_id: RemoteId,
}

/// A defect in the remote system.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDefect {
    /// The defect's identifier.
    pub id: RemoteId,

    /// The defect's key, if the server assigns one.
    #[serde(default)]
    pub key: Option<String>,
}

/// Every call casesync makes to the remote system.
///
/// All calls are blocking. They are made only while a run begins and ends, never while tests
/// are reporting their outcomes.
pub trait TestManagementApi {
    /// Lists every project visible to the caller.
    fn list_projects(&self) -> Result<Vec<RemoteProject>, ApiError>;

    /// Lists the environments of a project.
    fn list_environments(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError>;

    /// Lists the cycles of a project.
    fn list_cycles(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError>;

    /// Lists every test case of a project, flattened out of the server's folder tree.
    fn list_test_cases(&self, project_id: &RemoteId) -> Result<Vec<RemoteTestCase>, ApiError>;

    /// Creates a test case.
    fn create_test_case(&self, case: &NewTestCase) -> Result<RemoteTestCase, ApiError>;

    /// Creates a run.
    fn create_test_run(&self, run: &NewTestRun) -> Result<RemoteTestRun, ApiError>;

    /// Sets the status of a run.
    fn update_test_run(&self, run_id: &RemoteId, status: RunStatus) -> Result<(), ApiError>;

    /// Upserts results into a run.
    fn submit_results(
        &self,
        run_id: &RemoteId,
        entries: &[ResultEntry],
    ) -> Result<SubmitResponse, ApiError>;

    /// Appends a chunk of log text to a run.
    fn append_run_log(&self, run_id: &RemoteId, entry: &RunLogEntry) -> Result<(), ApiError>;

    /// Files a defect.
    fn create_defect(&self, defect: &NewDefect) -> Result<RemoteDefect, ApiError>;
}

impl<T: TestManagementApi + ?Sized> TestManagementApi for &T {
    fn list_projects(&self) -> Result<Vec<RemoteProject>, ApiError> {
        (**self).list_projects()
    }

    fn list_environments(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        (**self).list_environments(project_id)
    }

    fn list_cycles(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        (**self).list_cycles(project_id)
    }

    fn list_test_cases(&self, project_id: &RemoteId) -> Result<Vec<RemoteTestCase>, ApiError> {
        (**self).list_test_cases(project_id)
    }

    fn create_test_case(&self, case: &NewTestCase) -> Result<RemoteTestCase, ApiError> {
        (**self).create_test_case(case)
    }

    fn create_test_run(&self, run: &NewTestRun) -> Result<RemoteTestRun, ApiError> {
        (**self).create_test_run(run)
    }

    fn update_test_run(&self, run_id: &RemoteId, status: RunStatus) -> Result<(), ApiError> {
        (**self).update_test_run(run_id, status)
    }

    fn submit_results(
        &self,
        run_id: &RemoteId,
        entries: &[ResultEntry],
    ) -> Result<SubmitResponse, ApiError> {
        (**self).submit_results(run_id, entries)
    }

    fn append_run_log(&self, run_id: &RemoteId, entry: &RunLogEntry) -> Result<(), ApiError> {
        (**self).append_run_log(run_id, entry)
    }

    fn create_defect(&self, defect: &NewDefect) -> Result<RemoteDefect, ApiError> {
        (**self).create_defect(defect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn remote_id_preserves_representation() {
        let ids: Vec<RemoteId> = serde_json::from_value(json!([7, "a1b2"])).unwrap();
        assert_eq!(ids, vec![RemoteId::Int(7), RemoteId::from("a1b2")]);
        assert_eq!(serde_json::to_value(&ids).unwrap(), json!([7, "a1b2"]));
        assert_eq!(ids[0].to_string(), "7");
    }

    #[test]
    fn new_test_run_omits_unset_attributes() {
        let run = NewTestRun {
            name: "Nightly".to_owned(),
            project_id: RemoteId::Int(1),
            test_case_ids: vec![RemoteId::Int(10), RemoteId::Int(11)],
            environment_id: None,
            cycle_id: Some(RemoteId::Int(3)),
        };
        assert_eq!(
            serde_json::to_value(&run).unwrap(),
            json!({
                "name": "Nightly",
                "projectId": 1,
                "testCaseIds": [10, 11],
                "cycleId": 3,
            })
        );
    }

    #[test]
    fn run_status_wire_names() {
        assert_eq!(
            serde_json::to_value(RunStatus::InProgress).unwrap(),
            json!("in_progress")
        );
        let run: RemoteTestRun =
            serde_json::from_value(json!({"id": 4, "runNumber": 12, "status": "archived"}))
                .unwrap();
        assert_eq!(run.status, Some(RunStatus::Unknown));
        assert_eq!(run.run_number, Some(12));
    }
}
