// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An in-memory [`TestManagementApi`] that records every call.

use crate::{
    api::{
        NewDefect, NewTestCase, NewTestRun, RemoteDefect, RemoteId, RemoteNamed, RemoteProject,
        RemoteTestCase, RemoteTestRun, ResultEntry, RunLogEntry, RunStatus, SubmitResponse,
        TestManagementApi,
    },
    errors::ApiError,
};
use std::{cell::RefCell, collections::HashMap};

#[derive(Debug, Default)]
pub(crate) struct RecordingApi {
    state: RefCell<State>,
}

#[derive(Debug, Default)]
struct State {
    projects: Vec<RemoteProject>,
    environments: Vec<RemoteNamed>,
    cycles: Vec<RemoteNamed>,
    test_cases: Vec<RemoteTestCase>,
    next_id: i64,

    calls: Vec<String>,
    call_counts: HashMap<&'static str, usize>,
    // Operation -> 1-based call numbers that fail. An empty list fails every call.
    failures: HashMap<&'static str, Vec<usize>>,

    created_cases: Vec<NewTestCase>,
    created_runs: Vec<NewTestRun>,
    run_updates: Vec<(RemoteId, RunStatus)>,
    submissions: Vec<Vec<ResultEntry>>,
    logs: Vec<RunLogEntry>,
    defects: Vec<NewDefect>,
}

impl RecordingApi {
    pub(crate) fn with_project(id: i64, key: &str) -> Self {
        let api = Self::default();
        {
            let mut state = api.state.borrow_mut();
            state.projects.push(RemoteProject {
                id: RemoteId::Int(id),
                key: key.to_owned(),
                name: format!("{key} project"),
            });
            state.next_id = 1000;
        }
        api
    }

    pub(crate) fn add_environment(&self, id: i64, name: &str) {
        self.state.borrow_mut().environments.push(RemoteNamed {
            id: RemoteId::Int(id),
            name: name.to_owned(),
        });
    }

    pub(crate) fn add_cycle(&self, id: i64, name: &str) {
        self.state.borrow_mut().cycles.push(RemoteNamed {
            id: RemoteId::Int(id),
            name: name.to_owned(),
        });
    }

    pub(crate) fn add_test_case(&self, id: i64, case_key: &str, title: &str) {
        self.state.borrow_mut().test_cases.push(RemoteTestCase {
            id: RemoteId::Int(id),
            case_key: case_key.to_owned(),
            case_number: None,
            title: title.to_owned(),
        });
    }

    /// Makes the `nth` call (1-based) to `operation` fail.
    pub(crate) fn fail_on(&self, operation: &'static str, nth: usize) {
        self.state
            .borrow_mut()
            .failures
            .entry(operation)
            .or_default()
            .push(nth);
    }

    /// Makes every call to `operation` fail.
    pub(crate) fn fail_always(&self, operation: &'static str) {
        self.state
            .borrow_mut()
            .failures
            .insert(operation, Vec::new());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn call_count(&self, operation: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| *call == operation)
            .count()
    }

    pub(crate) fn created_cases(&self) -> Vec<NewTestCase> {
        self.state.borrow().created_cases.clone()
    }

    pub(crate) fn created_runs(&self) -> Vec<NewTestRun> {
        self.state.borrow().created_runs.clone()
    }

    pub(crate) fn run_updates(&self) -> Vec<(RemoteId, RunStatus)> {
        self.state.borrow().run_updates.clone()
    }

    pub(crate) fn submissions(&self) -> Vec<Vec<ResultEntry>> {
        self.state.borrow().submissions.clone()
    }

    pub(crate) fn logs(&self) -> Vec<RunLogEntry> {
        self.state.borrow().logs.clone()
    }

    pub(crate) fn defects(&self) -> Vec<NewDefect> {
        self.state.borrow().defects.clone()
    }

    // ---
    // Helper methods
    // ---

    fn record(&self, operation: &'static str) -> Result<(), ApiError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation.to_owned());
        let count = {
            let count = state.call_counts.entry(operation).or_default();
            *count += 1;
            *count
        };
        match state.failures.get(operation) {
            Some(nths) if nths.is_empty() || nths.contains(&count) => Err(ApiError::Status {
                operation,
                url: format!("fake://{operation}"),
                status: 500,
            }),
            _ => Ok(()),
        }
    }

    fn next_id(&self) -> RemoteId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        RemoteId::Int(state.next_id)
    }
}

impl TestManagementApi for RecordingApi {
    fn list_projects(&self) -> Result<Vec<RemoteProject>, ApiError> {
        self.record("list_projects")?;
        Ok(self.state.borrow().projects.clone())
    }

    fn list_environments(&self, _project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        self.record("list_environments")?;
        Ok(self.state.borrow().environments.clone())
    }

    fn list_cycles(&self, _project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        self.record("list_cycles")?;
        Ok(self.state.borrow().cycles.clone())
    }

    fn list_test_cases(&self, _project_id: &RemoteId) -> Result<Vec<RemoteTestCase>, ApiError> {
        self.record("list_test_cases")?;
        Ok(self.state.borrow().test_cases.clone())
    }

    fn create_test_case(&self, case: &NewTestCase) -> Result<RemoteTestCase, ApiError> {
        self.state.borrow_mut().created_cases.push(case.clone());
        self.record("create_test_case")?;
        let id = self.next_id();
        let created = RemoteTestCase {
            case_key: format!("AUTO-{id}"),
            id,
            case_number: None,
            title: case.title.clone(),
        };
        self.state.borrow_mut().test_cases.push(created.clone());
        Ok(created)
    }

    fn create_test_run(&self, run: &NewTestRun) -> Result<RemoteTestRun, ApiError> {
        self.state.borrow_mut().created_runs.push(run.clone());
        self.record("create_test_run")?;
        Ok(RemoteTestRun {
            id: self.next_id(),
            run_number: Some(7),
            total_cases: Some(run.test_case_ids.len() as u64),
            status: Some(RunStatus::Pending),
        })
    }

    fn update_test_run(&self, run_id: &RemoteId, status: RunStatus) -> Result<(), ApiError> {
        self.state
            .borrow_mut()
            .run_updates
            .push((run_id.clone(), status));
        self.record("update_test_run")
    }

    fn submit_results(
        &self,
        _run_id: &RemoteId,
        entries: &[ResultEntry],
    ) -> Result<SubmitResponse, ApiError> {
        self.state.borrow_mut().submissions.push(entries.to_vec());
        self.record("submit_results")?;
        Ok(SubmitResponse {
            updated: entries.len(),
        })
    }

    fn append_run_log(&self, _run_id: &RemoteId, entry: &RunLogEntry) -> Result<(), ApiError> {
        self.state.borrow_mut().logs.push(entry.clone());
        self.record("append_run_log")
    }

    fn create_defect(&self, defect: &NewDefect) -> Result<RemoteDefect, ApiError> {
        self.state.borrow_mut().defects.push(defect.clone());
        self.record("create_defect")?;
        Ok(RemoteDefect {
            id: self.next_id(),
            key: None,
        })
    }
}
