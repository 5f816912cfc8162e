// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives a reporter with host events read from fixture files.

use camino::Utf8PathBuf;
use casesync_runner::{
    api::{
        NewDefect, NewTestCase, NewTestRun, RemoteDefect, RemoteId, RemoteNamed, RemoteProject,
        RemoteTestCase, RemoteTestRun, ResultEntry, ResultStatus, RunLogEntry, RunStatus,
        SubmitResponse, TestManagementApi,
    },
    config::CasesyncConfig,
    errors::ApiError,
    reporter::{HostEvent, ReporterStderr, RunState, SyncReporterBuilder},
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;

#[derive(Debug, Default)]
struct MemoryApi {
    results: RefCell<Vec<ResultEntry>>,
    logs: RefCell<Vec<RunLogEntry>>,
    defects: RefCell<Vec<NewDefect>>,
    runs: RefCell<Vec<NewTestRun>>,
    statuses: RefCell<Vec<RunStatus>>,
}

fn case(id: i64, case_key: &str, title: &str) -> RemoteTestCase {
    RemoteTestCase {
        id: RemoteId::Int(id),
        case_key: case_key.to_owned(),
        case_number: None,
        title: title.to_owned(),
    }
}

impl TestManagementApi for MemoryApi {
    fn list_projects(&self) -> Result<Vec<RemoteProject>, ApiError> {
        Ok(vec![RemoteProject {
            id: RemoteId::from("proj-shop"),
            key: "SHOP".to_owned(),
            name: "Shop".to_owned(),
        }])
    }

    fn list_environments(&self, _project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        Ok(Vec::new())
    }

    fn list_cycles(&self, _project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        Ok(Vec::new())
    }

    fn list_test_cases(&self, project_id: &RemoteId) -> Result<Vec<RemoteTestCase>, ApiError> {
        assert_eq!(project_id, &RemoteId::from("proj-shop"));
        Ok(vec![
            case(1, "SHOP-1", "Adds an item (legacy title)"),
            case(2, "SHOP-2", "Cart.spec.ts › cart › Removes an item"),
            case(9, "SHOP-9", "Checkout by card"),
        ])
    }

    fn create_test_case(&self, _case: &NewTestCase) -> Result<RemoteTestCase, ApiError> {
        panic!("auto-creation is disabled")
    }

    fn create_test_run(&self, run: &NewTestRun) -> Result<RemoteTestRun, ApiError> {
        self.runs.borrow_mut().push(run.clone());
        Ok(RemoteTestRun {
            id: RemoteId::from("run-abc"),
            run_number: Some(31),
            total_cases: Some(run.test_case_ids.len() as u64),
            status: Some(RunStatus::Pending),
        })
    }

    fn update_test_run(&self, run_id: &RemoteId, status: RunStatus) -> Result<(), ApiError> {
        assert_eq!(run_id, &RemoteId::from("run-abc"));
        self.statuses.borrow_mut().push(status);
        Ok(())
    }

    fn submit_results(
        &self,
        _run_id: &RemoteId,
        entries: &[ResultEntry],
    ) -> Result<SubmitResponse, ApiError> {
        self.results.borrow_mut().extend_from_slice(entries);
        Ok(SubmitResponse {
            updated: entries.len(),
        })
    }

    fn append_run_log(&self, _run_id: &RemoteId, entry: &RunLogEntry) -> Result<(), ApiError> {
        self.logs.borrow_mut().push(entry.clone());
        Ok(())
    }

    fn create_defect(&self, defect: &NewDefect) -> Result<RemoteDefect, ApiError> {
        self.defects.borrow_mut().push(defect.clone());
        Ok(RemoteDefect {
            id: RemoteId::Int(500),
            key: Some("DEF-500".to_owned()),
        })
    }
}

fn read_fixture(name: &str) -> Vec<HostEvent> {
    let path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let contents = std::fs::read_to_string(&path).unwrap_or_else(|err| {
        panic!("failed to read fixture {path}: {err}");
    });
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).unwrap_or_else(|err| panic!("invalid event {line}: {err}"))
        })
        .collect()
}

fn config() -> CasesyncConfig {
    let mut config = CasesyncConfig::default_config();
    config.api.url = "https://tms.example.com/api".to_owned();
    config.api.token = "token".to_owned();
    config.run.project_key = "shop".to_owned();
    config.run.name = Some("Nightly".to_owned());
    config
}

#[test]
fn retried_run_is_synchronized() {
    let events = read_fixture("retried-run.jsonl");
    assert_eq!(events.len(), 10);

    let api = MemoryApi::default();
    let mut buf = Vec::new();
    let mut reporter =
        SyncReporterBuilder::default().build(config(), &api, ReporterStderr::Buffer(&mut buf));
    for event in events {
        reporter.report_event(event);
    }
    assert_eq!(reporter.state(), RunState::Done);
    let summary = reporter.summary().cloned().expect("run finished");
    drop(reporter);

    let runs = api.runs.borrow();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].name, "Nightly");
    assert_eq!(
        runs[0].test_case_ids,
        vec![RemoteId::Int(1), RemoteId::Int(2)]
    );

    let results: Vec<_> = api
        .results
        .borrow()
        .iter()
        .map(|entry| (entry.test_case_id.clone(), entry.status, entry.duration))
        .collect();
    assert_eq!(
        results,
        vec![
            (RemoteId::Int(1), ResultStatus::Passed, 640),
            (RemoteId::Int(2), ResultStatus::Failed, 30000),
            (RemoteId::Int(9), ResultStatus::Passed, 1204),
        ]
    );

    let logs: Vec<_> = api
        .logs
        .borrow()
        .iter()
        .map(|entry| (entry.step.clone(), entry.content.clone()))
        .collect();
    assert_eq!(
        logs,
        vec![
            (
                "cart.spec.ts › Cart › adds an item".to_owned(),
                "adding item 42\n".to_owned()
            ),
            (
                "cart.spec.ts › Cart › removes an item".to_owned(),
                "[stderr] waiting for selector .cart-row\n".to_owned()
            ),
        ]
    );

    let defects = api.defects.borrow();
    assert_eq!(defects.len(), 1);
    assert_eq!(
        defects[0].title,
        "[Automated] cart.spec.ts › Cart › removes an item"
    );
    assert_eq!(defects[0].description, "Test timeout of 30000ms exceeded.");
    assert_eq!(defects[0].project_id, RemoteId::from("proj-shop"));
    assert_eq!(defects[0].test_run_id, RemoteId::from("run-abc"));

    assert_eq!(
        *api.statuses.borrow(),
        vec![RunStatus::InProgress, RunStatus::Failed]
    );

    assert_eq!(summary.total_tests, 4);
    assert_eq!(summary.mapped, 3);
    assert_eq!(summary.unmapped, 1);
    assert_eq!(summary.defects_filed, 1);
    let printed = String::from_utf8(buf).unwrap();
    assert_eq!(printed.trim(), summary.to_string());
}
