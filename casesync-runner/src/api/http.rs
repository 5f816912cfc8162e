// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    NewDefect, NewTestCase, NewTestRun, RemoteDefect, RemoteId, RemoteNamed, RemoteProject,
    RemoteTestCase, RemoteTestRun, ResultEntry, RunLogEntry, RunStatus, SubmitResponse,
    TestManagementApi, tree,
};
use crate::{config::ApiConfig, errors::ApiError};
use debug_ignore::DebugIgnore;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;
use ureq::{Agent, Body, http::Response};

/// A [`TestManagementApi`] implementation that talks to the server over HTTP.
#[derive(Clone, Debug)]
pub struct HttpApi {
    agent: DebugIgnore<Agent>,
    base_url: String,
    // Carries the token.
    auth_header: DebugIgnore<String>,
}

impl HttpApi {
    /// Creates a new client from the API section of the config.
    pub fn new(config: &ApiConfig) -> Self {
        let agent_config = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build();
        Self {
            agent: DebugIgnore(Agent::new_with_config(agent_config)),
            base_url: config.url.trim_end_matches('/').to_owned(),
            auth_header: DebugIgnore(format!("Bearer {}", config.token)),
        }
    }

    /// Returns the base URL requests are made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---
    // Helper methods
    // ---

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, operation: &'static str, path: &str) -> Result<Value, ApiError> {
        let url = self.url(path);
        debug!(operation, %url, "GET");
        let response = self
            .agent
            .get(&url)
            .header("Authorization", self.auth_header.as_str())
            .header("Accept", "application/json")
            .call();
        read_body(operation, url, response)
    }

    fn send<B: Serialize>(
        &self,
        method: Method,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Value, ApiError> {
        let body = serde_json::to_vec(body).map_err(|err| ApiError::Encode { operation, err })?;
        let url = self.url(path);
        debug!(operation, %url, bytes = body.len(), "{}", method.as_str());
        let request = match method {
            Method::Post => self.agent.post(&url),
            Method::Patch => self.agent.patch(&url),
        };
        let response = request
            .header("Authorization", self.auth_header.as_str())
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .send(&body[..]);
        read_body(operation, url, response)
    }
}

#[derive(Clone, Copy, Debug)]
enum Method {
    Post,
    Patch,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }
}

fn read_body(
    operation: &'static str,
    url: String,
    response: Result<Response<Body>, ureq::Error>,
) -> Result<Value, ApiError> {
    let mut response = match response {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(status)) => {
            return Err(ApiError::Status {
                operation,
                url,
                status,
            });
        }
        Err(err) => return Err(ApiError::Transport { operation, url, err }),
    };

    let text = match response.body_mut().read_to_string() {
        Ok(text) => text,
        Err(err) => return Err(ApiError::Transport { operation, url, err }),
    };
    if text.trim().is_empty() {
        // 204 No Content and friends.
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|err| ApiError::Decode { operation, url, err })
}

/// Removes a `{ "data": ... }` envelope, if present.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(
    operation: &'static str,
    url: String,
    value: Value,
) -> Result<T, ApiError> {
    serde_json::from_value(unwrap_envelope(value))
        .map_err(|err| ApiError::Decode { operation, url, err })
}

impl TestManagementApi for HttpApi {
    fn list_projects(&self) -> Result<Vec<RemoteProject>, ApiError> {
        const OP: &str = "list projects";
        let path = "/projects";
        let value = self.get(OP, path)?;
        decode(OP, self.url(path), value)
    }

    fn list_environments(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        const OP: &str = "list environments";
        let path = format!("/projects/{project_id}/environments");
        let value = self.get(OP, &path)?;
        decode(OP, self.url(&path), value)
    }

    fn list_cycles(&self, project_id: &RemoteId) -> Result<Vec<RemoteNamed>, ApiError> {
        const OP: &str = "list cycles";
        let path = format!("/projects/{project_id}/cycles");
        let value = self.get(OP, &path)?;
        decode(OP, self.url(&path), value)
    }

    fn list_test_cases(&self, project_id: &RemoteId) -> Result<Vec<RemoteTestCase>, ApiError> {
        let value = self.get(
            "list test cases",
            &format!("/projects/{project_id}/test-cases"),
        )?;
        Ok(tree::flatten_test_cases(&value))
    }

    fn create_test_case(&self, case: &NewTestCase) -> Result<RemoteTestCase, ApiError> {
        const OP: &str = "create test case";
        let path = "/test-cases";
        let value = self.send(Method::Post, OP, path, case)?;
        tree::test_case_from_json(&value).ok_or_else(|| ApiError::Decode {
            operation: OP,
            url: self.url(path),
            err: <serde_json::Error as serde::de::Error>::custom(
                "response has no test case with an id and case key",
            ),
        })
    }

    fn create_test_run(&self, run: &NewTestRun) -> Result<RemoteTestRun, ApiError> {
        const OP: &str = "create test run";
        let path = "/test-runs";
        let value = self.send(Method::Post, OP, path, run)?;
        decode(OP, self.url(path), value)
    }

    fn update_test_run(&self, run_id: &RemoteId, status: RunStatus) -> Result<(), ApiError> {
        self.send(
            Method::Patch,
            "update test run",
            &format!("/test-runs/{run_id}"),
            &json!({ "status": status }),
        )?;
        Ok(())
    }

    fn submit_results(
        &self,
        run_id: &RemoteId,
        entries: &[ResultEntry],
    ) -> Result<SubmitResponse, ApiError> {
        const OP: &str = "submit results";
        let path = format!("/test-runs/{run_id}/results");
        let value = self.send(Method::Post, OP, &path, &json!({ "results": entries }))?;
        if value.is_null() {
            return Ok(SubmitResponse::default());
        }
        decode(OP, self.url(&path), value)
    }

    fn append_run_log(&self, run_id: &RemoteId, entry: &RunLogEntry) -> Result<(), ApiError> {
        self.send(
            Method::Post,
            "append run log",
            &format!("/test-runs/{run_id}/logs"),
            entry,
        )?;
        Ok(())
    }

    fn create_defect(&self, defect: &NewDefect) -> Result<RemoteDefect, ApiError> {
        const OP: &str = "create defect";
        let path = "/defects";
        let value = self.send(Method::Post, OP, path, defect)?;
        decode(OP, self.url(path), value)
    }
}
