// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of the project, environment and cycle a run is associated with.
//!
//! The project is required: failing to find it ends synchronization for the run. The
//! environment and cycle are optional attributes, so failing to resolve either one is logged and
//! otherwise ignored.

use crate::{
    api::{RemoteId, RemoteNamed, RemoteProject, TestManagementApi},
    config::RunConfig,
    errors::{ApiError, DisplayErrorChain, InitError},
    helpers::find_by_name_ignore_case,
};
use tracing::{debug, info, warn};

/// The remote directory data a run is associated with.
///
/// Fetched once when the run begins and held unchanged until it ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteDirectory {
    /// The project results are synchronized to.
    pub project: RemoteProject,

    /// The environment the run is associated with, if configured and found.
    pub environment_id: Option<RemoteId>,

    /// The cycle the run is associated with, if configured and found.
    pub cycle_id: Option<RemoteId>,
}

/// Looks up directory data by name or key.
#[derive(Debug)]
pub struct DirectoryResolver<'a, A> {
    api: &'a A,
}

impl<'a, A: TestManagementApi> DirectoryResolver<'a, A> {
    /// Creates a new resolver.
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Resolves everything the run configuration names.
    pub fn resolve(&self, run: &RunConfig) -> Result<RemoteDirectory, InitError> {
        let projects = self.api.list_projects()?;
        let project = match find_project(&projects, &run.project_key) {
            Some(project) => project.clone(),
            None => {
                return Err(InitError::ProjectNotFound {
                    key: run.project_key.clone(),
                    known: projects.into_iter().map(|project| project.key).collect(),
                });
            }
        };
        info!(
            project_key = %project.key,
            project_id = %project.id,
            "resolved project",
        );

        let environment_id = self.resolve_environment_id(&project.id, run.environment_name());
        let cycle_id = self.resolve_cycle_id(&project.id, run.cycle_name());

        Ok(RemoteDirectory {
            project,
            environment_id,
            cycle_id,
        })
    }

    /// Finds the project whose key matches `key`, ignoring case.
    ///
    /// Returns `Ok(None)` if no project matches.
    pub fn resolve_project(&self, key: &str) -> Result<Option<RemoteProject>, ApiError> {
        let projects = self.api.list_projects()?;
        Ok(find_project(&projects, key).cloned())
    }

    /// Finds the environment named `name` in the project.
    ///
    /// Returns `None` without a remote call if no name is configured, and `None` with a warning
    /// if the name doesn't resolve.
    pub fn resolve_environment_id(
        &self,
        project_id: &RemoteId,
        name: Option<&str>,
    ) -> Option<RemoteId> {
        let name = name?;
        resolve_named("environment", name, || {
            self.api.list_environments(project_id)
        })
    }

    /// Finds the cycle named `name` in the project.
    ///
    /// Returns `None` without a remote call if no name is configured, and `None` with a warning
    /// if the name doesn't resolve.
    pub fn resolve_cycle_id(&self, project_id: &RemoteId, name: Option<&str>) -> Option<RemoteId> {
        let name = name?;
        resolve_named("cycle", name, || self.api.list_cycles(project_id))
    }
}

fn find_project<'p>(projects: &'p [RemoteProject], key: &str) -> Option<&'p RemoteProject> {
    find_by_name_ignore_case(projects, key, |project| project.key.as_str())
}

fn resolve_named(
    kind: &'static str,
    name: &str,
    list: impl FnOnce() -> Result<Vec<RemoteNamed>, ApiError>,
) -> Option<RemoteId> {
    let entries = match list() {
        Ok(entries) => entries,
        Err(error) => {
            warn!(
                kind,
                name,
                error = %DisplayErrorChain::new(&error),
                "failed to list {kind}s, continuing without one",
            );
            return None;
        }
    };

    match find_by_name_ignore_case(&entries, name, |entry| entry.name.as_str()) {
        Some(entry) => {
            debug!(kind, name, id = %entry.id, "resolved {kind}");
            Some(entry.id.clone())
        }
        None => {
            warn!(kind, name, "{kind} `{name}` not found, continuing without one");
            None
        }
    }
}
