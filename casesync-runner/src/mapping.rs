// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of local tests to remote test cases.
//!
//! Each test is mapped once, when the run begins, using these strategies in order:
//!
//! 1. **Tag**: the test carries a case key tag (see
//!    [`extract_case_key_from_tags`](crate::title::extract_case_key_from_tags)) naming a known
//!    remote case.
//! 2. **Title**: the test's display title equals a remote case's title, ignoring case.
//! 3. **Auto-create**: if enabled, a new remote case is created with the test's title.
//!
//! A test matching none of these is left unmapped and excluded from the run. A mapping may later
//! be replaced by a runtime override naming a known case key; see [`CaseMapping::apply_override`].

use crate::{
    api::{NewTestCase, RemoteId, RemoteTestCase, TestManagementApi},
    config::TestCaseDefaults,
    errors::DisplayErrorChain,
    reporter::HostTest,
    title::{build_test_title, extract_case_key_from_tags},
};
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Lookup tables over the remote test cases known to this run.
///
/// Built from the cases fetched when the run begins; cases created during mapping are added as
/// they are created.
#[derive(Clone, Debug, Default)]
pub struct CaseIndex {
    // Keyed by uppercased case key.
    by_key: HashMap<String, RemoteTestCase>,
    // Keyed by lowercased title. The first case with a given title wins.
    by_title: HashMap<String, RemoteId>,
}

impl CaseIndex {
    /// Builds an index over the given cases.
    pub fn new(cases: impl IntoIterator<Item = RemoteTestCase>) -> Self {
        let mut index = Self::default();
        for case in cases {
            index.insert(case);
        }
        index
    }

    /// Adds a case to the index.
    pub fn insert(&mut self, case: RemoteTestCase) {
        let title = case.title.trim().to_lowercase();
        if !title.is_empty() {
            self.by_title.entry(title).or_insert_with(|| case.id.clone());
        }
        self.by_key.insert(case.case_key.to_uppercase(), case);
    }

    /// Looks up a case by key, ignoring case.
    pub fn by_key(&self, case_key: &str) -> Option<&RemoteTestCase> {
        self.by_key.get(&case_key.to_uppercase())
    }

    /// Looks up a case id by title, ignoring case.
    pub fn by_title(&self, title: &str) -> Option<&RemoteId> {
        self.by_title.get(&title.trim().to_lowercase())
    }

    /// The number of cases in the index.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// How a test was mapped to its remote case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// The test carried a tag naming the case.
    Tag,

    /// The test's title matched the case's title.
    Title,

    /// The case was created for this test.
    Created,

    /// The test named the case at runtime.
    Override,
}

/// The association between local tests and remote cases.
///
/// Holds at most one remote case per local test. Several tests may map to the same case.
#[derive(Clone, Debug, Default)]
pub struct CaseMapping {
    by_test: IndexMap<String, (RemoteId, MatchKind)>,
    case_keys: HashMap<RemoteId, String>,
}

impl CaseMapping {
    /// Returns the case a test is mapped to.
    pub fn get(&self, test_id: &str) -> Option<&RemoteId> {
        self.by_test.get(test_id).map(|(id, _)| id)
    }

    /// Returns how a test was mapped.
    pub fn match_kind(&self, test_id: &str) -> Option<MatchKind> {
        self.by_test.get(test_id).map(|(_, kind)| *kind)
    }

    /// Returns the key of a mapped case.
    pub fn case_key(&self, case_id: &RemoteId) -> Option<&str> {
        self.case_keys.get(case_id).map(String::as_str)
    }

    /// The number of mapped tests.
    pub fn len(&self) -> usize {
        self.by_test.len()
    }

    /// Returns true if no test is mapped.
    pub fn is_empty(&self) -> bool {
        self.by_test.is_empty()
    }

    /// Returns the distinct mapped case ids, in the order tests were mapped.
    pub fn case_ids(&self) -> Vec<RemoteId> {
        self.by_test
            .values()
            .map(|(id, _)| id.clone())
            .unique()
            .collect()
    }

    /// Replaces the mapping of `test_id` with the case named by `case_key`.
    ///
    /// The key is resolved only against `index`; an unknown key leaves the mapping unchanged and
    /// returns `None`. Never makes a remote call.
    pub fn apply_override(
        &mut self,
        test_id: &str,
        case_key: &str,
        index: &CaseIndex,
    ) -> Option<&RemoteId> {
        let Some(case) = index.by_key(case_key) else {
            debug!(test_id, case_key, "ignoring override naming an unknown case key");
            return None;
        };

        let previous = self.insert(test_id, case, MatchKind::Override);
        if previous.as_ref() != Some(&case.id) {
            debug!(
                test_id,
                case_key = %case.case_key,
                previous = ?previous.map(|id| id.to_string()),
                "mapping overridden at runtime",
            );
        }
        self.get(test_id)
    }

    fn insert(
        &mut self,
        test_id: &str,
        case: &RemoteTestCase,
        kind: MatchKind,
    ) -> Option<RemoteId> {
        self.case_keys
            .insert(case.id.clone(), case.case_key.clone());
        self.by_test
            .insert(test_id.to_owned(), (case.id.clone(), kind))
            .map(|(id, _)| id)
    }
}

/// The result of mapping every test in a run.
#[derive(Clone, Debug, Default)]
pub struct MappingReport {
    /// The mapping itself.
    pub mapping: CaseMapping,

    /// Ids of tests that weren't mapped.
    pub unmapped: Vec<String>,

    /// The number of remote cases created.
    pub created: usize,
}

/// Options controlling how tests are mapped.
#[derive(Clone, Debug)]
pub struct MapperOptions {
    /// Create remote cases for tests that match nothing.
    pub auto_create: bool,

    /// Defaults for created cases.
    pub defaults: TestCaseDefaults,
}

/// Maps tests to remote cases.
#[derive(Debug)]
pub struct CaseMapper<'a, A> {
    api: &'a A,
    project_id: RemoteId,
    options: MapperOptions,
    index: CaseIndex,
    // Titles whose creation failed; not retried within the run.
    failed_titles: HashSet<String>,
}

impl<'a, A: TestManagementApi> CaseMapper<'a, A> {
    /// Creates a new mapper over the cases already present in the project.
    pub fn new(
        api: &'a A,
        project_id: RemoteId,
        existing: impl IntoIterator<Item = RemoteTestCase>,
        options: MapperOptions,
    ) -> Self {
        Self {
            api,
            project_id,
            options,
            index: CaseIndex::new(existing),
            failed_titles: HashSet::new(),
        }
    }

    /// Maps every test.
    pub fn map_tests<'t>(&mut self, tests: impl IntoIterator<Item = &'t HostTest>) -> MappingReport {
        let mut report = MappingReport::default();
        for test in tests {
            match self.map_test(test) {
                Some((case, kind)) => {
                    if kind == MatchKind::Created {
                        report.created += 1;
                    }
                    report.mapping.insert(&test.id, &case, kind);
                }
                None => report.unmapped.push(test.id.clone()),
            }
        }

        info!(
            mapped = report.mapping.len(),
            unmapped = report.unmapped.len(),
            created = report.created,
            "mapped tests to remote cases",
        );
        report
    }

    /// Consumes the mapper, returning the index including any cases it created.
    pub fn into_index(self) -> CaseIndex {
        self.index
    }

    // ---
    // Helper methods
    // ---

    fn map_test(&mut self, test: &HostTest) -> Option<(RemoteTestCase, MatchKind)> {
        if let Some(case_key) = extract_case_key_from_tags(&test.tags) {
            match self.index.by_key(&case_key) {
                Some(case) => return Some((case.clone(), MatchKind::Tag)),
                None => debug!(
                    test_id = %test.id,
                    %case_key,
                    "tagged case key not found remotely, falling back to title",
                ),
            }
        }

        let title = build_test_title(&test.title_path);
        if title.is_empty() {
            debug!(test_id = %test.id, "test has no title, leaving unmapped");
            return None;
        }

        if let Some(case) = self
            .index
            .by_title(&title)
            .and_then(|id| self.find_by_id(id))
        {
            return Some((case, MatchKind::Title));
        }

        if !self.options.auto_create {
            debug!(test_id = %test.id, %title, "no matching remote case, leaving unmapped");
            return None;
        }

        self.create_case(&test.id, title)
            .map(|case| (case, MatchKind::Created))
    }

    fn find_by_id(&self, id: &RemoteId) -> Option<RemoteTestCase> {
        self.index
            .by_key
            .values()
            .find(|case| &case.id == id)
            .cloned()
    }

    fn create_case(&mut self, test_id: &str, title: String) -> Option<RemoteTestCase> {
        let title_key = title.to_lowercase();
        if self.failed_titles.contains(&title_key) {
            return None;
        }

        let new_case = NewTestCase {
            project_id: self.project_id.clone(),
            description: format!("Created automatically by casesync for `{title}`."),
            title,
            priority: self.options.defaults.priority.clone(),
            case_type: self.options.defaults.case_type.clone(),
        };
        match self.api.create_test_case(&new_case) {
            Ok(case) => {
                info!(
                    test_id,
                    case_key = %case.case_key,
                    title = %new_case.title,
                    "created remote test case",
                );
                // Later tests with the same title resolve to this case by title.
                self.index.insert(case.clone());
                Some(case)
            }
            Err(error) => {
                warn!(
                    test_id,
                    title = %new_case.title,
                    error = %DisplayErrorChain::new(&error),
                    "failed to create remote test case, leaving test unmapped",
                );
                self.failed_titles.insert(title_key);
                None
            }
        }
    }
}
