// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flattening of the server's folder tree of test cases.

use super::{RemoteId, RemoteTestCase};
use serde_json::{Map, Value};
use tracing::debug;

/// Fields that may hold nested nodes.
const CHILD_FIELDS: &[&str] = &["children", "tests", "testCases"];

/// Collects every test case out of a (possibly nested) listing.
///
/// The listing may be a bare array, an object wrapping it in `data`, or a tree of folders whose
/// nested nodes live under `children`, `tests` or `testCases`. Every object carrying a case key
/// (`caseKey`, or `key`) and an identifier is collected, in depth-first order.
pub fn flatten_test_cases(listing: &Value) -> Vec<RemoteTestCase> {
    let mut out = Vec::new();
    walk(listing, &mut out);
    out
}

fn walk(node: &Value, out: &mut Vec<RemoteTestCase>) {
    match node {
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(case) = test_case_from_map(map) {
                out.push(case);
            }
            if let Some(data) = map.get("data") {
                walk(data, out);
            }
            for field in CHILD_FIELDS {
                if let Some(children) = map.get(*field) {
                    walk(children, out);
                }
            }
        }
        _ => {}
    }
}

/// Reads a single test case out of a JSON object, if it carries a case key.
pub(crate) fn test_case_from_json(value: &Value) -> Option<RemoteTestCase> {
    match value {
        Value::Object(map) => test_case_from_map(map).or_else(|| {
            map.get("data")
                .and_then(Value::as_object)
                .and_then(test_case_from_map)
        }),
        _ => None,
    }
}

fn test_case_from_map(map: &Map<String, Value>) -> Option<RemoteTestCase> {
    let case_key = map
        .get("caseKey")
        .or_else(|| map.get("key"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())?;

    let id = match map.get("id") {
        Some(Value::Number(n)) => RemoteId::Int(n.as_i64()?),
        Some(Value::String(s)) => RemoteId::Str(s.clone()),
        _ => {
            debug!(case_key, "skipping test case without an identifier");
            return None;
        }
    };

    let title = map
        .get("title")
        .or_else(|| map.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Some(RemoteTestCase {
        id,
        case_key: case_key.to_owned(),
        case_number: map.get("caseNumber").and_then(Value::as_u64),
        title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn keys(cases: &[RemoteTestCase]) -> Vec<&str> {
        cases.iter().map(|case| case.case_key.as_str()).collect()
    }

    #[test]
    fn flattens_nested_folders() {
        let listing = json!({
            "data": [
                {
                    "id": 1,
                    "name": "Auth",
                    "children": [
                        {"id": 10, "caseKey": "ENG-1", "caseNumber": 1, "title": "Login works"},
                        {
                            "id": 2,
                            "name": "Sessions",
                            "testCases": [
                                {"id": 11, "caseKey": "ENG-2", "title": "Session expires"},
                            ],
                        },
                    ],
                },
                {
                    "id": 3,
                    "name": "Billing",
                    "tests": [{"id": "uuid-12", "key": "ENG-3", "name": "Invoice totals"}],
                },
            ],
        });

        let cases = flatten_test_cases(&listing);
        assert_eq!(keys(&cases), vec!["ENG-1", "ENG-2", "ENG-3"]);
        assert_eq!(
            cases[0],
            RemoteTestCase {
                id: RemoteId::Int(10),
                case_key: "ENG-1".to_owned(),
                case_number: Some(1),
                title: "Login works".to_owned(),
            }
        );
        assert_eq!(cases[2].id, RemoteId::from("uuid-12"));
        assert_eq!(cases[2].title, "Invoice totals");
    }

    #[test]
    fn flattens_bare_arrays() {
        let listing = json!([
            {"id": 1, "caseKey": "QA-1", "title": "a"},
            {"id": 2, "caseKey": "QA-2", "title": "b"},
        ]);
        assert_eq!(keys(&flatten_test_cases(&listing)), vec!["QA-1", "QA-2"]);
    }

    #[test]
    fn skips_nodes_without_key_or_id() {
        let listing = json!([
            {"id": 1, "title": "folder without a key"},
            {"caseKey": "QA-9", "title": "case without an id"},
            {"id": 2, "caseKey": "  ", "title": "blank key"},
            "not an object",
        ]);
        assert_eq!(flatten_test_cases(&listing), Vec::new());
    }

    #[test]
    fn single_case_may_be_wrapped() {
        let created = json!({"data": {"id": 5, "caseKey": "ENG-5", "title": "New"}});
        let case = test_case_from_json(&created).expect("case is read");
        assert_eq!(case.case_key, "ENG-5");
        assert_eq!(test_case_from_json(&json!({"ok": true})), None);
    }
}
