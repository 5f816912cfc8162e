// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display titles and case keys derived from host test metadata.

use itertools::Itertools;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// The separator placed between the segments of a test's title path.
pub const TITLE_SEPARATOR: &str = " › ";

/// Marker characters stripped from the front of a tag before matching it as a case key.
const TAG_MARKERS: &[char] = &['@', '#'];

static CASE_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z]+-[0-9]+$").expect("case key regex is valid"));

/// Joins a hierarchical test path (for example file, describe block, test name) into a single
/// display title.
///
/// Empty and whitespace-only segments are dropped, so a root suite with no title does not
/// produce a leading separator.
pub fn build_test_title<S: AsRef<str>>(path: &[S]) -> String {
    path.iter()
        .map(|segment| segment.as_ref().trim())
        .filter(|segment| !segment.is_empty())
        .join(TITLE_SEPARATOR)
}

/// Returns true if `candidate` looks like a case key: letters, a hyphen, then digits.
pub fn is_case_key(candidate: &str) -> bool {
    CASE_KEY_REGEX.is_match(candidate)
}

/// Extracts a remote case key from a test's tags.
///
/// A tag is eligible if, after stripping one leading marker character, it has the form
/// `LETTERS-DIGITS` (case-insensitive). The first eligible tag is returned uppercased. If a test
/// carries more than one eligible tag, a warning is logged and the first one wins.
pub fn extract_case_key_from_tags<S: AsRef<str>>(tags: &[S]) -> Option<String> {
    let mut eligible = tags.iter().filter_map(|tag| {
        let tag = tag.as_ref().trim();
        let stripped = tag.strip_prefix(TAG_MARKERS).unwrap_or(tag);
        is_case_key(stripped).then(|| stripped.to_uppercase())
    });

    let first = eligible.next()?;
    let others: Vec<_> = eligible.filter(|key| *key != first).collect();
    if !others.is_empty() {
        warn!(
            case_key = %first,
            ignored = %others.join(", "),
            "test carries more than one case key tag, using the first",
        );
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn title_joins_segments() {
        assert_eq!(
            build_test_title(&["login.spec.ts", "Login", "rejects bad password"]),
            "login.spec.ts › Login › rejects bad password"
        );
    }

    #[test]
    fn title_drops_empty_segments() {
        assert_eq!(
            build_test_title(&["", "suite.rs", "  ", "works"]),
            "suite.rs › works"
        );
        assert_eq!(build_test_title::<&str>(&[]), "");
    }

    #[test_case(&["@ENG-1"], Some("ENG-1"); "at marker")]
    #[test_case(&["#eng-42"], Some("ENG-42"); "hash marker lowercase")]
    #[test_case(&["QA-7"], Some("QA-7"); "no marker")]
    #[test_case(&["@smoke", "@ENG-3"], Some("ENG-3"); "skips ineligible tags")]
    #[test_case(&["@ENG-1", "@ENG-2"], Some("ENG-1"); "first of several wins")]
    #[test_case(&["@ENG-", "@-12", "@ENG12", "@E1-2"], None; "malformed keys")]
    #[test_case(&["@@ENG-1"], None; "only one marker is stripped")]
    #[test_case(&[], None; "no tags")]
    fn case_key_from_tags(tags: &[&str], expected: Option<&str>) {
        assert_eq!(
            extract_case_key_from_tags(tags).as_deref(),
            expected,
            "tags: {tags:?}"
        );
    }
}
