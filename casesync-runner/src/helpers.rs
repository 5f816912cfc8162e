// Copyright (c) The casesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Utilities for pluralizing various words based on count or plurality.
pub(crate) mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub(crate) fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "result" if `count` is 1, otherwise "results".
    pub(crate) fn results_str(count: usize) -> &'static str {
        if count == 1 { "result" } else { "results" }
    }

    /// Returns "defect" if `count` is 1, otherwise "defects".
    pub(crate) fn defects_str(count: usize) -> &'static str {
        if count == 1 { "defect" } else { "defects" }
    }

    /// Returns "log chunk" if `count` is 1, otherwise "log chunks".
    pub(crate) fn log_chunks_str(count: usize) -> &'static str {
        if count == 1 { "log chunk" } else { "log chunks" }
    }
}

/// Returns the first non-empty line of `s`, trimmed.
pub(crate) fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Finds the first item whose name matches `name`, ignoring case.
pub(crate) fn find_by_name_ignore_case<'a, T>(
    items: &'a [T],
    name: &str,
    name_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let name = name.to_lowercase();
    items
        .iter()
        .find(|item| name_of(item).to_lowercase() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", None; "empty")]
    #[test_case("   \n\t\n", None; "whitespace only")]
    #[test_case("boom", Some("boom"); "single line")]
    #[test_case("\n  assertion failed  \nat foo.rs:1", Some("assertion failed"); "leading blank line")]
    fn first_line_cases(input: &str, expected: Option<&str>) {
        assert_eq!(first_line(input), expected);
    }

    #[test]
    fn find_by_name_ignores_case() {
        let names = ["Staging", "Production"];
        assert_eq!(
            find_by_name_ignore_case(&names, "production", |s| *s),
            Some(&"Production")
        );
        assert_eq!(find_by_name_ignore_case(&names, "qa", |s| *s), None);
    }
}
