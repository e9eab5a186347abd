//! The transformation pipeline: pure functions over extracted string lists.

use regex::Regex;

use crate::error::ScrapeError;
use crate::rule::Transform;

/// Apply a transformation to a list of extracted values.
///
/// `extract` may grow the list (one value can yield several matches) and
/// `filter` may shrink it; the other variants are length-preserving.
pub fn apply(values: Vec<String>, transform: &Transform) -> Result<Vec<String>, ScrapeError> {
    match transform {
        Transform::Clean => Ok(values.iter().map(|v| collapse_whitespace(v)).collect()),
        Transform::Filter { pattern } => {
            let re = compile(pattern)?;
            Ok(values.into_iter().filter(|v| re.is_match(v)).collect())
        }
        Transform::Extract { pattern } => {
            let re = compile(pattern)?;
            Ok(values
                .iter()
                .flat_map(|v| {
                    re.find_iter(v)
                        .map(|m| m.as_str().to_string())
                        .collect::<Vec<_>>()
                })
                .collect())
        }
        Transform::Replace { find, replace } => {
            let re = compile(find)?;
            Ok(values
                .iter()
                .map(|v| re.replace_all(v, replace.as_str()).into_owned())
                .collect())
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, ScrapeError> {
    Regex::new(pattern).map_err(|e| ScrapeError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Collapse internal whitespace runs to single spaces and trim the ends.
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn clean_collapses_and_trims() {
        let out = apply(strings(&["  Hello   World ", "a\t\nb"]), &Transform::Clean).unwrap();
        assert_eq!(out, strings(&["Hello World", "a b"]));
    }

    #[test]
    fn filter_keeps_matching_values() {
        let transform = Transform::Filter {
            pattern: r"\d".into(),
        };
        let out = apply(strings(&["item 1", "no digits", "2nd"]), &transform).unwrap();
        assert_eq!(out, strings(&["item 1", "2nd"]));
    }

    #[test]
    fn filter_searches_rather_than_anchors() {
        let transform = Transform::Filter {
            pattern: "World".into(),
        };
        let out = apply(strings(&["Hello World"]), &transform).unwrap();
        assert_eq!(out, strings(&["Hello World"]));
    }

    #[test]
    fn extract_flattens_multiple_matches() {
        let transform = Transform::Extract {
            pattern: r"\d+".into(),
        };
        let out = apply(strings(&["from 10 to 20", "none", "30"]), &transform).unwrap();
        assert_eq!(out, strings(&["10", "20", "30"]));
    }

    #[test]
    fn replace_substitutes_every_occurrence() {
        let transform = Transform::Replace {
            find: r"\$".into(),
            replace: "USD ".into(),
        };
        let out = apply(strings(&["$10 and $20"]), &transform).unwrap();
        assert_eq!(out, strings(&["USD 10 and USD 20"]));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let transform = Transform::Filter {
            pattern: "[unclosed".into(),
        };
        assert!(matches!(
            apply(strings(&["x"]), &transform),
            Err(ScrapeError::Pattern { .. })
        ));
    }
}
