use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;

/// What to pull out of the elements matched by a rule's selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Link,
    Image,
    Table,
    List,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Link => "link",
            DataType::Image => "image",
            DataType::Table => "table",
            DataType::List => "list",
            DataType::Json => "json",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Post-extraction transformation applied to a rule's string values.
///
/// Tagged on the wire as `{"type": "filter", "pattern": "..."}` etc., so an
/// unknown transformation type is rejected when the job is deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transform {
    /// Collapse internal whitespace runs to a single space and trim.
    Clean,
    /// Keep only values matching `pattern` (regex search, not anchored).
    Filter { pattern: String },
    /// Flatten every match of `pattern` across the values.
    Extract { pattern: String },
    /// Regex-substitute `find` with `replace` in every value.
    Replace { find: String, replace: String },
}

/// A named selector + extraction type + optional transformation,
/// applied independently per URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingRule {
    pub name: String,
    pub selector: String,
    /// HTML attribute to read instead of inner text (text rules only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Transform>,
}

impl ScrapingRule {
    pub fn new(name: impl Into<String>, selector: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            selector: selector.into(),
            attribute: None,
            data_type,
            transformation: None,
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_transformation(mut self, transformation: Transform) -> Self {
        self.transformation = Some(transformation);
        self
    }

    /// Check that the selector compiles and any transformation pattern is a
    /// valid regex, so bad rules are rejected before the job ever runs.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        Selector::parse(&self.selector).map_err(|e| ScrapeError::Selector {
            selector: self.selector.clone(),
            message: e.to_string(),
        })?;

        let pattern = match &self.transformation {
            Some(Transform::Filter { pattern }) | Some(Transform::Extract { pattern }) => {
                Some(pattern)
            }
            Some(Transform::Replace { find, .. }) => Some(find),
            Some(Transform::Clean) | None => None,
        };
        if let Some(pattern) = pattern {
            Regex::new(pattern).map_err(|e| ScrapeError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// Validate a full rule set: every rule individually, plus name uniqueness
/// (rule names key the output map, so duplicates would silently shadow).
pub fn validate_rules(rules: &[ScrapingRule]) -> Result<(), ScrapeError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(ScrapeError::Validation(format!(
                "duplicate rule name '{}'",
                rule.name
            )));
        }
        rule.validate()?;
    }
    Ok(())
}
