//! Read requests and row predicates understood by every store backend.
//!
//! A filter is a logical OR of case-insensitive substring terms, one per
//! column. That is the only predicate shape the search engine ever
//! builds, so backends only have to translate this one form.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::Record;

/// Case-insensitive "column contains needle" test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsTerm {
    /// Column the term applies to.
    pub column: String,
    /// Substring to look for, compared case-insensitively.
    pub needle: String,
}

impl ContainsTerm {
    #[must_use]
    pub fn new(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            needle: needle.into(),
        }
    }

    /// Evaluates the term against one record.
    ///
    /// A missing column or a null value never matches.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.column)
            .and_then(crate::types::Value::search_text)
            .is_some_and(|text| contains_ignore_case(&text, &self.needle))
    }
}

/// Row predicate: true when any term matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Any(Vec<ContainsTerm>),
}

impl Predicate {
    /// Single-term predicate.
    #[must_use]
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Any(vec![ContainsTerm::new(column, needle)])
    }

    /// Terms of the predicate.
    #[must_use]
    pub fn terms(&self) -> &[ContainsTerm] {
        match self {
            Self::Any(terms) => terms,
        }
    }

    /// Evaluates the predicate against one record.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.terms().iter().any(|term| term.matches(record))
    }

    /// Checks every column name in the predicate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidIdentifier`] for the first bad name.
    pub fn validate(&self) -> Result<(), StoreError> {
        self.terms()
            .iter()
            .try_for_each(|term| validate_identifier(&term.column))
    }
}

/// A read against one table: optional predicate, optional row limit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filter: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<usize>,
}

impl ReadRequest {
    /// Every row, unfiltered.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// At most one row, used to infer a table's columns.
    #[must_use]
    pub fn sample() -> Self {
        Self {
            filter: None,
            limit: Some(1),
        }
    }

    /// Every row matching `predicate`.
    #[must_use]
    pub fn matching(predicate: Predicate) -> Self {
        Self {
            filter: Some(predicate),
            limit: None,
        }
    }

    /// Applies the request to an in-memory row sequence, keeping order.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        rows.into_iter()
            .filter(|row| self.filter.as_ref().is_none_or(|p| p.matches(row)))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Case-insensitive substring containment.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
    })
}

/// Table and column names must be plain identifiers before they reach a backend.
///
/// # Errors
///
/// Returns [`StoreError::InvalidIdentifier`] when `name` is not
/// `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}
