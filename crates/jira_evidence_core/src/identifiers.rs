use std::collections::HashSet;

use regex::Regex;

use crate::error::{EvidenceError, Result};

pub const DEFAULT_ID_PATTERN: &str = "[A-Z]+-[0-9]+";

/// A compiled issue-key pattern.
///
/// `find_*` scan free text; `matches_whole` decides whether a single
/// argument *is* an issue key.
#[derive(Debug, Clone)]
pub struct IdPattern {
    source: String,
    regex: Regex,
    whole: Regex,
}

impl IdPattern {
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(EvidenceError::validation(
                "id_pattern",
                pattern,
                "pattern cannot be empty",
            ));
        }
        let regex = Regex::new(pattern)
            .map_err(|error| EvidenceError::validation("id_pattern", pattern, error.to_string()))?;
        let whole = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|error| EvidenceError::validation("id_pattern", pattern, error.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
            whole,
        })
    }

    pub fn default_pattern() -> Result<Self> {
        Self::compile(DEFAULT_ID_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn find_all<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.regex.find_iter(text).map(|found| found.as_str())
    }

    pub fn find_first<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex.find(text).map(|found| found.as_str())
    }

    pub fn matches_whole(&self, value: &str) -> bool {
        self.whole.is_match(value)
    }

    pub fn all_match(&self, values: &[String]) -> bool {
        !values.is_empty() && values.iter().all(|value| self.matches_whole(value))
    }
}

/// Insertion-ordered, duplicate-free identifier collection.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the identifier was already present.
    pub fn insert(&mut self, identifier: &str) -> bool {
        if identifier.is_empty() || !self.seen.insert(identifier.to_string()) {
            return false;
        }
        self.ordered.push(identifier.to_string());
        true
    }

    pub fn extend_from_text(&mut self, text: &str, pattern: &IdPattern) {
        for line in text.lines() {
            for found in pattern.find_all(line) {
                self.insert(found);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
