use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

pub mod vocab;

/// A single check applied to a parameter value before the parameter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Value must be at most this many bytes once UTF-8 encoded.
    MaxBytes(usize),
    /// Value must start with this prefix.
    Prefix(&'static str),
    NotEmpty,
}

impl Rule {
    fn check(&self, value: &str) -> bool {
        match self {
            Rule::MaxBytes(max) => value.len() <= *max,
            Rule::Prefix(prefix) => value.starts_with(prefix),
            Rule::NotEmpty => !value.is_empty(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::MaxBytes(max) => write!(f, "at most {max} bytes"),
            Rule::Prefix(prefix) => write!(f, "must start with {prefix:?}"),
            Rule::NotEmpty => write!(f, "must not be empty"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("parameter {key:?} rejected value of {len} bytes: {rule}")]
pub struct ParameterError {
    pub key: String,
    pub rule: Rule,
    pub len: usize,
}

/// A validated key/value pair of the collector's wire vocabulary.
///
/// Equality and hashing only look at `(key, value)`; the required flag is
/// descriptive and does not make two otherwise identical parameters distinct.
#[derive(Debug, Clone)]
pub struct Parameter {
    key: String,
    value: String,
    is_required: bool,
}

impl Parameter {
    /// Build a parameter, running every rule against `value` first.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        is_required: bool,
        rules: &[Rule],
    ) -> Result<Self, ParameterError> {
        let key = key.into();
        let value = value.into();
        if let Some(rule) = rules.iter().find(|rule| !rule.check(&value)) {
            return Err(ParameterError {
                key,
                rule: *rule,
                len: value.len(),
            });
        }
        Ok(Self {
            key,
            value,
            is_required,
        })
    }

    /// An optional parameter with no rules attached.
    pub fn optional(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_required: false,
        }
    }

    pub fn flag(key: impl Into<String>, value: bool) -> Self {
        Self::optional(key, if value { "1" } else { "0" })
    }

    pub fn integer(key: impl Into<String>, value: u64) -> Self {
        Self::optional(key, value.to_string())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl Eq for Parameter {}

impl Hash for Parameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.value.hash(state);
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Union two parameter lists, collapsing pairs that are identical in both key
/// and value. Order is first occurrence, `base` before `extra`.
///
/// Two parameters sharing a key but carrying different values are both kept.
/// The collector then sees the key twice and its handling of that is undefined.
pub fn combine_uniquely(base: &[Parameter], extra: &[Parameter]) -> Vec<Parameter> {
    if extra.is_empty() {
        return base.to_vec();
    }
    if base.is_empty() {
        return extra.to_vec();
    }

    let mut seen = HashSet::with_capacity(base.len() + extra.len());
    base.iter()
        .chain(extra)
        .filter(|param| seen.insert(*param))
        .cloned()
        .collect()
}
