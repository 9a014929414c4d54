//! Simple element types and value validation
#![allow(clippy::must_use_candidate)] // Constructor helpers are clear at call sites without #[must_use].
#![allow(clippy::return_self_not_must_use)] // Fluent builders return Self for chaining.

use crate::model::VersionRange;
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Base data type of a simple element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Base {
    /// Free text
    String,
    /// Coded value, optionally restricted to a code list
    Identifier,
    /// Integer with implied decimal places
    Numeric,
    /// Explicit decimal number
    Decimal,
    /// `CCYYMMDD` or `YYMMDD`
    Date,
    /// `HHMM`, `HHMMSS` or `HHMMSSd..`
    Time,
    /// Opaque bytes whose length is given by the preceding element
    Binary,
}

/// Classified failure of a value against its simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueError {
    TooShort,
    TooLong,
    InvalidCharacterData,
    InvalidCodeValue,
    InvalidDate,
    InvalidTime,
}

/// Definition of a simple data element
#[derive(Debug, Clone)]
pub struct SimpleType {
    pub id: String,
    /// Element reference number
    pub code: String,
    pub base: Base,
    pub min_length: usize,
    pub max_length: usize,
    /// Allowed codes (identifiers only, empty = unrestricted)
    pub values: BTreeSet<String>,
    pub pattern: Option<Regex>,
    /// Facet overrides for version ranges, first match wins
    pub versions: Vec<ElementVersion>,
    pub title: Option<String>,
}

/// Length and code list facets that apply within a version range
#[derive(Debug, Clone, Default)]
pub struct ElementVersion {
    pub range: VersionRange,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub values: Option<BTreeSet<String>>,
}

struct Facets<'a> {
    min_length: usize,
    max_length: usize,
    values: &'a BTreeSet<String>,
}

impl SimpleType {
    pub fn new(id: impl Into<String>, code: impl Into<String>, base: Base) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            base,
            min_length: 1,
            max_length: usize::MAX,
            values: BTreeSet::new(),
            pattern: None,
            versions: Vec::new(),
            title: None,
        }
    }

    pub fn with_length(mut self, min_length: usize, max_length: usize) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_version(mut self, version: ElementVersion) -> Self {
        self.versions.push(version);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Whether the valid format of a value depends on the transaction version
    pub fn has_versions(&self) -> bool {
        !self.versions.is_empty()
    }

    fn facets(&self, version: &str) -> Facets<'_> {
        let mut facets = Facets {
            min_length: self.min_length,
            max_length: self.max_length,
            values: &self.values,
        };

        if let Some(v) = self.versions.iter().find(|v| v.range.applies_to(version)) {
            facets.min_length = v.min_length.unwrap_or(facets.min_length);
            facets.max_length = v.max_length.unwrap_or(facets.max_length);
            if let Some(values) = &v.values {
                facets.values = values;
            }
        }

        facets
    }

    /// Validate a received (non-empty) value
    pub fn validate(&self, version: &str, decimal_mark: char, value: &str) -> Vec<ValueError> {
        let facets = self.facets(version);
        let mut errors = Vec::new();

        match self.base {
            Base::Numeric => match numeric_length(value) {
                Some(len) => check_length(len, &facets, &mut errors),
                None => errors.push(ValueError::InvalidCharacterData),
            },
            Base::Decimal => match decimal_length(value, decimal_mark) {
                Some(len) => check_length(len, &facets, &mut errors),
                None => errors.push(ValueError::InvalidCharacterData),
            },
            Base::Date => {
                check_length(value.len(), &facets, &mut errors);
                if !is_valid_date(value) {
                    errors.push(ValueError::InvalidDate);
                }
            }
            Base::Time => {
                check_length(value.len(), &facets, &mut errors);
                if !is_valid_time(value) {
                    errors.push(ValueError::InvalidTime);
                }
            }
            Base::String | Base::Identifier => {
                check_length(value.chars().count(), &facets, &mut errors);
                if self.base == Base::Identifier
                    && !facets.values.is_empty()
                    && !facets.values.contains(value)
                {
                    errors.push(ValueError::InvalidCodeValue);
                }
            }
            Base::Binary => {}
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) && !errors.contains(&ValueError::InvalidCharacterData) {
                errors.push(ValueError::InvalidCharacterData);
            }
        }

        errors
    }
}

fn check_length(len: usize, facets: &Facets<'_>, errors: &mut Vec<ValueError>) {
    if len < facets.min_length {
        errors.push(ValueError::TooShort);
    } else if len > facets.max_length {
        errors.push(ValueError::TooLong);
    }
}

/// Digit count of an optionally negative integer
fn numeric_length(value: &str) -> Option<usize> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(digits.len())
}

/// Digit count of an optionally negative decimal; the sign and decimal mark
/// do not count towards the length
fn decimal_length(value: &str, decimal_mark: char) -> Option<usize> {
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (whole, fraction) = match unsigned.split_once(decimal_mark) {
        Some((whole, fraction)) => (whole, fraction),
        None => (unsigned, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.len() + fraction.len() == 0 || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    Some(whole.len() + fraction.len())
}

fn is_valid_date(value: &str) -> bool {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match value.len() {
        8 => NaiveDate::parse_from_str(value, "%Y%m%d").is_ok(),
        6 => NaiveDate::parse_from_str(value, "%y%m%d").is_ok(),
        _ => false,
    }
}

fn is_valid_time(value: &str) -> bool {
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match value.len() {
        4 => NaiveTime::parse_from_str(value, "%H%M").is_ok(),
        len if len >= 6 => NaiveTime::parse_from_str(&value[..6], "%H%M%S").is_ok(),
        _ => false,
    }
}
