//! Field constraints and per-field error accumulation.
//!
//! Every declared field is checked on its own; the submission is valid only
//! when all of them are. Errors are kept per field so a form can be shown
//! again with each bad input flagged.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::ModeChoice;

/// Optional sign, digits, optional decimal point, optional trailing digits.
pub const DECIMAL_PATTERN: &str = r"^[+-]?\d+\.?\d*$";

static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DECIMAL_PATTERN).unwrap_or_else(|e| panic!("invalid decimal pattern: {}", e))
});

pub const REASON_REQUIRED: &str = "required";
pub const REASON_NOT_DECIMAL: &str = "not a decimal number";
pub const REASON_NO_CHOICES: &str = "no choices available";
pub const REASON_NOT_ALLOWED: &str = "not an allowed choice";

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Errors of a rejected submission, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding exactly one field.
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, reason);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Reason a field was rejected, if it was.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.reason.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.reason))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A validated field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Decimal(f64),
    Choice(i64),
    Checked(bool),
}

/// Typed values of a fully valid submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    values: HashMap<&'static str, FieldValue>,
}

impl Values {
    pub(crate) fn insert(&mut self, key: &'static str, value: FieldValue) {
        self.values.insert(key, value);
    }

    pub fn decimal(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(FieldValue::Decimal(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn choice(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(FieldValue::Choice(v)) => Some(*v),
            _ => None,
        }
    }

    /// Checkbox state; an undeclared or absent box is unchecked.
    pub fn checked(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(FieldValue::Checked(true)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Check a numeric text field.
///
/// The raw text must match [`DECIMAL_PATTERN`] as submitted and parse to a
/// finite number. Overlong digit runs parse to infinity and are rejected.
pub fn check_decimal(raw: Option<&str>) -> Result<f64, &'static str> {
    let raw = raw.unwrap_or_default();
    if !DECIMAL.is_match(raw) {
        return Err(REASON_NOT_DECIMAL);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or(REASON_NOT_DECIMAL)
}

/// Check a dropdown against the choices offered to this caller.
pub fn check_choice(raw: Option<&str>, choices: &[ModeChoice]) -> Result<i64, &'static str> {
    if choices.is_empty() {
        return Err(REASON_NO_CHOICES);
    }
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(REASON_REQUIRED);
    }
    let code = raw.parse::<i64>().map_err(|_| REASON_NOT_ALLOWED)?;
    if choices.iter().any(|c| c.code == code) {
        Ok(code)
    } else {
        Err(REASON_NOT_ALLOWED)
    }
}

/// Read a checkbox. Browsers omit unchecked boxes, so absent means false.
pub fn check_checkbox(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1" | "yes")
    )
}
