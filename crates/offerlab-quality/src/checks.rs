//! Validation primitives
//!
//! Small checks shared by every stage contract, plus [`Findings`], the
//! accumulator contracts write their errors and warnings into. None of
//! these functions panic or return `Err`; problems are collected as text.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

lazy_static! {
    static ref PLACEHOLDER_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\[\s*insert\b[^\]]*\]").unwrap(),
        Regex::new(r"(?i)\[\s*(tbd|tba|placeholder|todo)\s*\]").unwrap(),
        Regex::new(r"(?i)\[\s*your\b[^\]]*\]").unwrap(),
        Regex::new(r"(?i)\bto be determined\b").unwrap(),
        Regex::new(r"(?i)\bcoming soon\b").unwrap(),
        Regex::new(r"(?i)\blorem ipsum\b").unwrap(),
        Regex::new(r"\{\{[^}]*\}\}").unwrap(),
        Regex::new(r"\.{6,}|\.{3}\s*\.{3}|…\s*…").unwrap(),
    ];

    // Values that are nothing but an ellipsis ("...", "…", ". . .")
    static ref ONLY_ELLIPSIS: Regex = Regex::new(r"^\s*(\.\s*){2,}[\s.…]*$|^\s*…[\s.…]*$").unwrap();
}

/// True for null/missing values, blank strings and empty arrays
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// True if the text carries unfilled template scaffolding
pub fn has_placeholder(text: &str) -> bool {
    ONLY_ELLIPSIS.is_match(text) || PLACEHOLDER_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Check that `value` is an array of at least `min_length` non-empty,
/// placeholder-free strings.
pub fn validate_string_array(value: Option<&Value>, field_name: &str, min_length: usize) -> Vec<String> {
    let mut findings = Findings::new();
    findings.check_string_array(value, field_name, Cardinality::at_least(min_length));
    findings.into_errors()
}

/// Allowed entry count for an array field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: usize,
    pub max: Option<usize>,
}

impl Cardinality {
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn accepts(&self, len: usize) -> bool {
        len >= self.min && self.max.map_or(true, |max| len <= max)
    }

    fn describe(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("exactly {}", max),
            Some(max) => format!("{}-{}", self.min, max),
            None => format!("at least {}", self.min),
        }
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn fmt_bound(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Errors, warnings and counters gathered while checking one output
#[derive(Debug, Default)]
pub struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    placeholder_count: usize,
    empty_field_count: usize,
    flagged: HashSet<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholder_count
    }

    pub fn empty_field_count(&self) -> usize {
        self.empty_field_count
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>, usize, usize) {
        (
            self.errors,
            self.warnings,
            self.placeholder_count,
            self.empty_field_count,
        )
    }

    fn placeholder(&mut self, path: &str) {
        if self.flagged.insert(path.to_string()) {
            self.placeholder_count += 1;
            self.error(format!("{}: contains placeholder text", path));
        }
    }

    fn missing(&mut self, path: &str) {
        self.empty_field_count += 1;
        self.error(format!("{}: required field is missing", path));
    }

    /// Text checks for a value already known to be a string
    pub fn check_text(&mut self, text: &str, path: &str) -> bool {
        if text.trim().is_empty() {
            self.empty_field_count += 1;
            self.error(format!("{}: must not be empty", path));
            false
        } else if has_placeholder(text) {
            self.placeholder(path);
            false
        } else {
            true
        }
    }

    /// Required, non-empty, placeholder-free string
    pub fn require_str<'v>(&mut self, obj: &'v Value, path: &str, field: &str) -> Option<&'v str> {
        let p = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.missing(&p);
                None
            }
            Some(Value::String(s)) => self.check_text(s, &p).then_some(s.as_str()),
            Some(other) => {
                self.error(format!("{}: expected a string, found {}", p, type_name(other)));
                None
            }
        }
    }

    /// Optional string: absence is a warning, placeholders are still errors
    pub fn optional_str(&mut self, obj: &Value, path: &str, field: &str) {
        let p = join(path, field);
        match obj.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                if has_placeholder(s) {
                    self.placeholder(&p);
                }
            }
            Some(Value::String(_)) | None | Some(Value::Null) => {
                self.empty_field_count += 1;
                self.warn(format!("{}: optional field is empty", p));
            }
            Some(other) => {
                self.warn(format!("{}: expected a string, found {}", p, type_name(other)));
            }
        }
    }

    pub fn require_object<'v>(&mut self, obj: &'v Value, path: &str, field: &str) -> Option<&'v Value> {
        let p = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.missing(&p);
                None
            }
            Some(v @ Value::Object(_)) => Some(v),
            Some(other) => {
                self.error(format!("{}: expected an object, found {}", p, type_name(other)));
                None
            }
        }
    }

    /// Required array with a cardinality contract. The items are returned even
    /// when the count is wrong so their contents can still be checked.
    pub fn require_array<'v>(
        &mut self,
        obj: &'v Value,
        path: &str,
        field: &str,
        cardinality: Cardinality,
    ) -> Option<&'v [Value]> {
        let p = join(path, field);
        self.check_array(obj.get(field), &p, cardinality)
    }

    fn check_array<'v>(
        &mut self,
        value: Option<&'v Value>,
        path: &str,
        cardinality: Cardinality,
    ) -> Option<&'v [Value]> {
        match value {
            None | Some(Value::Null) => {
                self.missing(path);
                None
            }
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    self.empty_field_count += 1;
                }
                if !cardinality.accepts(items.len()) {
                    self.error(format!(
                        "{}: expected {} entries, found {}",
                        path,
                        cardinality.describe(),
                        items.len()
                    ));
                }
                Some(items.as_slice())
            }
            Some(other) => {
                self.error(format!("{}: expected an array, found {}", path, type_name(other)));
                None
            }
        }
    }

    pub fn require_string_array(&mut self, obj: &Value, path: &str, field: &str, cardinality: Cardinality) {
        let p = join(path, field);
        self.check_string_array(obj.get(field), &p, cardinality);
    }

    /// Optional string array: missing or empty is a warning
    pub fn optional_string_array(&mut self, obj: &Value, path: &str, field: &str) {
        let p = join(path, field);
        if is_empty(obj.get(field)) {
            self.empty_field_count += 1;
            self.warn(format!("{}: optional list is empty", p));
        } else {
            self.check_string_array(obj.get(field), &p, Cardinality::at_least(0));
        }
    }

    pub(crate) fn check_string_array(&mut self, value: Option<&Value>, path: &str, cardinality: Cardinality) {
        let Some(items) = self.check_array(value, path, cardinality) else {
            return;
        };
        for (i, item) in items.iter().enumerate() {
            let p = format!("{}[{}]", path, i);
            match item {
                Value::String(s) => {
                    self.check_text(s, &p);
                }
                other => self.error(format!("{}: expected a string, found {}", p, type_name(other))),
            }
        }
    }

    /// Required number inside `[min, max]` (inclusive). Out-of-range values are
    /// reported with their path and value, never clamped.
    pub fn require_number_in(&mut self, obj: &Value, path: &str, field: &str, min: f64, max: f64) -> Option<f64> {
        let p = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.missing(&p);
                None
            }
            Some(Value::Number(n)) => {
                let value = n.as_f64()?;
                if value < min || value > max {
                    self.error(format!(
                        "{}: {} is outside the allowed range {}-{}",
                        p,
                        n,
                        fmt_bound(min),
                        fmt_bound(max)
                    ));
                    None
                } else {
                    Some(value)
                }
            }
            Some(other) => {
                self.error(format!("{}: expected a number, found {}", p, type_name(other)));
                None
            }
        }
    }

    /// Required number strictly greater than zero
    pub fn require_positive(&mut self, obj: &Value, path: &str, field: &str) -> Option<f64> {
        let p = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.missing(&p);
                None
            }
            Some(Value::Number(n)) => match n.as_f64() {
                Some(value) if value > 0.0 => Some(value),
                _ => {
                    self.error(format!("{}: {} must be greater than 0", p, n));
                    None
                }
            },
            Some(other) => {
                self.error(format!("{}: expected a number, found {}", p, type_name(other)));
                None
            }
        }
    }

    /// Required integer inside `[min, max]`
    pub fn require_integer_in(&mut self, obj: &Value, path: &str, field: &str, min: i64, max: i64) -> Option<i64> {
        let p = join(path, field);
        match obj.get(field) {
            Some(Value::Number(n)) if n.as_i64().is_none() => {
                self.error(format!("{}: {} is not a whole number", p, n));
                None
            }
            _ => self
                .require_number_in(obj, path, field, min as f64, max as f64)
                .map(|v| v as i64),
        }
    }

    /// A flag that may be left out. Absent or null reads as `false`.
    pub fn optional_bool(&mut self, obj: &Value, path: &str, field: &str) -> bool {
        match obj.get(field) {
            Some(Value::Bool(b)) => *b,
            None | Some(Value::Null) => false,
            Some(other) => {
                let p = join(path, field);
                self.error(format!("{}: expected a boolean, found {}", p, type_name(other)));
                false
            }
        }
    }

    /// Report placeholders in any string leaf not already flagged
    pub fn sweep_placeholders(&mut self, value: &Value) {
        self.sweep_at(value, String::new());
    }

    fn sweep_at(&mut self, value: &Value, path: String) {
        match value {
            Value::String(s) if has_placeholder(s) => {
                let p = if path.is_empty() { "output".to_string() } else { path };
                self.placeholder(&p);
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.sweep_at(item, format!("{}[{}]", path, i));
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    self.sweep_at(item, join(&path, key));
                }
            }
            _ => {}
        }
    }

    /// Structural check for stages without a bespoke contract: empty leaves
    /// are warnings, placeholders are errors.
    pub fn scan_leaves(&mut self, value: &Value, path: &str) {
        match value {
            Value::Null => {
                self.empty_field_count += 1;
                self.warn(format!("{}: empty value", path));
            }
            Value::String(s) if s.trim().is_empty() => {
                self.empty_field_count += 1;
                self.warn(format!("{}: empty value", path));
            }
            Value::String(s) => {
                if has_placeholder(s) {
                    self.placeholder(path);
                }
            }
            Value::Array(items) if items.is_empty() => {
                self.empty_field_count += 1;
                self.warn(format!("{}: empty list", path));
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.scan_leaves(item, &format!("{}[{}]", path, i));
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    self.scan_leaves(item, &join(path, key));
                }
            }
            Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

/// Number of string, number and bool leaves in a JSON value
pub fn count_fields(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.iter().map(count_fields).sum(),
        Value::Object(map) => map.values().map(count_fields).sum(),
        Value::Null => 0,
        _ => 1,
    }
}
