//! Built-in rule-based validator.
//!
//! Each field carries an ordered list of rules; the first failing rule
//! reports the field's message. Every rule except [`Rule::Required`] accepts
//! an absent value (`null` or `""`), so optional-but-typed fields are
//! written as `[Rule::Integer]` and mandatory ones as
//! `[Rule::Required, Rule::Integer]`.
//!
//! Default messages are wrapped in `[[...]]` so translators pick them up.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::context::ValidationContext;
use crate::error_map::ErrorMap;
use crate::traits::{BoundValidator, Validator};
use crate::types::Value;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .unwrap_or_else(|e| panic!("email pattern is valid: {e}"))
});

type CustomRule = dyn Fn(&Value, Option<&ValidationContext>) -> Result<(), String> + Send + Sync;

/// One validation rule.
#[derive(Clone)]
pub enum Rule {
    /// Value must be present: not null, not blank text, not an empty list or map.
    Required,
    String,
    Integer,
    /// Integer, float, or a numeric string.
    Number,
    Boolean,
    Email,
    /// Text matching the pattern.
    Pattern(Regex),
    /// Numeric lower bound (inclusive).
    Min(f64),
    /// Numeric upper bound (inclusive).
    Max(f64),
    /// Length bounds, inclusive. Counts characters of text, elements of
    /// lists and entries of maps.
    Length { min: Option<usize>, max: Option<usize> },
    /// Value must equal one of the listed values.
    OneOf(Vec<Value>),
    /// An uploaded file: a map with a `name` string and an integer `size`.
    File { max_size: Option<i64> },
    /// Value must equal the value of another field of the same filter.
    SameAs(String),
    /// Arbitrary check. `Err` carries the message verbatim.
    Custom(Arc<CustomRule>),
}

impl Rule {
    /// Compiles a [`Rule::Pattern`].
    ///
    /// # Errors
    ///
    /// Returns the regex compile error.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Wraps a closure as a [`Rule::Custom`].
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, Option<&ValidationContext>) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    fn check(&self, value: &Value, data: &Value, context: Option<&ValidationContext>) -> Result<(), String> {
        if !matches!(self, Self::Required) && is_absent(value) {
            return Ok(());
        }
        let ok = match self {
            Self::Required => !is_absent(value) && !is_empty_collection(value),
            Self::String => matches!(value, Value::String(_)),
            Self::Integer => match value {
                Value::Int(_) => true,
                Value::String(s) => s.trim().parse::<i64>().is_ok(),
                _ => false,
            },
            Self::Number => as_number(value).is_some(),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Email => value.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s)),
            Self::Pattern(regex) => value.as_str().is_some_and(|s| regex.is_match(s)),
            Self::Min(min) => as_number(value).is_some_and(|n| n >= *min),
            Self::Max(max) => as_number(value).is_some_and(|n| n <= *max),
            Self::Length { min, max } => length(value).is_some_and(|len| {
                min.map_or(true, |min| len >= min) && max.map_or(true, |max| len <= max)
            }),
            Self::OneOf(allowed) => allowed.contains(value),
            Self::File { max_size } => file_size(value)
                .is_some_and(|size| max_size.map_or(true, |max| size <= max)),
            Self::SameAs(other) => data.lookup(other).is_some_and(|v| v == value),
            Self::Custom(f) => return f(value, context),
        };
        if ok {
            Ok(())
        } else {
            Err(self.default_message(value).to_string())
        }
    }

    fn default_message(&self, value: &Value) -> &'static str {
        match self {
            Self::Required => "[[This field is required]]",
            Self::String => "[[Must be text]]",
            Self::Integer => "[[Must be an integer]]",
            Self::Number => "[[Must be a number]]",
            Self::Boolean => "[[Must be true or false]]",
            Self::Email => "[[Must be a valid email address]]",
            Self::Pattern(_) => "[[Invalid format]]",
            Self::Min(_) | Self::Max(_) if as_number(value).is_none() => "[[Must be a number]]",
            Self::Min(_) => "[[Value is too small]]",
            Self::Max(_) => "[[Value is too large]]",
            Self::Length { .. } => "[[Invalid length]]",
            Self::OneOf(_) => "[[Value is not allowed]]",
            Self::File { .. } if file_size(value).is_some() => "[[File is too large]]",
            Self::File { .. } => "[[Must be an uploaded file]]",
            Self::SameAs(_) => "[[Values do not match]]",
            Self::Custom(_) => "[[Invalid value]]",
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::String => f.write_str("String"),
            Self::Integer => f.write_str("Integer"),
            Self::Number => f.write_str("Number"),
            Self::Boolean => f.write_str("Boolean"),
            Self::Email => f.write_str("Email"),
            Self::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
            Self::Min(min) => f.debug_tuple("Min").field(min).finish(),
            Self::Max(max) => f.debug_tuple("Max").field(max).finish(),
            Self::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            Self::File { max_size } => f.debug_struct("File").field("max_size", max_size).finish(),
            Self::SameAs(other) => f.debug_tuple("SameAs").field(other).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn is_empty_collection(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Map(map) => map.is_empty(),
        _ => false,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        Value::Bytes(bytes) => Some(bytes.len()),
        _ => None,
    }
}

fn file_size(value: &Value) -> Option<i64> {
    let map = value.as_map()?;
    map.get("name")?.as_str()?;
    match map.get("size")? {
        Value::Int(size) if *size >= 0 => Some(*size),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct RuleEntry {
    rule: Rule,
    message: Option<String>,
}

/// Rules for one field, in evaluation order.
#[derive(Debug, Clone)]
struct FieldRules {
    field: String,
    entries: Vec<RuleEntry>,
}

/// Validator driven by per-field [`Rule`] lists.
///
/// Rule fields are field names of the filter (dotted paths reach into
/// nested values).
///
/// # Examples
///
/// ```
/// use filterkit_core::{Rule, RuleValidator};
///
/// let rules = RuleValidator::new()
///     .rule("name", Rule::Required)
///     .rule("name", Rule::Length { min: Some(2), max: Some(50) })
///     .rule_with_message("age", Rule::Min(18.0), "[[Must be an adult]]");
/// assert_eq!(rules.fields(), ["name", "age"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleValidator {
    rules: Arc<Vec<FieldRules>>,
    context: Option<ValidationContext>,
}

impl RuleValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule reporting its default message.
    #[must_use]
    pub fn rule(self, field: impl Into<String>, rule: Rule) -> Self {
        self.push(field.into(), RuleEntry { rule, message: None })
    }

    /// Appends a rule reporting `message` instead of its default.
    #[must_use]
    pub fn rule_with_message(
        self,
        field: impl Into<String>,
        rule: Rule,
        message: impl Into<String>,
    ) -> Self {
        self.push(
            field.into(),
            RuleEntry {
                rule,
                message: Some(message.into()),
            },
        )
    }

    /// Fields that carry rules, in first-rule order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.field.as_str()).collect()
    }

    fn push(mut self, field: String, entry: RuleEntry) -> Self {
        let rules = Arc::make_mut(&mut self.rules);
        match rules.iter_mut().find(|r| r.field == field) {
            Some(existing) => existing.entries.push(entry),
            None => rules.push(FieldRules {
                field,
                entries: vec![entry],
            }),
        }
        self
    }
}

impl Validator for RuleValidator {
    fn with_data(&self, data: &Value) -> Box<dyn BoundValidator> {
        Box::new(BoundRules {
            rules: Arc::clone(&self.rules),
            context: self.context.clone(),
            data: data.clone(),
        })
    }

    fn with_context(&self, context: ValidationContext) -> Arc<dyn Validator> {
        Arc::new(Self {
            rules: Arc::clone(&self.rules),
            context: Some(context),
        })
    }

    fn context(&self) -> Option<&ValidationContext> {
        self.context.as_ref()
    }
}

/// A [`RuleValidator`] bound to one data set.
struct BoundRules {
    rules: Arc<Vec<FieldRules>>,
    context: Option<ValidationContext>,
    data: Value,
}

impl BoundValidator for BoundRules {
    fn errors(&self) -> ErrorMap {
        let mut errors = ErrorMap::new();
        for field_rules in self.rules.iter() {
            let value = self.data.lookup(&field_rules.field).unwrap_or(&Value::Null);
            let failure = field_rules.entries.iter().find_map(|entry| {
                entry
                    .rule
                    .check(value, &self.data, self.context.as_ref())
                    .err()
                    .map(|default| entry.message.clone().unwrap_or(default))
            });
            if let Some(message) = failure {
                errors.insert(field_rules.field.clone(), message.into());
            }
        }
        errors
    }
}
