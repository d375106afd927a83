use crate::results::{ValidationResult, ValidationResults};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while constructing a validator.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("invalid regex pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A rule that checks a subject value and records failures.
///
/// Validators are stateless with respect to subjects and reusable across
/// any number of `validate` calls. Predicates never raise: out-of-range
/// or type-mismatched input produces a structured failure result, not a
/// fault. Composite validators implement the same trait, so compositions
/// nest to arbitrary depth.
pub trait Validator: Send + Sync {
    /// Name recorded on results this validator produces.
    fn name(&self) -> &'static str;

    /// Check `subject` and add any failures to `results`, tagging them
    /// with `key` when validating a member of a larger object.
    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults);

    /// Check `subject` and collect the failures.
    fn validate(&self, subject: &Value) -> ValidationResults {
        let mut results = ValidationResults::new();
        self.validate_value(subject, None, &mut results);
        results
    }
}

/// Render a subject value for messages: strings bare, everything else as
/// JSON.
pub(crate) fn value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{token}` placeholders in a message template.
fn render_message(template: &str, replacements: &[(&str, String)]) -> String {
    let mut message = template.to_string();
    for (token, value) in replacements {
        message = message.replace(&format!("{{{}}}", token), value);
    }
    message
}

fn failure(
    validator: &'static str,
    message: String,
    key: Option<&str>,
    tag: &Option<String>,
    subject: &Value,
) -> ValidationResult {
    let mut result = ValidationResult::new(message, validator).with_target(subject.clone());
    if let Some(key) = key {
        result = result.with_key(key);
    }
    if let Some(tag) = tag {
        result = result.with_tag(tag.clone());
    }
    result
}

/// Requires a non-null value, or exactly null when negated.
///
/// The negated form composed under an OR expresses "value may be null, or
/// must satisfy the other branch".
pub struct NotNullValidator {
    negated: bool,
    message: Option<String>,
    tag: Option<String>,
}

impl NotNullValidator {
    pub fn new() -> Self {
        Self {
            negated: false,
            message: None,
            tag: None,
        }
    }

    pub fn negated() -> Self {
        Self {
            negated: true,
            ..Self::new()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Default for NotNullValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for NotNullValidator {
    fn name(&self) -> &'static str {
        "NotNullValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let ok = if self.negated {
            subject.is_null()
        } else {
            !subject.is_null()
        };
        if !ok {
            let template = self.message.as_deref().unwrap_or(if self.negated {
                "value must be null"
            } else {
                "value must not be null"
            });
            let message = render_message(template, &[("value", value_display(subject))]);
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Requires a string whose character count lies in `min..=max`.
pub struct StringLengthValidator {
    min: usize,
    max: usize,
    message: Option<String>,
    tag: Option<String>,
}

impl StringLengthValidator {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min,
            max,
            message: None,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Validator for StringLengthValidator {
    fn name(&self) -> &'static str {
        "StringLengthValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let ok = match subject {
            Value::String(s) => {
                let length = s.chars().count();
                self.min <= length && length <= self.max
            }
            _ => false,
        };
        if !ok {
            let template = self
                .message
                .as_deref()
                .unwrap_or("value '{value}' must be a string between {min} and {max} characters");
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("min", self.min.to_string()),
                    ("max", self.max.to_string()),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Requires a string matching a regular expression.
pub struct RegexValidator {
    pattern: String,
    regex: Regex,
    message: Option<String>,
    tag: Option<String>,
}

impl RegexValidator {
    pub fn new(pattern: &str) -> Result<Self, ValidatorError> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
            message: None,
            tag: None,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Validator for RegexValidator {
    fn name(&self) -> &'static str {
        "RegexValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let ok = match subject {
            Value::String(s) => self.regex.is_match(s),
            _ => false,
        };
        if !ok {
            let template = self
                .message
                .as_deref()
                .unwrap_or("value '{value}' does not match pattern '{pattern}'");
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("pattern", self.pattern.clone()),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Requires a number within optional lower and upper bounds (inclusive).
pub struct RangeValidator {
    min: Option<f64>,
    max: Option<f64>,
    message: Option<String>,
    tag: Option<String>,
}

impl RangeValidator {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            message: None,
            tag: None,
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
            message: None,
            tag: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
            message: None,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn bound_display(bound: Option<f64>) -> String {
        match bound {
            Some(value) => value.to_string(),
            None => "unbounded".to_string(),
        }
    }
}

impl Validator for RangeValidator {
    fn name(&self) -> &'static str {
        "RangeValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let ok = match subject.as_f64() {
            Some(number) => {
                self.min.map_or(true, |min| number >= min)
                    && self.max.map_or(true, |max| number <= max)
            }
            None => false,
        };
        if !ok {
            let template = self
                .message
                .as_deref()
                .unwrap_or("value '{value}' must be a number between {min} and {max}");
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("min", Self::bound_display(self.min)),
                    ("max", Self::bound_display(self.max)),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Requires membership in a fixed set of allowed values.
///
/// Membership uses value equality, so `7` and `7.0` compare as JSON
/// numbers do and strings never equal numbers.
pub struct DomainValidator {
    allowed: Vec<Value>,
    message: Option<String>,
    tag: Option<String>,
}

impl DomainValidator {
    pub fn new<I, V>(allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            message: None,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn list_display(&self) -> String {
        self.allowed
            .iter()
            .map(value_display)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Validator for DomainValidator {
    fn name(&self) -> &'static str {
        "DomainValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        if !self.allowed.contains(subject) {
            let template = self
                .message
                .as_deref()
                .unwrap_or("value '{value}' is not in the list of allowed values [{list}]");
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("list", self.list_display()),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Which of the configured characters a string must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainsCharacters {
    Any,
    All,
}

/// Requires a string containing any or all of a set of characters.
pub struct ContainsCharactersValidator {
    chars: String,
    mode: ContainsCharacters,
    message: Option<String>,
    tag: Option<String>,
}

impl ContainsCharactersValidator {
    pub fn new(chars: impl Into<String>, mode: ContainsCharacters) -> Self {
        Self {
            chars: chars.into(),
            mode,
            message: None,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Validator for ContainsCharactersValidator {
    fn name(&self) -> &'static str {
        "ContainsCharactersValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let ok = match subject {
            Value::String(s) => match self.mode {
                ContainsCharacters::Any => self.chars.chars().any(|c| s.contains(c)),
                ContainsCharacters::All => self.chars.chars().all(|c| s.contains(c)),
            },
            _ => false,
        };
        if !ok {
            let template = self
                .message
                .as_deref()
                .unwrap_or("value '{value}' must contain {mode} of the characters '{chars}'");
            let mode = match self.mode {
                ContainsCharacters::Any => "any",
                ContainsCharacters::All => "all",
            };
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("mode", mode.to_string()),
                    ("chars", self.chars.clone()),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

/// Requires an RFC 3339 date-time within a window relative to now.
pub struct RelativeDateTimeValidator {
    low_days: i64,
    high_days: i64,
    message: Option<String>,
    tag: Option<String>,
}

impl RelativeDateTimeValidator {
    /// Accept dates from `low_days` to `high_days` days from now.
    pub fn days_from_now(low_days: i64, high_days: i64) -> Self {
        Self {
            low_days,
            high_days,
            message: None,
            tag: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Validator for RelativeDateTimeValidator {
    fn name(&self) -> &'static str {
        "RelativeDateTimeValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let now = Utc::now();
        let low = now + Duration::days(self.low_days);
        let high = now + Duration::days(self.high_days);

        let ok = match subject {
            Value::String(s) => match DateTime::parse_from_rfc3339(s) {
                Ok(date) => {
                    let date = date.with_timezone(&Utc);
                    low <= date && date <= high
                }
                Err(_) => false,
            },
            _ => false,
        };
        if !ok {
            let template = self.message.as_deref().unwrap_or(
                "date '{value}' must lie between {min} and {max} days from now",
            );
            let message = render_message(
                template,
                &[
                    ("value", value_display(subject)),
                    ("min", self.low_days.to_string()),
                    ("max", self.high_days.to_string()),
                ],
            );
            results.add(failure(self.name(), message, key, &self.tag, subject));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_null() {
        let validator = NotNullValidator::new();
        assert!(validator.validate(&json!("something")).is_valid());
        assert!(!validator.validate(&Value::Null).is_valid());
    }

    #[test]
    fn test_not_null_negated_accepts_null() {
        let validator = NotNullValidator::negated();
        assert!(validator.validate(&Value::Null).is_valid());
        assert!(!validator.validate(&json!("something")).is_valid());
    }

    #[test]
    fn test_string_length_bounds() {
        let validator = StringLengthValidator::new(3, 5);
        assert!(validator.validate(&json!("abc")).is_valid());
        assert!(validator.validate(&json!("abcde")).is_valid());
        assert!(!validator.validate(&json!("ab")).is_valid());
        assert!(!validator.validate(&json!("abcdef")).is_valid());
    }

    #[test]
    fn test_string_length_rejects_non_string() {
        let validator = StringLengthValidator::new(0, 100);
        let results = validator.validate(&json!(42));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_regex() {
        let validator = RegexValidator::new("^[A-Z]{2}[0-9]{4}$").unwrap();
        assert!(validator.validate(&json!("AA1234")).is_valid());

        let results = validator.validate(&json!("42"));
        assert_eq!(results.len(), 1);
        let first = results.iter().next().unwrap();
        assert!(first.message.contains("42"));
        assert_eq!(first.validator, "RegexValidator");
    }

    #[test]
    fn test_regex_bad_pattern_fails_construction() {
        assert!(RegexValidator::new("(unclosed").is_err());
    }

    #[test]
    fn test_range() {
        let validator = RangeValidator::new(0.0, 100.0);
        assert!(validator.validate(&json!(0)).is_valid());
        assert!(validator.validate(&json!(100)).is_valid());
        assert!(!validator.validate(&json!(-3)).is_valid());
        assert!(!validator.validate(&json!(9000)).is_valid());
        assert!(!validator.validate(&json!("not a number")).is_valid());
    }

    #[test]
    fn test_range_open_bounds() {
        assert!(RangeValidator::at_least(0.0)
            .validate(&json!(1_000_000))
            .is_valid());
        assert!(!RangeValidator::at_least(0.0).validate(&json!(-1)).is_valid());
        assert!(RangeValidator::at_most(10.0).validate(&json!(-50)).is_valid());
    }

    #[test]
    fn test_domain_rejection_names_value_and_list() {
        let validator = DomainValidator::new([1, 3, 7, 11, 13]);
        assert!(validator.validate(&json!(7)).is_valid());

        let results = validator.validate(&json!(42));
        assert_eq!(results.len(), 1);
        let first = results.iter().next().unwrap();
        assert!(first.message.contains("42"));
        assert!(first.message.contains("1, 3, 7, 11, 13"));
    }

    #[test]
    fn test_domain_uses_value_equality() {
        let validator = DomainValidator::new(["red", "green"]);
        assert!(validator.validate(&json!("green")).is_valid());
        assert!(!validator.validate(&json!("blue")).is_valid());
        // A number is never equal to a string
        assert!(!DomainValidator::new([1, 2]).validate(&json!("1")).is_valid());
    }

    #[test]
    fn test_contains_characters() {
        let all = ContainsCharactersValidator::new("cat", ContainsCharacters::All);
        assert!(all.validate(&json!("concatenate")).is_valid());
        assert!(!all.validate(&json!("disconnected")).is_valid());

        let any = ContainsCharactersValidator::new("cat", ContainsCharacters::Any);
        assert!(any.validate(&json!("disconnected")).is_valid());
        assert!(!any.validate(&json!("flower")).is_valid());
    }

    #[test]
    fn test_relative_date_time_window() {
        let validator = RelativeDateTimeValidator::days_from_now(0, 180);
        let in_window = (Utc::now() + Duration::days(60)).to_rfc3339();
        let too_far = (Utc::now() + Duration::days(270)).to_rfc3339();
        let past = (Utc::now() - Duration::days(1)).to_rfc3339();

        assert!(validator.validate(&json!(in_window)).is_valid());
        assert!(!validator.validate(&json!(too_far)).is_valid());
        assert!(!validator.validate(&json!(past)).is_valid());
        assert!(!validator.validate(&json!("not a date")).is_valid());
    }

    #[test]
    fn test_custom_message_and_tag() {
        let validator = DomainValidator::new([1, 3])
            .with_message("pick one of [{list}], not '{value}'")
            .with_tag("choices");
        let results = validator.validate(&json!(9));
        let first = results.iter().next().unwrap();
        assert_eq!(first.message, "pick one of [1, 3], not '9'");
        assert_eq!(first.tag.as_deref(), Some("choices"));
    }

    #[test]
    fn test_validators_never_panic_on_odd_input() {
        let subjects = [
            Value::Null,
            json!(true),
            json!([1, 2, 3]),
            json!({"nested": "object"}),
        ];
        let validators: Vec<Box<dyn Validator>> = vec![
            Box::new(NotNullValidator::new()),
            Box::new(StringLengthValidator::new(1, 5)),
            Box::new(RegexValidator::new("x").unwrap()),
            Box::new(RangeValidator::new(0.0, 1.0)),
            Box::new(DomainValidator::new([1])),
            Box::new(ContainsCharactersValidator::new("a", ContainsCharacters::Any)),
            Box::new(RelativeDateTimeValidator::days_from_now(0, 1)),
        ];
        for subject in &subjects {
            for validator in &validators {
                // Every combination must yield results, never a fault
                let _ = validator.validate(subject);
            }
        }
    }
}
