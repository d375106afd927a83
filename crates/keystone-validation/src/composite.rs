use crate::results::{ValidationResult, ValidationResults};
use crate::validators::Validator;
use serde_json::Value;

/// Requires every child validator to accept.
///
/// Evaluation does not short-circuit: the use case is "show every
/// violation", so a subject failing k children produces one composite
/// failure carrying exactly k nested results, independent of child order.
pub struct AndCompositeValidator {
    children: Vec<Box<dyn Validator>>,
    message: Option<String>,
    tag: Option<String>,
}

impl AndCompositeValidator {
    pub fn new(children: Vec<Box<dyn Validator>>) -> Self {
        Self {
            children,
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

impl Validator for AndCompositeValidator {
    fn name(&self) -> &'static str {
        "AndCompositeValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        let mut nested = Vec::new();
        for child in &self.children {
            let mut child_results = ValidationResults::new();
            child.validate_value(subject, key, &mut child_results);
            nested.extend(child_results);
        }

        if !nested.is_empty() {
            let message = self
                .message
                .clone()
                .unwrap_or_else(|| "one or more validation rules failed".to_string());
            let mut result = ValidationResult::new(message, self.name())
                .with_target(subject.clone())
                .with_nested(nested);
            if let Some(key) = key {
                result = result.with_key(key);
            }
            if let Some(ref tag) = self.tag {
                result = result.with_tag(tag.clone());
            }
            results.add(result);
        }
    }
}

/// Requires at least one child validator to accept.
///
/// A success reports nothing at all. A failure reports one result whose
/// nested results explain why every branch failed.
pub struct OrCompositeValidator {
    children: Vec<Box<dyn Validator>>,
    message: Option<String>,
    tag: Option<String>,
}

impl OrCompositeValidator {
    pub fn new(children: Vec<Box<dyn Validator>>) -> Self {
        Self {
            children,
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

impl Validator for OrCompositeValidator {
    fn name(&self) -> &'static str {
        "OrCompositeValidator"
    }

    fn validate_value(&self, subject: &Value, key: Option<&str>, results: &mut ValidationResults) {
        if self.children.is_empty() {
            return;
        }

        let mut nested = Vec::new();
        for child in &self.children {
            let mut child_results = ValidationResults::new();
            child.validate_value(subject, key, &mut child_results);
            if child_results.is_valid() {
                // One satisfied branch is enough; report nothing
                return;
            }
            nested.extend(child_results);
        }

        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "value did not satisfy any of the alternatives".to_string());
        let mut result = ValidationResult::new(message, self.name())
            .with_target(subject.clone())
            .with_nested(nested);
        if let Some(key) = key {
            result = result.with_key(key);
        }
        if let Some(ref tag) = self.tag {
            result = result.with_tag(tag.clone());
        }
        results.add(result);
    }
}
