use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One validation failure.
///
/// The target is carried by value; a result never owns or extends the
/// lifetime of the live subject it was produced from. Nested results
/// mirror the children of a failing composite validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Human-readable description of the violation
    pub message: String,

    /// Member key the failure applies to, when validating a field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Caller-supplied tag identifying the originating rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Name of the validator that produced this result
    pub validator: String,

    /// The rejected subject value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,

    /// Child failures from a composite validator
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ValidationResult>,
}

impl ValidationResult {
    pub fn new(message: impl Into<String>, validator: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            key: None,
            tag: None,
            validator: validator.into(),
            target: None,
            nested: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_nested(mut self, nested: Vec<ValidationResult>) -> Self {
        self.nested = nested;
        self
    }
}

/// Ordered collection of validation failures; valid iff empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationResults {
    results: Vec<ValidationResult>,
}

impl ValidationResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn add(&mut self, result: ValidationResult) {
        self.results.push(result);
    }

    /// Append another collection, preserving both orders.
    pub fn append(&mut self, mut other: ValidationResults) {
        self.results.append(&mut other.results);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationResult> {
        self.results.iter()
    }

    /// Flatten to the external fault representation, suitable for
    /// returning across a service boundary.
    pub fn faults(&self) -> Vec<ValidationFault> {
        self.results
            .iter()
            .map(|result| ValidationFault {
                message: result.message.clone(),
                key: result.key.clone().unwrap_or_default(),
                tag: result.tag.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Rebuild results from faults received across a service boundary.
    pub fn from_faults(faults: &[ValidationFault], target: Option<&Value>) -> Self {
        let mut results = ValidationResults::new();
        for fault in faults {
            let mut result = ValidationResult::new(&fault.message, "RemoteValidator");
            if !fault.key.is_empty() {
                result = result.with_key(&fault.key);
            }
            if !fault.tag.is_empty() {
                result = result.with_tag(&fault.tag);
            }
            if let Some(target) = target {
                result = result.with_target(target.clone());
            }
            results.add(result);
        }
        results
    }
}

impl IntoIterator for ValidationResults {
    type Item = ValidationResult;
    type IntoIter = std::vec::IntoIter<ValidationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationResults {
    type Item = &'a ValidationResult;
    type IntoIter = std::slice::Iter<'a, ValidationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

impl std::fmt::Display for ValidationResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            return writeln!(f, "there were no validation errors");
        }
        writeln!(f, "{} validation error(s) detected:", self.len())?;
        for result in &self.results {
            write_result(f, result, 1)?;
        }
        Ok(())
    }
}

fn write_result(
    f: &mut std::fmt::Formatter<'_>,
    result: &ValidationResult,
    depth: usize,
) -> std::fmt::Result {
    let indent = "  ".repeat(depth);
    write!(f, "{}- ", indent)?;
    if let Some(ref key) = result.key {
        write!(f, "[{}] ", key)?;
    }
    write!(f, "{} (detected by {}", result.message, result.validator)?;
    if let Some(ref tag) = result.tag {
        write!(f, ", tag '{}'", tag)?;
    }
    writeln!(f, ")")?;
    for nested in &result.nested {
        write_result(f, nested, depth + 1)?;
    }
    Ok(())
}

/// External representation of one failure: a `{message, key, tag}` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFault {
    pub message: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub tag: String,
}
