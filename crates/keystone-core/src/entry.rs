use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category assigned to entries created without an explicit one.
pub const DEFAULT_CATEGORY: &str = "General";

/// Priority value meaning "not set". Unset priorities pass priority filters.
pub const UNSET_PRIORITY: i32 = -1;

/// Severity of a log entry, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Verbose,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Verbose => write!(f, "Verbose"),
            Severity::Information => write!(f, "Information"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Parse a severity name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "verbose" => Some(Severity::Verbose),
            "information" | "info" => Some(Severity::Information),
            "warning" | "warn" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// A single log entry routed through the pipeline.
///
/// Entries are created fresh per log call and never mutated after dispatch;
/// the writer only ever borrows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp assigned at construction
    pub timestamp: DateTime<Utc>,

    /// The log message text
    pub message: String,

    /// Categories, in insertion order. Order is meaningful: sources are
    /// resolved category by category and the first match wins per source.
    pub categories: Vec<String>,

    /// Priority, or [`UNSET_PRIORITY`] when not specified
    #[serde(default = "unset_priority")]
    pub priority: i32,

    /// Application-defined event identifier
    #[serde(default = "default_event_id")]
    pub event_id: i32,

    /// Severity classification
    #[serde(default)]
    pub severity: Severity,

    /// Optional title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Extended properties, keys unique, stable iteration order
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended: BTreeMap<String, serde_json::Value>,
}

fn unset_priority() -> i32 {
    UNSET_PRIORITY
}

fn default_event_id() -> i32 {
    1
}

impl LogEntry {
    /// Create an entry with the default category, unset priority, event id 1,
    /// and Information severity.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            categories: vec![DEFAULT_CATEGORY.to_string()],
            priority: UNSET_PRIORITY,
            event_id: 1,
            severity: Severity::Information,
            title: None,
            extended: BTreeMap::new(),
        }
    }

    /// Replace the categories with a single one.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories = vec![category.into()];
        self
    }

    /// Replace the categories, preserving the given order.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the event identifier.
    pub fn with_event_id(mut self, event_id: i32) -> Self {
        self.event_id = event_id;
        self
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add an extended property. An existing value under the same key is
    /// replaced, keeping keys unique.
    pub fn with_extended(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extended.insert(key.into(), value.into());
        self
    }

    /// Whether the priority was left unset.
    pub fn priority_is_unset(&self) -> bool {
        self.priority < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let entry = LogEntry::new("hello");
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.categories, vec![DEFAULT_CATEGORY.to_string()]);
        assert_eq!(entry.priority, UNSET_PRIORITY);
        assert!(entry.priority_is_unset());
        assert_eq!(entry.event_id, 1);
        assert_eq!(entry.severity, Severity::Information);
        assert!(entry.title.is_none());
        assert!(entry.extended.is_empty());
    }

    #[test]
    fn test_entry_builders() {
        let entry = LogEntry::new("msg")
            .with_categories(["DiskFiles", "Important"])
            .with_priority(7)
            .with_event_id(9004)
            .with_severity(Severity::Critical)
            .with_title("Examples")
            .with_extended("Extra Information", "Some Special Value");

        assert_eq!(entry.categories, vec!["DiskFiles", "Important"]);
        assert_eq!(entry.priority, 7);
        assert!(!entry.priority_is_unset());
        assert_eq!(entry.event_id, 9004);
        assert_eq!(entry.severity, Severity::Critical);
        assert_eq!(entry.title.as_deref(), Some("Examples"));
        assert_eq!(
            entry.extended.get("Extra Information"),
            Some(&serde_json::Value::from("Some Special Value"))
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Verbose < Severity::Information);
        assert!(Severity::Information < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse("WARN"), Some(Severity::Warning));
        assert_eq!(Severity::parse("Information"), Some(Severity::Information));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn test_extended_keys_unique() {
        let entry = LogEntry::new("msg")
            .with_extended("key", "first")
            .with_extended("key", "second");
        assert_eq!(entry.extended.len(), 1);
        assert_eq!(
            entry.extended.get("key"),
            Some(&serde_json::Value::from("second"))
        );
    }
}
