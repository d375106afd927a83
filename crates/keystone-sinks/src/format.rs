//! Template-driven text formatting for log entries, and the parser for the
//! flat-file entry layout.
//!
//! The flat-file layout is an external contract: a header rule line, one
//! `Field = value` line per field, a footer rule line, and a blank line
//! between entries. [`parse_flat_file`] recovers entries from that layout.

use chrono::{DateTime, SecondsFormat, Utc};
use keystone_core::{LogEntry, Severity};

/// Template token expander.
///
/// Recognized tokens: `{timestamp}`, `{message}`, `{category}`,
/// `{priority}`, `{eventid}`, `{severity}`, `{title}`, `{newline}`,
/// `{tab}`, `{property(KEY)}`, and `{dictionary(SUB)}` where `SUB` is
/// applied once per extended property with `{key}` and `{value}`
/// substituted. Unknown tokens are emitted literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFormat {
    template: String,
}

const BRIEF_TEMPLATE: &str = "Timestamp = {timestamp}{newline}\
Message = {message}{newline}\
Category = {category}{newline}\
Priority = {priority}{newline}\
EventId = {eventid}{newline}\
Severity = {severity}{newline}\
Title = {title}";

impl TextFormat {
    /// The standard one-field-per-line format.
    pub fn brief() -> Self {
        Self {
            template: BRIEF_TEMPLATE.to_string(),
        }
    }

    /// The brief format plus one line per extended property.
    pub fn extended() -> Self {
        Self {
            template: format!(
                "{}{}",
                BRIEF_TEMPLATE, "{newline}{dictionary({key} = {value}{newline})}"
            ),
        }
    }

    /// A caller-supplied template.
    pub fn custom(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Resolve a configured format name: "brief", "extended", or a custom
    /// template string.
    pub fn from_spec(spec: &str) -> Self {
        match spec {
            "brief" => Self::brief(),
            "extended" => Self::extended(),
            other => Self::custom(other),
        }
    }

    /// Expand the template against one entry.
    pub fn render(&self, entry: &LogEntry) -> String {
        let mut out = String::with_capacity(self.template.len() + entry.message.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match find_matching_brace(after) {
                Some(end) => {
                    expand_token(&after[..end], entry, &mut out);
                    rest = &after[end + 1..];
                }
                None => {
                    // Unbalanced brace: emit literally
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Index of the brace closing a token that opened just before `s`,
/// accounting for nested braces inside `dictionary(...)` sub-templates.
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn expand_token(token: &str, entry: &LogEntry, out: &mut String) {
    match token {
        "newline" => out.push('\n'),
        "tab" => out.push('\t'),
        "timestamp" => out.push_str(&format_timestamp(&entry.timestamp)),
        "message" => out.push_str(&entry.message),
        "category" => out.push_str(&entry.categories.join(", ")),
        "priority" => out.push_str(&entry.priority.to_string()),
        "eventid" => out.push_str(&entry.event_id.to_string()),
        "severity" => out.push_str(&entry.severity.to_string()),
        "title" => out.push_str(entry.title.as_deref().unwrap_or("")),
        _ => {
            if let Some(key) = token
                .strip_prefix("property(")
                .and_then(|t| t.strip_suffix(')'))
            {
                if let Some(value) = entry.extended.get(key) {
                    out.push_str(&value_display(value));
                }
            } else if let Some(sub) = token
                .strip_prefix("dictionary(")
                .and_then(|t| t.strip_suffix(')'))
            {
                for (key, value) in &entry.extended {
                    let line = sub
                        .replace("{key}", key)
                        .replace("{value}", &value_display(value))
                        .replace("{newline}", "\n");
                    out.push_str(&line);
                }
            } else {
                // Unknown token: keep it visible rather than dropping data
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
    }
}

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn value_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one complete flat-file block: header rule, formatted fields,
/// footer rule, blank separator.
pub fn render_block(format: &TextFormat, header: &str, footer: &str, entry: &LogEntry) -> String {
    let mut block = String::new();
    block.push_str(header);
    block.push('\n');
    let body = format.render(entry);
    block.push_str(&body);
    if !body.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(footer);
    block.push_str("\n\n");
    block
}

/// One-line human-readable rendering for console output.
pub fn pretty_line(entry: &LogEntry) -> String {
    let mut parts = Vec::new();

    parts.push(format!(
        "[{}]",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")
    ));
    parts.push(format!("[{}]", entry.severity));
    parts.push(format!("[{}]", entry.categories.join(", ")));
    if !entry.priority_is_unset() {
        parts.push(format!("[p{}]", entry.priority));
    }
    parts.push(entry.message.clone());
    if let Some(ref title) = entry.title {
        parts.push(format!("({})", title));
    }

    parts.join(" ")
}

/// Parse flat-file output produced with the brief or extended format back
/// into entries.
///
/// Lines made of four or more dashes delimit entry blocks; unknown
/// `Field = value` lines become extended string properties.
pub fn parse_flat_file(content: &str) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    let mut current: Option<LogEntry> = None;

    for line in content.lines() {
        if is_rule_line(line) || line.trim().is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            continue;
        }

        let Some((field, value)) = line.split_once(" = ") else {
            continue;
        };
        let entry = current.get_or_insert_with(|| {
            let mut e = LogEntry::new("");
            e.categories.clear();
            e
        });

        match field {
            "Timestamp" => {
                if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
                    entry.timestamp = ts.with_timezone(&Utc);
                }
            }
            "Message" => entry.message = value.to_string(),
            "Category" => {
                entry.categories = value
                    .split(", ")
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "Priority" => {
                if let Ok(priority) = value.parse() {
                    entry.priority = priority;
                }
            }
            "EventId" => {
                if let Ok(event_id) = value.parse() {
                    entry.event_id = event_id;
                }
            }
            "Severity" => {
                if let Some(severity) = Severity::parse(value) {
                    entry.severity = severity;
                }
            }
            "Title" => {
                entry.title = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            other => {
                entry
                    .extended
                    .insert(other.to_string(), serde_json::Value::from(value));
            }
        }
    }

    if let Some(entry) = current.take() {
        entries.push(entry);
    }
    entries
}

fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 4 && trimmed.chars().all(|c| c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_core::config::DEFAULT_RULE;

    fn sample_entry() -> LogEntry {
        LogEntry::new("Log entry with a category, priority, and event ID.")
            .with_categories(["General", "DiskFiles"])
            .with_priority(6)
            .with_event_id(9001)
            .with_severity(Severity::Warning)
            .with_title("Logging Block Examples")
    }

    #[test]
    fn test_brief_render_fields() {
        let text = TextFormat::brief().render(&sample_entry());
        assert!(text.contains("Message = Log entry with a category, priority, and event ID."));
        assert!(text.contains("Category = General, DiskFiles"));
        assert!(text.contains("Priority = 6"));
        assert!(text.contains("EventId = 9001"));
        assert!(text.contains("Severity = Warning"));
        assert!(text.contains("Title = Logging Block Examples"));
    }

    #[test]
    fn test_extended_render_includes_properties() {
        let entry = sample_entry().with_extended("Extra Information", "Some Special Value");
        let text = TextFormat::extended().render(&entry);
        assert!(text.contains("Extra Information = Some Special Value"));
    }

    #[test]
    fn test_property_token() {
        let entry = sample_entry().with_extended("ActivityId", "abc-123");
        let format = TextFormat::custom("activity: {property(ActivityId)}");
        assert_eq!(format.render(&entry), "activity: abc-123");
    }

    #[test]
    fn test_unknown_token_kept_literal() {
        let format = TextFormat::custom("{bogus} {message}");
        let entry = LogEntry::new("msg");
        assert_eq!(format.render(&entry), "{bogus} msg");
    }

    #[test]
    fn test_round_trip_through_flat_file_layout() {
        let entries = vec![
            sample_entry(),
            LogEntry::new("Second entry.")
                .with_category("Important")
                .with_severity(Severity::Critical),
        ];

        let mut content = String::new();
        for entry in &entries {
            content.push_str(&render_block(
                &TextFormat::brief(),
                DEFAULT_RULE,
                DEFAULT_RULE,
                entry,
            ));
        }

        let parsed = parse_flat_file(&content);
        assert_eq!(parsed.len(), 2);
        for (original, recovered) in entries.iter().zip(&parsed) {
            assert_eq!(recovered.message, original.message);
            assert_eq!(recovered.categories, original.categories);
            assert_eq!(recovered.priority, original.priority);
            assert_eq!(recovered.event_id, original.event_id);
            assert_eq!(recovered.severity, original.severity);
            assert_eq!(recovered.title, original.title);
        }
    }

    #[test]
    fn test_pretty_line() {
        let line = pretty_line(&sample_entry());
        assert!(line.contains("[Warning]"));
        assert!(line.contains("[General, DiskFiles]"));
        assert!(line.contains("[p6]"));
        assert!(line.contains("Log entry with a category"));
    }
}
