use keystone_core::config::FilterConfig;
use keystone_core::{CategoryFilterMode, LogEntry};

/// A global predicate gating whether an entry reaches any sink.
///
/// Filters are applied in configured order and all of them must accept;
/// the first rejection short-circuits dispatch for the entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Accepts entries whose priority lies in `min..=max`. Entries with an
    /// unset priority always pass.
    Priority { min: i32, max: i32 },
    /// Logging kill switch: accepts everything when true, nothing when
    /// false.
    Enabled(bool),
    /// Category allow/deny list.
    Category {
        categories: Vec<String>,
        mode: CategoryFilterMode,
    },
}

impl Filter {
    pub fn accepts(&self, entry: &LogEntry) -> bool {
        match self {
            Filter::Priority { min, max } => {
                entry.priority_is_unset() || (*min <= entry.priority && entry.priority <= *max)
            }
            Filter::Enabled(enabled) => *enabled,
            Filter::Category { categories, mode } => {
                let listed = entry
                    .categories
                    .iter()
                    .any(|category| categories.contains(category));
                match mode {
                    CategoryFilterMode::AllowAllExceptDenied => !listed,
                    CategoryFilterMode::DenyAllExceptAllowed => listed,
                }
            }
        }
    }
}

impl From<&FilterConfig> for Filter {
    fn from(config: &FilterConfig) -> Self {
        match config {
            FilterConfig::Priority { min, max } => Filter::Priority {
                min: *min,
                max: *max,
            },
            FilterConfig::Enabled { enabled } => Filter::Enabled(*enabled),
            FilterConfig::Category { categories, mode } => Filter::Category {
                categories: categories.clone(),
                mode: *mode,
            },
        }
    }
}

/// An immutable, ordered chain of filters.
///
/// The writer swaps whole chains atomically, so a chain never changes
/// after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn from_config(configs: &[FilterConfig]) -> Self {
        Self::new(configs.iter().map(Filter::from).collect())
    }

    /// True iff every filter in configured order accepts the entry.
    pub fn accepts(&self, entry: &LogEntry) -> bool {
        self.filters.iter().all(|filter| filter.accepts(entry))
    }

    /// False iff the chain contains a disabled kill switch.
    pub fn logging_enabled(&self) -> bool {
        !self
            .filters
            .iter()
            .any(|filter| matches!(filter, Filter::Enabled(false)))
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_filter_range() {
        let filter = Filter::Priority { min: 2, max: 99 };
        assert!(filter.accepts(&LogEntry::new("m").with_priority(2)));
        assert!(filter.accepts(&LogEntry::new("m").with_priority(50)));
        assert!(filter.accepts(&LogEntry::new("m").with_priority(99)));
        assert!(!filter.accepts(&LogEntry::new("m").with_priority(1)));
        assert!(!filter.accepts(&LogEntry::new("m").with_priority(106)));
    }

    #[test]
    fn test_priority_filter_passes_unset() {
        let filter = Filter::Priority { min: 2, max: 99 };
        assert!(filter.accepts(&LogEntry::new("m")));
    }

    #[test]
    fn test_enabled_filter() {
        assert!(Filter::Enabled(true).accepts(&LogEntry::new("m")));
        assert!(!Filter::Enabled(false).accepts(&LogEntry::new("m")));
    }

    #[test]
    fn test_category_filter_deny_mode() {
        let filter = Filter::Category {
            categories: vec!["BlockedByFilter".to_string()],
            mode: CategoryFilterMode::AllowAllExceptDenied,
        };
        assert!(filter.accepts(&LogEntry::new("m").with_categories(["General", "DiskFiles"])));
        assert!(!filter.accepts(&LogEntry::new("m").with_category("BlockedByFilter")));
        // One denied category is enough to reject
        assert!(!filter.accepts(&LogEntry::new("m").with_categories(["General", "BlockedByFilter"])));
    }

    #[test]
    fn test_category_filter_allow_mode() {
        let filter = Filter::Category {
            categories: vec!["Audit".to_string()],
            mode: CategoryFilterMode::DenyAllExceptAllowed,
        };
        assert!(filter.accepts(&LogEntry::new("m").with_category("Audit")));
        assert!(!filter.accepts(&LogEntry::new("m").with_category("General")));
    }

    #[test]
    fn test_chain_requires_all_filters() {
        let chain = FilterChain::new(vec![
            Filter::Priority { min: 2, max: 99 },
            Filter::Enabled(true),
            Filter::Category {
                categories: vec!["BlockedByFilter".to_string()],
                mode: CategoryFilterMode::AllowAllExceptDenied,
            },
        ]);

        assert!(chain.accepts(&LogEntry::new("m").with_priority(6)));
        assert!(!chain.accepts(&LogEntry::new("m").with_priority(106)));
        assert!(!chain.accepts(
            &LogEntry::new("m")
                .with_priority(6)
                .with_category("BlockedByFilter")
        ));
        assert!(chain.logging_enabled());
    }

    #[test]
    fn test_chain_kill_switch() {
        let chain = FilterChain::new(vec![Filter::Enabled(false)]);
        assert!(!chain.logging_enabled());
        assert!(!chain.accepts(&LogEntry::new("m")));
    }

    #[test]
    fn test_empty_chain_accepts_everything() {
        let chain = FilterChain::default();
        assert!(chain.is_empty());
        assert!(chain.accepts(&LogEntry::new("m").with_priority(-5)));
        assert!(chain.logging_enabled());
    }
}
