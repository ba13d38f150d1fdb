//! Include/exclude filtering of discovered extensions by id prefix.

use serde::{Deserialize, Serialize};

/// How [`ExtensionFilter::prefixes`] select extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStrategy {
    /// Only extensions whose id starts with one of the prefixes are loaded.
    Include,
    /// Every extension is loaded except those whose id starts with one of the prefixes.
    #[default]
    Exclude,
}

/// Predicate over extension ids, applied before initialization.
///
/// The default excludes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionFilter {
    #[serde(default)]
    pub strategy: FilterStrategy,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(strategy: FilterStrategy, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strategy,
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn include<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FilterStrategy::Include, prefixes)
    }

    pub fn exclude<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FilterStrategy::Exclude, prefixes)
    }

    /// Whether the extension with `id` should be loaded.
    pub fn allows(&self, id: &str) -> bool {
        let matched = self.prefixes.iter().any(|prefix| id.starts_with(prefix.as_str()));
        match self.strategy {
            FilterStrategy::Include => matched,
            FilterStrategy::Exclude => !matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allows_everything() {
        let filter = ExtensionFilter::default();
        assert!(filter.allows("acme.injector"));
        assert!(filter.allows(""));
    }

    #[test]
    fn test_include_by_prefix() {
        let filter = ExtensionFilter::include(["acme."]);
        assert!(filter.allows("acme.injector"));
        assert!(!filter.allows("other.injector"));
    }

    #[test]
    fn test_exclude_by_prefix() {
        let filter = ExtensionFilter::exclude(["acme.injector", "legacy"]);
        assert!(!filter.allows("acme.injector.v2"));
        assert!(!filter.allows("legacy"));
        assert!(filter.allows("acme.metrics"));
    }

    #[test]
    fn test_empty_include_allows_nothing() {
        let filter = ExtensionFilter::include(Vec::<String>::new());
        assert!(!filter.allows("acme.injector"));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let filter: ExtensionFilter =
            serde_yaml::from_str("strategy: include\nprefixes: [acme]\n").unwrap();
        assert_eq!(filter, ExtensionFilter::include(["acme"]));
    }
}
