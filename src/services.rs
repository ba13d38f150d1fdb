//! Service types exchanged with downstream collaborators.
//!
//! Command indexing, dispatch and reply building live outside this crate.
//! They only see these traits and plain values through the typed getters of
//! [`crate::ResolvedConfig`]; the built-in implementations below back the
//! fallback providers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Describes command classes for the indexing stage.
pub trait Descriptor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
}

/// The descriptor used when nothing else is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDescriptor;

impl Descriptor for DefaultDescriptor {
    fn name(&self) -> &str {
        "default"
    }
}

/// Execution order bucket of a middleware; earlier variants run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewarePriority {
    Permissions,
    High,
    Normal,
    Low,
}

/// Intercepts an invocation before dispatch. Returning `false` cancels it.
pub trait Middleware: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn accept(&self, invocation: &mut Value) -> bool;
}

/// Checks one argument against the constraint a validator is registered for.
pub trait Validator: Send + Sync + fmt::Debug {
    fn apply(&self, argument: &Value) -> bool;
}

/// Source and target type names handled by a [`TypeAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdapterType {
    pub source: String,
    pub target: String,
}

impl AdapterType {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Converts a raw option value into the type a command parameter expects.
pub trait TypeAdapter: Send + Sync + fmt::Debug {
    fn adapt(&self, value: &Value) -> Option<Value>;
}

/// Locates command classes; reports the roots it searches.
pub trait ClassFinder: Send + Sync + fmt::Debug {
    fn roots(&self) -> Vec<String>;
}

/// Searches the configured packages.
#[derive(Debug, Clone, Default)]
pub struct PackageClassFinder {
    packages: Vec<String>,
}

impl PackageClassFinder {
    pub fn new(packages: Vec<String>) -> Self {
        Self { packages }
    }
}

impl ClassFinder for PackageClassFinder {
    fn roots(&self) -> Vec<String> {
        self.packages.clone()
    }
}

/// Searches every inner finder in order, deduplicating roots.
#[derive(Debug, Clone)]
pub struct MergedClassFinder {
    finders: Vec<Arc<dyn ClassFinder>>,
}

impl MergedClassFinder {
    pub fn new(finders: Vec<Arc<dyn ClassFinder>>) -> Self {
        Self { finders }
    }
}

impl ClassFinder for MergedClassFinder {
    fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = Vec::new();
        for root in self.finders.iter().flat_map(|f| f.roots()) {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }
}

/// Decides whether a user holds a permission.
pub trait PermissionsProvider: Send + Sync + fmt::Debug {
    fn has_permission(&self, user: &str, permission: &str) -> bool;
}

/// Grants everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPermissionsProvider;

impl PermissionsProvider for DefaultPermissionsProvider {
    fn has_permission(&self, _user: &str, _permission: &str) -> bool {
        true
    }
}

/// Formats user-facing error replies.
pub trait ErrorMessageFactory: Send + Sync + fmt::Debug {
    fn render(&self, error: &str) -> String;

    /// Whether error replies are only visible to the invoking user.
    fn ephemeral(&self) -> bool;
}

/// Plain-text error replies following the global reply settings.
#[derive(Debug, Clone)]
pub struct DefaultErrorMessageFactory {
    reply: ReplyConfig,
}

impl DefaultErrorMessageFactory {
    pub fn new(reply: ReplyConfig) -> Self {
        Self { reply }
    }
}

impl ErrorMessageFactory for DefaultErrorMessageFactory {
    fn render(&self, error: &str) -> String {
        format!("An error occurred: {error}")
    }

    fn ephemeral(&self) -> bool {
        self.reply.ephemeral
    }
}

/// Global defaults for replies sent by interactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyConfig {
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default = "default_true")]
    pub keep_components: bool,
    #[serde(default = "default_true")]
    pub keep_selections: bool,
    #[serde(default = "default_true")]
    pub edit_reply: bool,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            ephemeral: false,
            keep_components: true,
            keep_selections: true,
            edit_reply: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// When component interactions stop being answerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStrategy {
    /// Components never expire.
    Never,
    /// Components expire after this many minutes without interaction.
    AfterInactivity { minutes: u64 },
}

impl Default for ExpirationStrategy {
    fn default() -> Self {
        ExpirationStrategy::AfterInactivity { minutes: 15 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_finder_dedups_in_order() {
        let merged = MergedClassFinder::new(vec![
            Arc::new(PackageClassFinder::new(vec!["com.foo".into(), "com.bar".into()])),
            Arc::new(PackageClassFinder::new(vec!["com.bar".into(), "com.baz".into()])),
        ]);
        assert_eq!(merged.roots(), vec!["com.foo", "com.bar", "com.baz"]);
    }

    #[test]
    fn test_reply_config_partial_yaml() {
        let reply: ReplyConfig = serde_yaml::from_str("ephemeral: true\n").unwrap();
        assert!(reply.ephemeral);
        assert!(reply.keep_components);
        assert!(reply.edit_reply);
    }

    #[test]
    fn test_default_expiration() {
        assert_eq!(
            ExpirationStrategy::default(),
            ExpirationStrategy::AfterInactivity { minutes: 15 }
        );
    }

    #[test]
    fn test_error_factory_follows_reply_config() {
        let factory = DefaultErrorMessageFactory::new(ReplyConfig {
            ephemeral: true,
            ..ReplyConfig::default()
        });
        assert!(factory.ephemeral());
        assert_eq!(factory.render("boom"), "An error occurred: boom");
    }
}
