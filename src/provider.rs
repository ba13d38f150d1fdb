//! Providers: prioritized value suppliers bound to one property.
//!
//! Providers are created during the configuration phase and never mutated
//! afterwards. The [`ProviderRegistry`] keeps them ordered by ascending
//! priority, ties broken by registration order.

use crate::error::Result;
use crate::key::{PropertyKey, Scope};
use crate::loader::{Context, Loader};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Priority of the built-in defaults (lowest band).
pub const FALLBACK_PRIORITY: i32 = 0;

/// Default priority of providers contributed by extensions.
pub const EXTENSION_PRIORITY: i32 = 100;

/// Priority of explicit user configuration (highest band).
pub const USER_PRIORITY: i32 = 1000;

/// Origin label used for built-in defaults.
pub const FALLBACK_ORIGIN: &str = "fallback";

/// Origin label used for explicit user configuration.
pub const USER_ORIGIN: &str = "user";

/// The kind of party that registered a provider.
///
/// Together with the origin label this identifies a contributor, so an
/// extension whose id happens to be `"user"` is still a different
/// contributor from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contributor {
    Fallback,
    Extension,
    User,
    /// Registered directly on a registry or through `derive`.
    Runtime,
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Contributor::Fallback => "fallback",
            Contributor::Extension => "extension",
            Contributor::User => "user",
            Contributor::Runtime => "runtime",
        };
        f.write_str(label)
    }
}

/// Function producing a property value, with access to other properties via [`Context`].
///
/// Returning `Ok(None)` means "no value"; callers decide whether that is acceptable.
pub type Supplier<T> = dyn Fn(&Context<'_>) -> Result<Option<T>> + Send + Sync;

/// A prioritized supplier of values for one property.
pub struct Provider<T> {
    key: PropertyKey<T>,
    priority: i32,
    origin: String,
    supplier: Arc<Supplier<T>>,
}

impl<T: Send + Sync + 'static> Provider<T> {
    pub fn new<F>(key: PropertyKey<T>, priority: i32, origin: impl Into<String>, supplier: F) -> Self
    where
        F: Fn(&Context<'_>) -> Result<Option<T>> + Send + Sync + 'static,
    {
        Self {
            key,
            priority,
            origin: origin.into(),
            supplier: Arc::new(supplier),
        }
    }

    /// Provider that always supplies a clone of `value`.
    pub fn constant(key: PropertyKey<T>, priority: i32, origin: impl Into<String>, value: T) -> Self
    where
        T: Clone,
    {
        Self::new(key, priority, origin, move |_| Ok(Some(value.clone())))
    }

    /// Erase the value type so providers for different properties can share a registry.
    pub fn erase(self) -> ErasedProvider
    where
        T: Clone,
    {
        let key = self.key;
        ErasedProvider {
            name: key.name(),
            scope: key.scope(),
            priority: self.priority,
            contributor: Contributor::Runtime,
            origin: Arc::from(self.origin.as_str()),
            provider: Arc::new(self),
            probe: Arc::new(move |loader: &Loader| loader.get_optional(key).map(|_| ())),
        }
    }
}

impl<T> Provider<T> {
    pub fn key(&self) -> PropertyKey<T> {
        self.key
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub(crate) fn supply(&self, ctx: &Context<'_>) -> Result<Option<T>> {
        (self.supplier)(ctx)
    }
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            priority: self.priority,
            origin: self.origin.clone(),
            supplier: Arc::clone(&self.supplier),
        }
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key.name())
            .field("priority", &self.priority)
            .field("origin", &self.origin)
            .finish()
    }
}

/// A [`Provider`] with its value type erased.
///
/// Cloning is cheap and yields the same underlying provider instance.
#[derive(Clone)]
pub struct ErasedProvider {
    name: &'static str,
    scope: Scope,
    priority: i32,
    contributor: Contributor,
    origin: Arc<str>,
    provider: Arc<dyn Any + Send + Sync>,
    probe: Arc<dyn Fn(&Loader) -> Result<()> + Send + Sync>,
}

impl ErasedProvider {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn contributor(&self) -> Contributor {
        self.contributor
    }

    /// Whether both providers come from the same contributor: same kind and
    /// same origin label.
    pub fn same_contributor(&self, other: &ErasedProvider) -> bool {
        self.contributor == other.contributor && self.origin == other.origin
    }

    pub(crate) fn downcast<T: 'static>(&self) -> Option<&Provider<T>> {
        self.provider.downcast_ref::<Provider<T>>()
    }

    /// Resolve this provider's property on `loader`, discarding the value.
    pub(crate) fn probe(&self, loader: &Loader) -> Result<()> {
        (self.probe)(loader)
    }

    /// The same provider attributed to a different contributor.
    pub(crate) fn attributed(mut self, contributor: Contributor, origin: &str) -> Self {
        self.contributor = contributor;
        self.origin = Arc::from(origin);
        self
    }

    /// Whether two erased providers wrap the very same provider instance.
    pub fn same_instance(&self, other: &ErasedProvider) -> bool {
        Arc::ptr_eq(&self.provider, &other.provider)
    }
}

impl<T: Clone + Send + Sync + 'static> From<Provider<T>> for ErasedProvider {
    fn from(provider: Provider<T>) -> Self {
        provider.erase()
    }
}

impl fmt::Debug for ErasedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedProvider")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("contributor", &self.contributor)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Identifies one registration in a [`ProviderRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderHandle {
    pub name: &'static str,
    pub priority: i32,
    pub sequence: usize,
}

/// A provider together with its registration sequence number.
#[derive(Debug, Clone)]
pub(crate) struct Registered {
    pub(crate) sequence: usize,
    pub(crate) provider: ErasedProvider,
}

/// All registered providers, grouped by property name.
///
/// Each group is kept sorted by ascending priority; equal priorities keep
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    entries: HashMap<&'static str, Vec<Registered>>,
    next_sequence: usize,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: impl Into<ErasedProvider>) -> ProviderHandle {
        let provider = provider.into();
        let handle = ProviderHandle {
            name: provider.name(),
            priority: provider.priority(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        let group = self.entries.entry(provider.name()).or_default();
        let at = group.partition_point(|r| r.provider.priority() <= handle.priority);
        group.insert(
            at,
            Registered {
                sequence: handle.sequence,
                provider,
            },
        );
        handle
    }

    pub fn extend(&mut self, providers: impl IntoIterator<Item = ErasedProvider>) {
        for provider in providers {
            self.register(provider);
        }
    }

    /// The provider registered under `handle`, if it belongs to this registry.
    pub fn get(&self, handle: ProviderHandle) -> Option<&ErasedProvider> {
        self.group(handle.name)
            .iter()
            .find(|r| r.sequence == handle.sequence)
            .map(|r| &r.provider)
    }

    /// Providers for `name`, lowest priority first.
    pub(crate) fn group(&self, name: &str) -> &[Registered] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate over every registered provider in arbitrary group order.
    pub fn iter(&self) -> impl Iterator<Item = &ErasedProvider> {
        self.entries.values().flatten().map(|r| &r.provider)
    }

    /// Names of every property with at least one provider.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Number of providers registered for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.group(name).len()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUE: PropertyKey<u32> = PropertyKey::instance("VALUE", Scope::Loadable);

    fn constant(priority: i32, origin: &str, value: u32) -> ErasedProvider {
        Provider::constant(VALUE, priority, origin, value).erase()
    }

    #[test]
    fn test_registry_orders_by_priority_then_registration() {
        let mut registry = ProviderRegistry::new();
        registry.register(constant(USER_PRIORITY, "user", 1));
        registry.register(constant(FALLBACK_PRIORITY, "fallback", 2));
        registry.register(constant(EXTENSION_PRIORITY, "ext-a", 3));
        registry.register(constant(EXTENSION_PRIORITY, "ext-b", 4));

        let origins: Vec<&str> = registry
            .group("VALUE")
            .iter()
            .map(|r| r.provider.origin())
            .collect();
        assert_eq!(origins, vec!["fallback", "ext-a", "ext-b", "user"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_handles_carry_sequence() {
        let mut registry = ProviderRegistry::new();
        let first = registry.register(constant(USER_PRIORITY, "user", 1));
        let second = registry.register(constant(USER_PRIORITY, "user", 2));
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(second.name, "VALUE");
        assert_eq!(registry.get(first).unwrap().priority(), USER_PRIORITY);
        let stale = ProviderHandle {
            sequence: 9,
            ..second
        };
        assert!(registry.get(stale).is_none());
    }

    #[test]
    fn test_erased_clone_is_same_instance() {
        let erased = constant(FALLBACK_PRIORITY, "fallback", 7);
        let copy = erased.clone();
        assert!(erased.same_instance(&copy));
        assert!(copy.downcast::<u32>().is_some());
        assert!(copy.downcast::<String>().is_none());
    }

    #[test]
    fn test_unknown_group_is_empty() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.count("NOPE"), 0);
        assert!(registry.is_empty());
    }
}
