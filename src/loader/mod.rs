//! The frozen resolver: turns registered providers into property values.
//!
//! Resolution of one property:
//! - `Instance`: the provider at the top priority wins. Ties among providers
//!   sharing one origin go to the most recent registration; ties among
//!   different origins are ambiguous.
//! - `Enumeration` / `Mapping`: providers are folded lowest priority first.
//!   With `FallbackBehaviour::Override` the fallback provider is skipped as
//!   soon as anything else contributes.
//!
//! Successful results are cached per loader; failures are not.

mod stack;

pub use stack::{Context, ResolutionStack};

use crate::error::{ConfigError, Result};
use crate::key::{FallbackBehaviour, Fold, PropertyKey};
use crate::provider::{ErasedProvider, FALLBACK_PRIORITY, Provider, ProviderRegistry, Registered};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Resolves property values from a read-only provider registry.
///
/// `Loader` is `Send + Sync`: independent top-level `get()` calls may run
/// concurrently, each with its own [`ResolutionStack`].
pub struct Loader {
    registry: ProviderRegistry,
    cache: RwLock<HashMap<&'static str, CachedValue>>,
}

impl Loader {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve `key`, failing with [`ConfigError::MissingProperty`] if it has no value.
    pub fn get<T>(&self, key: PropertyKey<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_optional(key)?
            .ok_or_else(|| ConfigError::missing(key.name()))
    }

    /// Resolve `key`, returning `None` if its winning provider supplied nothing.
    ///
    /// Aggregated properties always resolve to `Some`, possibly empty.
    pub fn get_optional<T>(&self, key: PropertyKey<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let stack = ResolutionStack::new();
        self.resolve(key, &stack)
    }

    /// A child loader seeing every provider of this one plus `providers`.
    ///
    /// Values already cached here are carried over and are not re-resolved
    /// against the additional providers.
    pub fn derive(&self, providers: impl IntoIterator<Item = ErasedProvider>) -> Loader {
        let mut registry = self.registry.clone();
        registry.extend(providers);
        let cache = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Loader {
            registry,
            cache: RwLock::new(cache),
        }
    }

    /// Resolve every property that has at least one provider, in name order.
    ///
    /// Stops at the first failure. Returns the number of properties resolved.
    pub fn resolve_all(&self) -> Result<usize> {
        let mut names: Vec<&'static str> = self.registry.names().collect();
        names.sort_unstable();
        for name in &names {
            if let Some(first) = self.registry.group(name).first() {
                first.provider.probe(self)?;
            }
        }
        Ok(names.len())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// `(origin, priority)` of every provider for `name`, lowest priority first.
    pub fn contributors(&self, name: &str) -> Vec<(String, i32)> {
        self.registry
            .group(name)
            .iter()
            .map(|r| (r.provider.origin().to_string(), r.provider.priority()))
            .collect()
    }

    pub(crate) fn resolve<T>(&self, key: PropertyKey<T>, stack: &ResolutionStack) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let _frame = stack.enter(key.name())?;

        if let Some(value) = self.cached(key)? {
            return Ok(Some(value));
        }

        let group = self.registry.group(key.name());
        let (value, origins) = match key.fold() {
            None => self.resolve_instance(key, group, stack)?,
            Some(fold) => self.resolve_aggregate(key, fold, group, stack)?,
        };

        debug!(
            property = key.name(),
            providers = %origins.join(","),
            present = value.is_some(),
            "Property resolved"
        );

        if let Some(value) = &value {
            self.cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.name(), Arc::new(value.clone()));
        }
        Ok(value)
    }

    fn cached<T>(&self, key: PropertyKey<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match cache.get(key.name()) {
            None => Ok(None),
            Some(value) => value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| ConfigError::TypeMismatch {
                    property: key.name().to_string(),
                    origin: "cache".to_string(),
                }),
        }
    }

    fn resolve_instance<T>(
        &self,
        key: PropertyKey<T>,
        group: &[Registered],
        stack: &ResolutionStack,
    ) -> Result<(Option<T>, Vec<String>)>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Some(winner) = group.last() else {
            return Err(ConfigError::missing(key.name()));
        };
        let top = winner.provider.priority();
        let tied: Vec<&Registered> = group
            .iter()
            .filter(|r| r.provider.priority() == top)
            .collect();

        if tied
            .iter()
            .any(|r| !r.provider.same_contributor(&winner.provider))
        {
            return Err(ConfigError::AmbiguousProvider {
                property: key.name().to_string(),
                priority: top,
                contenders: tied
                    .iter()
                    .map(|r| {
                        format!(
                            "{} ({}, registration #{})",
                            r.provider.origin(),
                            r.provider.contributor(),
                            r.sequence
                        )
                    })
                    .collect(),
            });
        }

        let value = self.apply(key, &winner.provider, stack)?;
        Ok((value, vec![winner.provider.origin().to_string()]))
    }

    fn resolve_aggregate<T>(
        &self,
        key: PropertyKey<T>,
        fold: Fold<T>,
        group: &[Registered],
        stack: &ResolutionStack,
    ) -> Result<(Option<T>, Vec<String>)>
    where
        T: Clone + Send + Sync + 'static,
    {
        let overrides = key.shape().fallback_behaviour() == Some(FallbackBehaviour::Override);
        let mut acc = (fold.empty)();
        let mut origins = Vec::new();

        for registered in group {
            let provider = &registered.provider;
            if group.len() > 1 && overrides && provider.priority() == FALLBACK_PRIORITY {
                continue;
            }
            if let Some(contribution) = self.apply(key, provider, stack)? {
                (fold.merge)(&mut acc, contribution);
                origins.push(provider.origin().to_string());
            }
        }

        Ok((Some(acc), origins))
    }

    fn apply<T>(
        &self,
        key: PropertyKey<T>,
        erased: &ErasedProvider,
        stack: &ResolutionStack,
    ) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let provider: &Provider<T> =
            erased
                .downcast::<T>()
                .ok_or_else(|| ConfigError::TypeMismatch {
                    property: key.name().to_string(),
                    origin: erased.origin().to_string(),
                })?;
        stack.set_origin(erased.origin());
        provider.supply(&Context::new(self, stack))
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("providers", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::key::Scope;
    use crate::provider::{Contributor, EXTENSION_PRIORITY, USER_PRIORITY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NAME: PropertyKey<String> = PropertyKey::instance("NAME", Scope::Loadable);
    const TAGS: PropertyKey<Vec<String>> =
        PropertyKey::enumeration("TAGS", Scope::Loadable, FallbackBehaviour::Override);

    fn loader(providers: Vec<ErasedProvider>) -> Loader {
        let mut registry = ProviderRegistry::new();
        registry.extend(providers);
        Loader::new(registry)
    }

    #[test]
    fn test_last_user_registration_wins() {
        let loader = loader(vec![
            Provider::constant(NAME, USER_PRIORITY, "user", "first".to_string()).erase(),
            Provider::constant(NAME, USER_PRIORITY, "user", "second".to_string()).erase(),
        ]);
        assert_eq!(loader.get(NAME).unwrap(), "second");
    }

    #[test]
    fn test_tie_with_same_label_but_different_kind_is_ambiguous() {
        let loader = loader(vec![
            Provider::constant(NAME, EXTENSION_PRIORITY, "", "theirs".to_string())
                .erase()
                .attributed(Contributor::Extension, "user"),
            Provider::constant(NAME, EXTENSION_PRIORITY, "", "mine".to_string())
                .erase()
                .attributed(Contributor::User, "user"),
        ]);
        let err = loader.get(NAME).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AmbiguousProvider);
        let message = err.to_string();
        assert!(message.contains("user (extension, registration #0)"));
        assert!(message.contains("user (user, registration #1)"));
    }

    #[test]
    fn test_absent_instance_value() {
        let loader = loader(vec![
            Provider::new(NAME, USER_PRIORITY, "user", |_| Ok(None)).erase(),
        ]);
        assert_eq!(loader.get_optional(NAME).unwrap(), None);
        assert_eq!(loader.get(NAME).unwrap_err().code(), ErrorCode::MissingProperty);
    }

    #[test]
    fn test_values_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = loader(vec![
            Provider::new(NAME, EXTENSION_PRIORITY, "ext", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some("value".to_string()))
            })
            .erase(),
        ]);
        loader.get(NAME).unwrap();
        loader.get(NAME).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = loader(vec![
            Provider::new(NAME, EXTENSION_PRIORITY, "ext", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ConfigError::supplier("NAME", "ext", "boom"))
            })
            .erase(),
        ]);
        assert!(loader.get(NAME).is_err());
        assert!(loader.get(NAME).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_override_with_only_fallback_keeps_fallback() {
        let loader = loader(vec![
            Provider::constant(TAGS, FALLBACK_PRIORITY, "fallback", vec!["a".to_string()]).erase(),
        ]);
        assert_eq!(loader.get(TAGS).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_derive_adds_providers_and_keeps_cache() {
        const EXTRA: PropertyKey<u32> = PropertyKey::instance("EXTRA", Scope::Provided);
        let parent = loader(vec![
            Provider::constant(NAME, FALLBACK_PRIORITY, "fallback", "parent".to_string()).erase(),
        ]);
        assert_eq!(parent.get(NAME).unwrap(), "parent");

        let child = parent.derive(vec![
            Provider::constant(EXTRA, FALLBACK_PRIORITY, "runtime", 7u32).erase(),
            Provider::constant(NAME, USER_PRIORITY, "runtime", "child".to_string()).erase(),
        ]);
        assert_eq!(child.get(EXTRA).unwrap(), 7);
        // cached before derivation
        assert_eq!(child.get(NAME).unwrap(), "parent");
        assert_eq!(parent.get_optional(EXTRA).unwrap_err().code(), ErrorCode::MissingProperty);
    }

    #[test]
    fn test_type_mismatch_between_same_named_keys() {
        const NAME_AS_NUMBER: PropertyKey<u32> = PropertyKey::instance("NAME", Scope::Loadable);
        let loader = loader(vec![
            Provider::constant(NAME, USER_PRIORITY, "user", "text".to_string()).erase(),
        ]);
        let err = loader.get(NAME_AS_NUMBER).unwrap_err();
        assert_eq!(err.code(), ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_contributors_listing() {
        let loader = loader(vec![
            Provider::constant(NAME, USER_PRIORITY, "user", "x".to_string()).erase(),
            Provider::constant(NAME, FALLBACK_PRIORITY, "fallback", "y".to_string()).erase(),
        ]);
        assert_eq!(
            loader.contributors("NAME"),
            vec![("fallback".to_string(), 0), ("user".to_string(), 1000)]
        );
    }
}
