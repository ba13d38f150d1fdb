//! The user-facing configuration front end.
//!
//! A [`Builder`] collects three kinds of providers:
//! 1. **Fallbacks** - built-in defaults, registered by [`Builder::new`]
//! 2. **Extensions** - contributed by loaded extension modules
//! 3. **User** - explicit settings from the fluent setters
//!
//! Fallback and user providers go into the builder's registry as they are
//! added, so [`Builder::register`] can hand back a [`ProviderHandle`].
//! [`Builder::build`] adds the extension providers, resolves every property
//! once and hands back a [`ResolvedConfig`].

use crate::error::{ConfigError, Result};
use crate::extension::{
    Extension, ExtensionFilter, ExtensionPayload, ExtensionRegistry, ExtensionSource,
    FilterStrategy,
};
use crate::key::PropertyKey;
use crate::loader::{Context, Loader};
use crate::properties::*;
use crate::provider::{
    Contributor, FALLBACK_ORIGIN, FALLBACK_PRIORITY, Provider, ProviderHandle, ProviderRegistry,
    USER_ORIGIN, USER_PRIORITY,
};
use crate::resolved::ResolvedConfig;
use crate::services::{
    AdapterType, ClassFinder, DefaultDescriptor, DefaultErrorMessageFactory,
    DefaultPermissionsProvider, Descriptor, ErrorMessageFactory, ExpirationStrategy,
    MergedClassFinder, Middleware, MiddlewarePriority, PackageClassFinder, PermissionsProvider,
    ReplyConfig, TypeAdapter, Validator,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Accumulates providers until [`Builder::build`].
#[derive(Debug)]
pub struct Builder {
    registry: ProviderRegistry,
    extensions: ExtensionRegistry,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// A builder with fallbacks for every well-known property that has a sensible default.
    pub fn new() -> Self {
        let mut builder = Self::bare();

        builder.add_fallback(PACKAGES, |_| Ok(Vec::new()));
        builder.add_fallback(DESCRIPTOR, |_| {
            Ok(Arc::new(DefaultDescriptor) as Arc<dyn Descriptor>)
        });
        builder.add_fallback(PERMISSIONS_PROVIDER, |_| {
            Ok(Arc::new(DefaultPermissionsProvider) as Arc<dyn PermissionsProvider>)
        });
        builder.add_fallback(ERROR_MESSAGE_FACTORY, |ctx| {
            let reply = ctx.get(GLOBAL_REPLY_CONFIG)?;
            Ok(Arc::new(DefaultErrorMessageFactory::new(reply)) as Arc<dyn ErrorMessageFactory>)
        });
        builder.add_fallback(GLOBAL_REPLY_CONFIG, |_| Ok(ReplyConfig::default()));
        builder.add_fallback(EXPIRATION_STRATEGY, |_| Ok(ExpirationStrategy::default()));
        builder.add_fallback(LOCALIZE_COMMANDS, |_| Ok(true));
        builder.add_fallback(SHUTDOWN_ON_FAILURE, |_| Ok(true));

        builder.add_fallback(CLASS_FINDERS, |ctx| {
            let packages = ctx.get(PACKAGES)?;
            Ok(vec![Arc::new(PackageClassFinder::new(packages)) as Arc<dyn ClassFinder>])
        });
        builder.add_fallback(MERGED_CLASS_FINDER, |ctx| {
            let finders = ctx.get(CLASS_FINDERS)?;
            Ok(Arc::new(MergedClassFinder::new(finders)) as Arc<dyn ClassFinder>)
        });

        builder
    }

    /// A builder without any fallbacks, for custom property sets.
    pub fn bare() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            extensions: ExtensionRegistry::new(),
        }
    }

    /// Register a built-in default.
    pub fn add_fallback<T, F>(&mut self, key: PropertyKey<T>, supplier: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let provider = Provider::new(key, FALLBACK_PRIORITY, FALLBACK_ORIGIN, move |ctx| {
            supplier(ctx).map(Some)
        });
        self.registry.register(
            provider
                .erase()
                .attributed(Contributor::Fallback, FALLBACK_ORIGIN),
        );
        self
    }

    /// Register a user provider at an explicit priority.
    ///
    /// The handle stays valid in the built configuration's registry.
    pub fn register<T, F>(
        &mut self,
        key: PropertyKey<T>,
        priority: i32,
        supplier: F,
    ) -> ProviderHandle
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Context<'_>) -> Result<Option<T>> + Send + Sync + 'static,
    {
        self.register_user(Provider::new(key, priority, USER_ORIGIN, supplier))
    }

    fn register_user<T>(&mut self, provider: Provider<T>) -> ProviderHandle
    where
        T: Clone + Send + Sync + 'static,
    {
        self.registry
            .register(provider.erase().attributed(Contributor::User, USER_ORIGIN))
    }

    /// Register a user provider computed from other properties.
    pub fn provide<T, F>(&mut self, key: PropertyKey<T>, supplier: F) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Context<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.register(key, USER_PRIORITY, move |ctx| supplier(ctx).map(Some));
        self
    }

    /// Set `key` to a constant value.
    pub fn set<T>(&mut self, key: PropertyKey<T>, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.register_user(Provider::constant(key, USER_PRIORITY, USER_ORIGIN, value));
        self
    }

    // -------- typed setters --------

    /// Add packages to search for commands. Repeated calls accumulate.
    pub fn packages<I, S>(&mut self, packages: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let packages: Vec<String> = packages.into_iter().map(Into::into).collect();
        self.set(PACKAGES, packages)
    }

    pub fn descriptor(&mut self, descriptor: impl Descriptor + 'static) -> &mut Self {
        self.set(DESCRIPTOR, Arc::new(descriptor) as Arc<dyn Descriptor>)
    }

    pub fn middleware(
        &mut self,
        priority: MiddlewarePriority,
        middleware: impl Middleware + 'static,
    ) -> &mut Self {
        let entry = (priority, Arc::new(middleware) as Arc<dyn Middleware>);
        self.set(MIDDLEWARES, vec![entry])
    }

    pub fn validator(
        &mut self,
        constraint: impl Into<String>,
        validator: impl Validator + 'static,
    ) -> &mut Self {
        let entry = HashMap::from([(constraint.into(), Arc::new(validator) as Arc<dyn Validator>)]);
        self.set(VALIDATORS, entry)
    }

    pub fn adapter(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        adapter: impl TypeAdapter + 'static,
    ) -> &mut Self {
        let entry = HashMap::from([(
            AdapterType::new(source, target),
            Arc::new(adapter) as Arc<dyn TypeAdapter>,
        )]);
        self.set(TYPE_ADAPTERS, entry)
    }

    /// Replace the package-based class finder.
    pub fn class_finders(&mut self, finders: Vec<Arc<dyn ClassFinder>>) -> &mut Self {
        self.set(CLASS_FINDERS, finders)
    }

    pub fn permissions_provider(&mut self, provider: impl PermissionsProvider + 'static) -> &mut Self {
        self.set(PERMISSIONS_PROVIDER, Arc::new(provider) as Arc<dyn PermissionsProvider>)
    }

    pub fn error_message_factory(&mut self, factory: impl ErrorMessageFactory + 'static) -> &mut Self {
        self.set(ERROR_MESSAGE_FACTORY, Arc::new(factory) as Arc<dyn ErrorMessageFactory>)
    }

    pub fn global_reply_config(&mut self, reply: ReplyConfig) -> &mut Self {
        self.set(GLOBAL_REPLY_CONFIG, reply)
    }

    pub fn expiration_strategy(&mut self, strategy: ExpirationStrategy) -> &mut Self {
        self.set(EXPIRATION_STRATEGY, strategy)
    }

    pub fn localize_commands(&mut self, localize: bool) -> &mut Self {
        self.set(LOCALIZE_COMMANDS, localize)
    }

    pub fn shutdown_on_failure(&mut self, shutdown: bool) -> &mut Self {
        self.set(SHUTDOWN_ON_FAILURE, shutdown)
    }

    // -------- extensions --------

    pub fn extension(&mut self, extension: impl Extension + 'static) -> &mut Self {
        self.extensions.add(extension);
        self
    }

    pub fn extension_source(&mut self, source: impl ExtensionSource + 'static) -> &mut Self {
        self.extensions.add_source(source);
        self
    }

    /// Select extensions by id prefix. Replaces any earlier filter.
    pub fn filter_extensions<I, S>(&mut self, strategy: FilterStrategy, prefixes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_extension_filter(ExtensionFilter::new(strategy, prefixes))
    }

    pub fn set_extension_filter(&mut self, filter: ExtensionFilter) -> &mut Self {
        self.extensions.set_filter(filter);
        self
    }

    /// Payload for every extension that declares type `D`.
    pub fn extension_data<D: Any + Send + Sync>(&mut self, data: D) -> &mut Self {
        self.extensions.add_payload(ExtensionPayload::new(data));
        self
    }

    /// Payload for the extension with `id` only.
    pub fn extension_data_for<D: Any + Send + Sync>(
        &mut self,
        id: impl Into<String>,
        data: D,
    ) -> &mut Self {
        self.extensions
            .add_payload_for(id, ExtensionPayload::new(data));
        self
    }

    /// Freeze every provider, resolve all properties and start extensions.
    ///
    /// Any configuration error aborts the build.
    pub fn build(self) -> Result<ResolvedConfig> {
        let Builder {
            mut registry,
            mut extensions,
        } = self;

        if let Some(provider) = registry
            .iter()
            .filter(|p| p.contributor() == Contributor::User && !p.scope().allows_user())
            .min_by_key(|p| p.name())
        {
            return Err(ConfigError::ScopeViolation {
                property: provider.name().to_string(),
                scope: provider.scope().to_string(),
                origin: USER_ORIGIN.to_string(),
            });
        }

        registry.extend(extensions.providers()?);

        let loader = Loader::new(registry);
        let resolved = loader.resolve_all()?;

        let config = ResolvedConfig::new(loader, extensions.into_loaded());
        info!(
            properties = resolved,
            providers = config.loader().registry().len(),
            extensions = config.extension_ids().len(),
            "Configuration built"
        );

        for loaded in config.extensions() {
            loaded.extension().on_start(&config);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults_resolve() {
        let config = Builder::new().build().unwrap();
        assert_eq!(config.descriptor().unwrap().name(), "default");
        assert!(config.packages().unwrap().is_empty());
        assert!(config.localize_commands().unwrap());
        assert!(config.middlewares().unwrap().is_empty());
        assert!(config.validators().unwrap().is_empty());
    }

    #[test]
    fn test_user_cannot_set_provided_property() {
        let mut builder = Builder::new();
        builder.set(
            MERGED_CLASS_FINDER,
            Arc::new(PackageClassFinder::default()) as Arc<dyn ClassFinder>,
        );
        let err = builder.build().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ScopeViolation);
    }

    #[test]
    fn test_setter_called_twice_last_wins() {
        let mut builder = Builder::new();
        builder.localize_commands(false).localize_commands(true);
        builder.shutdown_on_failure(true).shutdown_on_failure(false);
        let config = builder.build().unwrap();
        assert!(config.localize_commands().unwrap());
        assert!(!config.shutdown_on_failure().unwrap());
    }

    #[test]
    fn test_error_factory_depends_on_reply_config() {
        let mut builder = Builder::new();
        builder.global_reply_config(ReplyConfig {
            ephemeral: true,
            ..ReplyConfig::default()
        });
        let config = builder.build().unwrap();
        assert!(config.error_message_factory().unwrap().ephemeral());
    }

    #[test]
    fn test_class_finder_follows_packages() {
        let mut builder = Builder::new();
        builder.packages(["com.foo"]).packages(["com.bar"]);
        let config = builder.build().unwrap();
        assert_eq!(config.class_finder().unwrap().roots(), vec!["com.foo", "com.bar"]);
    }

    #[test]
    fn test_register_handle_survives_build() {
        let mut builder = Builder::new();
        let handle = builder.register(LOCALIZE_COMMANDS, USER_PRIORITY + 1, |_| Ok(Some(false)));
        let config = builder.build().unwrap();

        let provider = config.loader().registry().get(handle).unwrap();
        assert_eq!(provider.name(), LOCALIZE_COMMANDS.name());
        assert_eq!(provider.priority(), USER_PRIORITY + 1);
        assert_eq!(provider.contributor(), Contributor::User);
        assert!(!config.localize_commands().unwrap());
    }

    #[test]
    fn test_fallbacks_are_attributed() {
        let config = Builder::new().build().unwrap();
        assert!(
            config
                .loader()
                .registry()
                .iter()
                .all(|p| p.contributor() == Contributor::Fallback)
        );
    }

    #[test]
    fn test_bare_builder_has_nothing() {
        let config = Builder::bare().build().unwrap();
        assert_eq!(
            config.descriptor().unwrap_err().code(),
            ErrorCode::MissingProperty
        );
        assert!(config.packages().unwrap().is_empty());
    }
}
