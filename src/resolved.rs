//! The product of a successful build.

use crate::error::Result;
use crate::extension::LoadedExtension;
use crate::key::PropertyKey;
use crate::loader::Loader;
use crate::properties::*;
use crate::provider::ErasedProvider;
use crate::services::{
    AdapterType, ClassFinder, Descriptor, ErrorMessageFactory, ExpirationStrategy, Middleware,
    MiddlewarePriority, PermissionsProvider, ReplyConfig, TypeAdapter, Validator,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Resolved configuration shared with downstream stages.
///
/// Cheap to clone; every clone reads from the same cached loader.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    loader: Arc<Loader>,
    extensions: Arc<[LoadedExtension]>,
}

impl ResolvedConfig {
    pub(crate) fn new(loader: Loader, extensions: Vec<LoadedExtension>) -> Self {
        Self {
            loader: Arc::new(loader),
            extensions: extensions.into(),
        }
    }

    pub fn get<T>(&self, key: PropertyKey<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.loader.get(key)
    }

    pub fn get_optional<T>(&self, key: PropertyKey<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.loader.get_optional(key)
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn extensions(&self) -> &[LoadedExtension] {
        &self.extensions
    }

    /// Ids of the loaded extensions, in load order.
    pub fn extension_ids(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.id()).collect()
    }

    /// A configuration seeing extra runtime providers, e.g. for a sub-context.
    ///
    /// Already resolved values stay as they are.
    pub fn derive(&self, providers: impl IntoIterator<Item = ErasedProvider>) -> Self {
        Self {
            loader: Arc::new(self.loader.derive(providers)),
            extensions: Arc::clone(&self.extensions),
        }
    }

    pub fn descriptor(&self) -> Result<Arc<dyn Descriptor>> {
        self.get(DESCRIPTOR)
    }

    pub fn middlewares(&self) -> Result<Vec<(MiddlewarePriority, Arc<dyn Middleware>)>> {
        self.get(MIDDLEWARES)
    }

    pub fn validators(&self) -> Result<HashMap<String, Arc<dyn Validator>>> {
        self.get(VALIDATORS)
    }

    pub fn type_adapters(&self) -> Result<HashMap<AdapterType, Arc<dyn TypeAdapter>>> {
        self.get(TYPE_ADAPTERS)
    }

    pub fn packages(&self) -> Result<Vec<String>> {
        self.get(PACKAGES)
    }

    /// The finder searching every configured root.
    pub fn class_finder(&self) -> Result<Arc<dyn ClassFinder>> {
        self.get(MERGED_CLASS_FINDER)
    }

    pub fn class_finders(&self) -> Result<Vec<Arc<dyn ClassFinder>>> {
        self.get(CLASS_FINDERS)
    }

    pub fn permissions_provider(&self) -> Result<Arc<dyn PermissionsProvider>> {
        self.get(PERMISSIONS_PROVIDER)
    }

    pub fn error_message_factory(&self) -> Result<Arc<dyn ErrorMessageFactory>> {
        self.get(ERROR_MESSAGE_FACTORY)
    }

    pub fn global_reply_config(&self) -> Result<ReplyConfig> {
        self.get(GLOBAL_REPLY_CONFIG)
    }

    pub fn expiration_strategy(&self) -> Result<ExpirationStrategy> {
        self.get(EXPIRATION_STRATEGY)
    }

    pub fn localize_commands(&self) -> Result<bool> {
        self.get(LOCALIZE_COMMANDS)
    }

    pub fn shutdown_on_failure(&self) -> Result<bool> {
        self.get(SHUTDOWN_ON_FAILURE)
    }

    /// Serializable overview of the well-known properties.
    pub fn summary(&self) -> Result<ConfigSummary> {
        let mut middlewares = self.middlewares()?;
        middlewares.sort_by_key(|(priority, _)| *priority);

        let mut validators: Vec<String> = self.validators()?.into_keys().collect();
        validators.sort();
        let mut type_adapters: Vec<String> = self
            .type_adapters()?
            .into_keys()
            .map(|t| t.to_string())
            .collect();
        type_adapters.sort();

        let mut providers = BTreeMap::new();
        for info in well_known() {
            let contributors = self.loader.contributors(info.name);
            if !contributors.is_empty() {
                providers.insert(info.name, contributors.into_iter().map(|(origin, _)| origin).collect());
            }
        }

        Ok(ConfigSummary {
            descriptor: self.descriptor()?.name().to_string(),
            packages: self.packages()?,
            class_roots: self.class_finder()?.roots(),
            middlewares: middlewares
                .iter()
                .map(|(priority, m)| MiddlewareSummary {
                    name: m.name().to_string(),
                    priority: *priority,
                })
                .collect(),
            validators,
            type_adapters,
            reply: self.global_reply_config()?,
            expiration: self.expiration_strategy()?,
            localize_commands: self.localize_commands()?,
            shutdown_on_failure: self.shutdown_on_failure()?,
            extensions: self.extension_ids().into_iter().map(String::from).collect(),
            providers,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MiddlewareSummary {
    pub name: String,
    pub priority: MiddlewarePriority,
}

/// See [`ResolvedConfig::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub descriptor: String,
    pub packages: Vec<String>,
    pub class_roots: Vec<String>,
    pub middlewares: Vec<MiddlewareSummary>,
    pub validators: Vec<String>,
    pub type_adapters: Vec<String>,
    pub reply: ReplyConfig,
    pub expiration: ExpirationStrategy,
    pub localize_commands: bool,
    pub shutdown_on_failure: bool,
    pub extensions: Vec<String>,
    /// Origins contributing to each property, lowest priority first.
    pub providers: BTreeMap<&'static str, Vec<String>>,
}
