//! Discovery, filtering, initialization and harvesting of extensions.

use super::{Extension, ExtensionFilter, ExtensionPayload, PayloadType};
use crate::error::{ConfigError, Result};
use crate::provider::{Contributor, ErasedProvider, FALLBACK_PRIORITY, USER_PRIORITY};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

type Factory = Box<dyn FnOnce() -> Box<dyn Extension> + Send>;

/// A discovered but not yet instantiated extension.
pub struct ExtensionCandidate {
    id: String,
    factory: Factory,
}

impl ExtensionCandidate {
    /// Candidate instantiated lazily, only if it passes the filter.
    pub fn new<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce() -> Box<dyn Extension> + Send + 'static,
    {
        Self {
            id: id.into(),
            factory: Box::new(factory),
        }
    }

    /// Candidate wrapping an already constructed extension.
    pub fn instance<E: Extension + 'static>(extension: E) -> Self {
        let id = extension.id().to_string();
        Self {
            id,
            factory: Box::new(move || Box::new(extension)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for ExtensionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCandidate")
            .field("id", &self.id)
            .finish()
    }
}

/// Yields extension candidates. Each source is drained once.
pub trait ExtensionSource: Send {
    fn discover(&mut self) -> Vec<ExtensionCandidate>;
}

/// An explicit, caller-supplied list of candidates.
#[derive(Debug, Default)]
pub struct StaticSource {
    candidates: Vec<ExtensionCandidate>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: ExtensionCandidate) {
        self.candidates.push(candidate);
    }

    pub fn with(mut self, candidate: ExtensionCandidate) -> Self {
        self.push(candidate);
        self
    }
}

impl ExtensionSource for StaticSource {
    fn discover(&mut self) -> Vec<ExtensionCandidate> {
        std::mem::take(&mut self.candidates)
    }
}

/// An initialized extension and the providers it contributed.
pub struct LoadedExtension {
    id: String,
    extension: Box<dyn Extension>,
    providers: Vec<ErasedProvider>,
}

impl LoadedExtension {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn extension(&self) -> &dyn Extension {
        self.extension.as_ref()
    }

    pub fn providers(&self) -> &[ErasedProvider] {
        &self.providers
    }
}

impl fmt::Debug for LoadedExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedExtension")
            .field("id", &self.id)
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Owns extension discovery for one builder.
///
/// Loading happens at most once; later calls return the cached result,
/// including the error of a failed load. Loading needs `&mut self`, so it
/// cannot run concurrently.
#[derive(Default)]
pub struct ExtensionRegistry {
    explicit: StaticSource,
    sources: Vec<Box<dyn ExtensionSource>>,
    filter: ExtensionFilter,
    typed_payloads: HashMap<TypeId, ExtensionPayload>,
    targeted_payloads: HashMap<String, ExtensionPayload>,
    loaded: Option<Result<Vec<LoadedExtension>>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension instance directly. Explicit extensions are
    /// discovered before any [`ExtensionSource`].
    pub fn add(&mut self, extension: impl Extension + 'static) {
        self.explicit.push(ExtensionCandidate::instance(extension));
    }

    pub fn add_source(&mut self, source: impl ExtensionSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn set_filter(&mut self, filter: ExtensionFilter) {
        self.filter = filter;
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// Payload for every extension declaring its type. Replaces an earlier
    /// payload of the same type.
    pub fn add_payload(&mut self, payload: ExtensionPayload) {
        self.typed_payloads.insert(payload.payload_type().id(), payload);
    }

    /// Payload for the extension with `id` only. Takes precedence over a
    /// payload supplied by type.
    pub fn add_payload_for(&mut self, id: impl Into<String>, payload: ExtensionPayload) {
        self.targeted_payloads.insert(id.into(), payload);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Discover, filter and initialize extensions on first call.
    ///
    /// Sources are drained by the first call. A failure is kept and
    /// returned by every later call.
    pub fn load(&mut self) -> Result<&[LoadedExtension]> {
        if self.loaded.is_none() {
            let outcome = self.discover_and_init();
            self.loaded = Some(outcome);
        }
        match &self.loaded {
            Some(Ok(loaded)) => Ok(loaded.as_slice()),
            Some(Err(err)) => Err(err.clone()),
            None => Ok(&[]),
        }
    }

    /// Every provider contributed by the loaded extensions, in load order.
    pub fn providers(&mut self) -> Result<Vec<ErasedProvider>> {
        Ok(self
            .load()?
            .iter()
            .flat_map(|loaded| loaded.providers.iter().cloned())
            .collect())
    }

    /// The loaded extensions, empty if loading never ran or failed.
    pub fn into_loaded(self) -> Vec<LoadedExtension> {
        match self.loaded {
            Some(Ok(loaded)) => loaded,
            _ => Vec::new(),
        }
    }

    fn discover_and_init(&mut self) -> Result<Vec<LoadedExtension>> {
        let mut candidates = self.explicit.discover();
        for source in &mut self.sources {
            candidates.extend(source.discover());
        }

        let mut seen = HashSet::new();
        let mut loaded = Vec::new();
        for candidate in candidates {
            let ExtensionCandidate { id, factory } = candidate;
            debug!(extension = %id, "Found extension");

            if !self.filter.allows(&id) {
                debug!(extension = %id, strategy = ?self.filter.strategy, "Extension filtered out");
                continue;
            }
            if !seen.insert(id.clone()) {
                return Err(ConfigError::extension_init(&id, "discovered more than once"));
            }

            let mut extension = factory();
            let payload = self.payload_for(&id, extension.payload_type())?;
            extension.init(payload)?;

            let providers = harvest(&id, extension.as_ref())?;
            debug!(extension = %id, providers = providers.len(), "Using extension");
            loaded.push(LoadedExtension {
                id,
                extension,
                providers,
            });
        }
        Ok(loaded)
    }

    fn payload_for(&self, id: &str, declared: Option<PayloadType>) -> Result<Option<&ExtensionPayload>> {
        if let Some(targeted) = self.targeted_payloads.get(id) {
            return match declared {
                None => Err(ConfigError::extension_init(
                    id,
                    format!(
                        "received a {} payload but accepts none",
                        targeted.payload_type()
                    ),
                )),
                Some(declared) if declared != targeted.payload_type() => {
                    Err(ConfigError::extension_init(
                        id,
                        format!(
                            "declares payload {} but was given {}",
                            declared,
                            targeted.payload_type()
                        ),
                    ))
                }
                Some(_) => Ok(Some(targeted)),
            };
        }

        Ok(declared.and_then(|ty| self.typed_payloads.get(&ty.id())))
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("sources", &(self.sources.len() + 1))
            .field("filter", &self.filter)
            .field("loaded", &self.loaded)
            .finish()
    }
}

/// Ask `extension` for its providers once, checking scope and priority band
/// and attributing each provider to the extension.
fn harvest(id: &str, extension: &dyn Extension) -> Result<Vec<ErasedProvider>> {
    extension
        .providers()
        .into_iter()
        .map(|provider| {
            if !provider.scope().allows_extensions() {
                return Err(ConfigError::ScopeViolation {
                    property: provider.name().to_string(),
                    scope: provider.scope().to_string(),
                    origin: format!("extension {id}"),
                });
            }
            if provider.priority() <= FALLBACK_PRIORITY || provider.priority() >= USER_PRIORITY {
                return Err(ConfigError::extension_init(
                    id,
                    format!(
                        "provider for {} uses priority {}, outside the extension band ({}, {})",
                        provider.name(),
                        provider.priority(),
                        FALLBACK_PRIORITY,
                        USER_PRIORITY
                    ),
                ));
            }
            Ok(provider.attributed(Contributor::Extension, id))
        })
        .collect()
}
