//! Pluggable contributor modules.
//!
//! An [`Extension`] contributes providers for loadable properties. Extensions
//! are discovered through an [`ExtensionSource`], filtered by id with an
//! [`ExtensionFilter`], initialized once with an optional typed payload and
//! then asked once for their providers.

mod filter;
mod registry;

pub use filter::{ExtensionFilter, FilterStrategy};
pub use registry::{ExtensionCandidate, ExtensionRegistry, ExtensionSource, LoadedExtension, StaticSource};

use crate::error::{ConfigError, Result};
use crate::provider::ErasedProvider;
use crate::resolved::ResolvedConfig;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

/// A contributor module.
pub trait Extension: Send + Sync {
    /// Stable identity used for filtering, payload targeting and diagnostics.
    fn id(&self) -> &str;

    /// The payload type this extension accepts in [`Extension::init`], if any.
    fn payload_type(&self) -> Option<PayloadType> {
        None
    }

    /// Called exactly once, before [`Extension::providers`].
    ///
    /// `payload` is only ever of the declared [`Extension::payload_type`].
    fn init(&mut self, _payload: Option<&ExtensionPayload>) -> Result<()> {
        Ok(())
    }

    /// Providers this extension contributes.
    ///
    /// Called once per build; implementations should hand out the same
    /// provider instances if called again.
    fn providers(&self) -> Vec<ErasedProvider> {
        Vec::new()
    }

    /// Called once after the configuration has been built.
    fn on_start(&self, _config: &ResolvedConfig) {}
}

/// Runtime identity of a payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn id(&self) -> TypeId {
        self.id
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Initialization data handed to an extension.
#[derive(Clone)]
pub struct ExtensionPayload {
    ty: PayloadType,
    value: Arc<dyn Any + Send + Sync>,
}

impl ExtensionPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            ty: PayloadType::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        self.ty
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Downcast for use inside [`Extension::init`], reporting a mismatch as
    /// an initialization error of `extension`.
    pub fn require<T: Any>(&self, extension: &str) -> Result<&T> {
        self.downcast_ref::<T>().ok_or_else(|| {
            ConfigError::extension_init(
                extension,
                format!("expected payload {}, got {}", type_name::<T>(), self.ty),
            )
        })
    }
}

impl fmt::Debug for ExtensionPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPayload")
            .field("type", &self.ty.name)
            .finish()
    }
}
