//! Layered configuration and extension resolution.
//!
//! Properties are identified by typed [`PropertyKey`]s. Values come from
//! prioritized [`Provider`]s registered by built-in fallbacks, by
//! [`Extension`]s, and by the user through the [`Builder`]. A [`Loader`]
//! picks or aggregates contributions and detects dependency cycles.
//!
//! ```
//! use propgraph::Builder;
//!
//! let mut builder = Builder::new();
//! builder.packages(["com.acme.commands"]).localize_commands(false);
//! let config = builder.build().unwrap();
//! assert_eq!(config.packages().unwrap(), vec!["com.acme.commands"]);
//! assert!(!config.localize_commands().unwrap());
//! ```

pub mod builder;
pub mod cli;
pub mod error;
pub mod extension;
pub mod key;
pub mod loader;
pub mod logging;
pub mod properties;
pub mod provider;
pub mod resolved;
pub mod services;
pub mod settings;

pub use builder::Builder;
pub use error::{ConfigError, ErrorCode, Result};
pub use extension::{
    Extension, ExtensionCandidate, ExtensionFilter, ExtensionPayload, ExtensionRegistry,
    ExtensionSource, FilterStrategy, LoadedExtension, PayloadType, StaticSource,
};
pub use key::{FallbackBehaviour, PropertyKey, Scope, Shape, Stage};
pub use loader::{Context, Loader, ResolutionStack};
pub use provider::{
    Contributor, ErasedProvider, EXTENSION_PRIORITY, FALLBACK_ORIGIN, FALLBACK_PRIORITY, Provider,
    ProviderHandle, ProviderRegistry, USER_ORIGIN, USER_PRIORITY,
};
pub use resolved::{ConfigSummary, ResolvedConfig};
