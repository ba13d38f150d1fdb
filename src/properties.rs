//! Well-known properties.

use crate::key::{FallbackBehaviour, PropertyKey, Scope, Shape, Stage};
use crate::services::{
    AdapterType, ClassFinder, Descriptor, ErrorMessageFactory, ExpirationStrategy, Middleware,
    MiddlewarePriority, PermissionsProvider, ReplyConfig, TypeAdapter, Validator,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

// -------- settable by the user + loadable from extensions --------

pub const DESCRIPTOR: PropertyKey<Arc<dyn Descriptor>> =
    PropertyKey::instance("DESCRIPTOR", Scope::Loadable);

pub const MIDDLEWARES: PropertyKey<Vec<(MiddlewarePriority, Arc<dyn Middleware>)>> =
    PropertyKey::enumeration("MIDDLEWARES", Scope::Loadable, FallbackBehaviour::Accumulate);

/// Validators keyed by the name of the constraint they check.
pub const VALIDATORS: PropertyKey<HashMap<String, Arc<dyn Validator>>> =
    PropertyKey::mapping("VALIDATORS", Scope::Loadable, FallbackBehaviour::Accumulate);

pub const TYPE_ADAPTERS: PropertyKey<HashMap<AdapterType, Arc<dyn TypeAdapter>>> =
    PropertyKey::mapping("TYPE_ADAPTERS", Scope::Loadable, FallbackBehaviour::Accumulate);

/// The fallback searches [`PACKAGES`]; any other contribution replaces it.
pub const CLASS_FINDERS: PropertyKey<Vec<Arc<dyn ClassFinder>>> =
    PropertyKey::enumeration("CLASS_FINDERS", Scope::Loadable, FallbackBehaviour::Override);

pub const PERMISSIONS_PROVIDER: PropertyKey<Arc<dyn PermissionsProvider>> =
    PropertyKey::instance("PERMISSIONS_PROVIDER", Scope::Loadable);

pub const ERROR_MESSAGE_FACTORY: PropertyKey<Arc<dyn ErrorMessageFactory>> =
    PropertyKey::instance("ERROR_MESSAGE_FACTORY", Scope::Loadable);

// -------- settable by the user only --------

pub const PACKAGES: PropertyKey<Vec<String>> =
    PropertyKey::enumeration("PACKAGES", Scope::User, FallbackBehaviour::Accumulate);

pub const GLOBAL_REPLY_CONFIG: PropertyKey<ReplyConfig> =
    PropertyKey::instance("GLOBAL_REPLY_CONFIG", Scope::User);

pub const EXPIRATION_STRATEGY: PropertyKey<ExpirationStrategy> =
    PropertyKey::instance("EXPIRATION_STRATEGY", Scope::User);

pub const LOCALIZE_COMMANDS: PropertyKey<bool> =
    PropertyKey::instance("LOCALIZE_COMMANDS", Scope::User);

pub const SHUTDOWN_ON_FAILURE: PropertyKey<bool> =
    PropertyKey::instance("SHUTDOWN_ON_FAILURE", Scope::User);

// -------- provided internally --------

/// Searches every finder of [`CLASS_FINDERS`].
pub const MERGED_CLASS_FINDER: PropertyKey<Arc<dyn ClassFinder>> =
    PropertyKey::instance("MERGED_CLASS_FINDER", Scope::Provided);

/// Static description of a property, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub name: &'static str,
    pub scope: Scope,
    pub stage: Stage,
    pub shape: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackBehaviour>,
}

impl KeyInfo {
    pub fn of<T>(key: &PropertyKey<T>) -> Self {
        let shape: Shape = key.shape();
        Self {
            name: key.name(),
            scope: key.scope(),
            stage: key.stage(),
            shape: shape.to_string(),
            fallback: shape.fallback_behaviour(),
        }
    }
}

/// Every well-known property.
pub fn well_known() -> Vec<KeyInfo> {
    vec![
        KeyInfo::of(&DESCRIPTOR),
        KeyInfo::of(&MIDDLEWARES),
        KeyInfo::of(&VALIDATORS),
        KeyInfo::of(&TYPE_ADAPTERS),
        KeyInfo::of(&CLASS_FINDERS),
        KeyInfo::of(&PERMISSIONS_PROVIDER),
        KeyInfo::of(&ERROR_MESSAGE_FACTORY),
        KeyInfo::of(&PACKAGES),
        KeyInfo::of(&GLOBAL_REPLY_CONFIG),
        KeyInfo::of(&EXPIRATION_STRATEGY),
        KeyInfo::of(&LOCALIZE_COMMANDS),
        KeyInfo::of(&SHUTDOWN_ON_FAILURE),
        KeyInfo::of(&MERGED_CLASS_FINDER),
    ]
}
