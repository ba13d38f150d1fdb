//! Structured error types for property resolution.
//!
//! Every error here is a configuration-time failure. None of them are
//! retried or recovered internally; they abort `Builder::build()` or the
//! `get()` call that triggered them.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Resolution errors
    MissingProperty,
    AmbiguousProvider,
    CyclicDependency,
    TypeMismatch,

    // Registration errors
    ScopeViolation,
    ExtensionInitialization,

    // Raised by a supplier itself
    SupplierFailed,
}

/// Errors raised while assembling or resolving configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Property {property} has no value: no provider is registered or the winning provider supplied nothing")]
    MissingProperty { property: String },

    #[error(
        "Property {property} has {} providers tied at priority {priority}:\n{}",
        contenders.len(),
        contenders.join("\n")
    )]
    AmbiguousProvider {
        property: String,
        priority: i32,
        contenders: Vec<String>,
    },

    #[error("Cyclic dependency while resolving {property}:\n{chain}")]
    CyclicDependency { property: String, chain: String },

    #[error("Extension {extension} could not be initialized: {reason}")]
    ExtensionInitialization { extension: String, reason: String },

    #[error("{origin} may not provide {property} (scope: {scope})")]
    ScopeViolation {
        property: String,
        scope: String,
        origin: String,
    },

    #[error("Provider in {origin} for {property} does not produce the requested value type")]
    TypeMismatch { property: String, origin: String },

    #[error("Provider in {origin} failed to supply {property}: {message}")]
    Supplier {
        property: String,
        origin: String,
        message: String,
    },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::MissingProperty { .. } => ErrorCode::MissingProperty,
            ConfigError::AmbiguousProvider { .. } => ErrorCode::AmbiguousProvider,
            ConfigError::CyclicDependency { .. } => ErrorCode::CyclicDependency,
            ConfigError::ExtensionInitialization { .. } => ErrorCode::ExtensionInitialization,
            ConfigError::ScopeViolation { .. } => ErrorCode::ScopeViolation,
            ConfigError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            ConfigError::Supplier { .. } => ErrorCode::SupplierFailed,
        }
    }

    // Convenience constructors

    pub fn missing(property: &str) -> Self {
        ConfigError::MissingProperty {
            property: property.to_string(),
        }
    }

    pub fn extension_init(extension: &str, reason: impl Into<String>) -> Self {
        ConfigError::ExtensionInitialization {
            extension: extension.to_string(),
            reason: reason.into(),
        }
    }

    /// Error for a supplier that cannot produce its value for a reason of its own.
    pub fn supplier(property: &str, origin: &str, message: impl Into<String>) -> Self {
        ConfigError::Supplier {
            property: property.to_string(),
            origin: origin.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
