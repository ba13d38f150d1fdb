//! Property keys and their value shapes.
//!
//! A [`PropertyKey`] names one configurable slot and declares how multiple
//! contributions to it combine. Keys are plain `const` values so that the
//! set of well-known properties can be declared statically (see
//! [`crate::properties`]).

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Who is allowed to contribute providers for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Only provided internally by the framework's own fallbacks.
    Provided,
    /// Settable by the user, but not loadable from extensions.
    User,
    /// Settable by the user and loadable from extensions.
    Loadable,
}

impl Scope {
    /// Whether extension modules may contribute providers for this scope.
    pub fn allows_extensions(&self) -> bool {
        matches!(self, Scope::Loadable)
    }

    /// Whether explicit user settings may contribute providers for this scope.
    pub fn allows_user(&self) -> bool {
        matches!(self, Scope::Loadable | Scope::User)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Provided => write!(f, "provided"),
            Scope::User => write!(f, "user"),
            Scope::Loadable => write!(f, "loadable"),
        }
    }
}

/// Lifecycle stage from which a property can be resolved.
///
/// Keys default to [`Stage::Configuration`]. Later stages are served by
/// providers added through `derive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Available while the configuration is being built.
    #[default]
    Configuration,
    /// Available once the configuration is built and extensions started.
    Initialized,
    /// Available while the application runs.
    Runtime,
    /// Available only while handling a single interaction.
    Interaction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configuration => write!(f, "configuration"),
            Stage::Initialized => write!(f, "initialized"),
            Stage::Runtime => write!(f, "runtime"),
            Stage::Interaction => write!(f, "interaction"),
        }
    }
}

/// How the fallback contribution of an aggregated property treats other contributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBehaviour {
    /// Any non-fallback contribution replaces the built-in default.
    Override,
    /// The built-in default is merged with every other contribution.
    Accumulate,
}

/// The aggregation shape of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Exactly one effective value; the highest priority provider wins.
    Instance,
    /// Contributed elements are appended into one ordered collection.
    Enumeration(FallbackBehaviour),
    /// Contributed key/value pairs are merged into one map.
    Mapping(FallbackBehaviour),
}

impl Shape {
    /// The fallback behaviour, `None` for [`Shape::Instance`].
    pub fn fallback_behaviour(&self) -> Option<FallbackBehaviour> {
        match self {
            Shape::Instance => None,
            Shape::Enumeration(behaviour) | Shape::Mapping(behaviour) => Some(*behaviour),
        }
    }

    pub fn is_aggregated(&self) -> bool {
        !matches!(self, Shape::Instance)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Instance => write!(f, "instance"),
            Shape::Enumeration(_) => write!(f, "enumeration"),
            Shape::Mapping(_) => write!(f, "mapping"),
        }
    }
}

/// Empty value and merge step for an aggregated value type.
pub(crate) struct Fold<T> {
    pub(crate) empty: fn() -> T,
    pub(crate) merge: fn(&mut T, T),
}

impl<T> Clone for Fold<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Fold<T> {}

fn append<E>(acc: &mut Vec<E>, next: Vec<E>) {
    acc.extend(next);
}

fn put_all<K: Eq + Hash, V>(acc: &mut HashMap<K, V>, next: HashMap<K, V>) {
    acc.extend(next);
}

/// Identity and shape of one configurable property producing values of type `T`.
///
/// Two keys are the same property when their names are equal; names must
/// therefore be unique across the whole key set.
pub struct PropertyKey<T> {
    name: &'static str,
    scope: Scope,
    stage: Stage,
    shape: Shape,
    fold: Option<Fold<T>>,
    _value: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    /// Declare a single-valued property.
    pub const fn instance(name: &'static str, scope: Scope) -> Self {
        Self {
            name,
            scope,
            stage: Stage::Configuration,
            shape: Shape::Instance,
            fold: None,
            _value: PhantomData,
        }
    }

    /// The same key, resolvable from `stage` onwards.
    pub const fn at_stage(self, stage: Stage) -> Self {
        Self { stage, ..self }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub(crate) fn fold(&self) -> Option<Fold<T>> {
        self.fold
    }
}

impl<E> PropertyKey<Vec<E>> {
    /// Declare an aggregated list property.
    pub const fn enumeration(
        name: &'static str,
        scope: Scope,
        fallback: FallbackBehaviour,
    ) -> Self {
        Self {
            name,
            scope,
            stage: Stage::Configuration,
            shape: Shape::Enumeration(fallback),
            fold: Some(Fold {
                empty: Vec::new,
                merge: append::<E>,
            }),
            _value: PhantomData,
        }
    }
}

impl<K: Eq + Hash, V> PropertyKey<HashMap<K, V>> {
    /// Declare an aggregated map property.
    pub const fn mapping(name: &'static str, scope: Scope, fallback: FallbackBehaviour) -> Self {
        Self {
            name,
            scope,
            stage: Stage::Configuration,
            shape: Shape::Mapping(fallback),
            fold: Some(Fold {
                empty: HashMap::new,
                merge: put_all::<K, V>,
            }),
            _value: PhantomData,
        }
    }
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

impl<T> PartialEq for PropertyKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for PropertyKey<T> {}

impl<T> fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyKey")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("stage", &self.stage)
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T> fmt::Display for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
