//! Call-scoped resolution stack and the supplier [`Context`].
//!
//! A [`ResolutionStack`] lives for exactly one top-level `Loader::get()` call
//! and every nested `Context::get()` it triggers. It is never shared between
//! independent top-level calls, so concurrent resolutions on different
//! threads cannot see each other's in-flight keys.

use super::Loader;
use crate::error::{ConfigError, Result};
use crate::key::PropertyKey;
use std::cell::RefCell;

#[derive(Debug, Clone)]
struct Frame {
    property: &'static str,
    origin: Option<String>,
}

impl Frame {
    fn describe(&self) -> String {
        match &self.origin {
            Some(origin) => format!("{} (provider in {})", self.property, origin),
            None => self.property.to_string(),
        }
    }
}

/// Ordered record of the properties currently being resolved.
#[derive(Debug, Default)]
pub struct ResolutionStack {
    frames: RefCell<Vec<Frame>>,
}

impl ResolutionStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push `property`, failing if it is already in flight.
    ///
    /// The returned guard pops the frame when dropped, including on early
    /// return through `?`.
    pub(crate) fn enter(&self, property: &'static str) -> Result<StackGuard<'_>> {
        let mut frames = self.frames.borrow_mut();
        if let Some(at) = frames.iter().position(|f| f.property == property) {
            return Err(cycle_error(property, &frames[at..]));
        }
        frames.push(Frame {
            property,
            origin: None,
        });
        Ok(StackGuard { stack: self })
    }

    /// Record which provider the innermost frame is currently applying.
    pub(crate) fn set_origin(&self, origin: &str) {
        if let Some(top) = self.frames.borrow_mut().last_mut() {
            top.origin = Some(origin.to_string());
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Names of the in-flight properties, outermost first.
    pub fn properties(&self) -> Vec<&'static str> {
        self.frames.borrow().iter().map(|f| f.property).collect()
    }
}

/// Pops the innermost frame on drop.
pub(crate) struct StackGuard<'a> {
    stack: &'a ResolutionStack,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.frames.borrow_mut().pop();
    }
}

fn cycle_error(property: &'static str, ring: &[Frame]) -> ConfigError {
    let chain = if ring.len() == 1 {
        format!("{} requires itself", ring[0].describe())
    } else {
        render_ring(ring)
    };
    ConfigError::CyclicDependency {
        property: property.to_string(),
        chain,
    }
}

/// Render the frames of a cycle, closing the loop back to the first frame:
///
/// ```text
/// A (provider in x)    <--+
///   ↓ [requires]          |
/// B (provider in y)    ---+
/// ```
fn render_ring(ring: &[Frame]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(ring.len() * 2);
    for (i, frame) in ring.iter().enumerate() {
        if i > 0 {
            lines.push("  ↓ [requires]".to_string());
        }
        lines.push(frame.describe());
    }

    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    let last = lines.len() - 1;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let pad = " ".repeat(width - line.chars().count());
            let marker = if i == 0 {
                "<--+"
            } else if i == last {
                "---+"
            } else {
                "   |"
            };
            format!("{line}{pad}{marker}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Capability handed to every supplier: resolve other properties on the
/// same resolution stack.
pub struct Context<'a> {
    loader: &'a Loader,
    stack: &'a ResolutionStack,
}

impl<'a> Context<'a> {
    pub(crate) fn new(loader: &'a Loader, stack: &'a ResolutionStack) -> Self {
        Self { loader, stack }
    }

    /// Resolve `key`, failing if it has no value.
    pub fn get<T>(&self, key: PropertyKey<T>) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.get_optional(key)?
            .ok_or_else(|| ConfigError::missing(key.name()))
    }

    /// Resolve `key`, returning `None` if its winning provider supplied nothing.
    pub fn get_optional<T>(&self, key: PropertyKey<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.loader.resolve(key, self.stack)
    }

    /// Current nesting depth, including the property being supplied.
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }
}
