//! Computed style for the live document
//!
//! The live editor host exposes resolved styles for each rendered node. This
//! module models that surface as the `ComputedStyleSource` trait and provides
//! `Cascade`, an implementation over an author `Stylesheet` that handles
//! selector specificity, inline styles, `!important`, shorthand expansion,
//! inheritance, initial values and tag defaults, and resolves lengths to px.

pub mod cascade;
pub mod properties;
pub mod registry;
pub mod stylesheet;

use crate::dom::{Document, NodeId};
use std::collections::HashMap;

pub use cascade::Cascade;
pub use registry::{ObservedProperty, OBSERVED_PROPERTIES, REGISTRY_VERSION};
pub use stylesheet::Stylesheet;

/// Resolved values of one element, keyed by longhand name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    values: HashMap<&'static str, String>,
}

impl ComputedStyle {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.values.insert(name, value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computed styles of a subtree keyed by node id
pub type StyleMap = HashMap<NodeId, ComputedStyle>;

/// Source of resolved styles for the elements of a live subtree
pub trait ComputedStyleSource {
    /// Compute the style of `root` and every element below it
    fn compute(&self, document: &Document, root: NodeId) -> StyleMap;
}
