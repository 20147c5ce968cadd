//! Output-Node Platform
//!
//! The reconciler never touches a concrete UI toolkit. Everything it does to
//! live nodes goes through the [`Platform`] trait: creating nodes, writing
//! properties and attributes, moving children around and wiring listeners.
//!
//! Live nodes are identified by [`NodeHandle`]s that the platform hands out.
//! A handle is only meaningful to the platform that created it.
//!
//! All methods take `&self`. Components may trigger nested synchronous
//! updates while a patch is running, so a platform is shared rather than
//! borrowed mutably; implementations use interior mutability.
//!
//! [`memory::MemoryPlatform`] is a headless implementation used by the tests.

pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::vdom::{ElementTag, Listener, PropValue};

/// Opaque identifier of a live output node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u64);

impl NodeHandle {
    /// Allocate a new process-unique handle.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Nested property bags that are diffed key by key instead of as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestedBag {
    /// Inline style declarations.
    Style,
    /// `data-*` attributes.
    Dataset,
}

impl NestedBag {
    /// Property name the bag is authored under.
    pub fn prop_name(&self) -> &'static str {
        match self {
            NestedBag::Style => "style",
            NestedBag::Dataset => "dataset",
        }
    }
}

/// An event delivered by the platform to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event name without the `on` prefix, e.g. `click`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeHandle,
    /// Platform-specific payload.
    pub detail: PropValue,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeHandle) -> Self {
        Self {
            name: name.into(),
            target,
            detail: PropValue::Null,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<PropValue>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// The primitives a rendering backend offers to the reconciler.
pub trait Platform {
    /// Create a detached element. SVG tags must be created in the SVG
    /// namespace (see [`ElementTag::is_svg`]).
    fn create_element(&self, tag: &ElementTag) -> NodeHandle;

    /// Create a detached text node.
    fn create_text(&self, text: &str) -> NodeHandle;

    /// Overwrite the value of a text node.
    fn set_text(&self, node: NodeHandle, text: &str);

    /// Set a live property.
    fn set_property(&self, node: NodeHandle, name: &str, value: &PropValue);

    /// Delete a live property. The reconciler resets the property to an empty
    /// string before deleting it.
    fn remove_property(&self, node: NodeHandle, name: &str);

    /// Read a live property. Used for controlled properties only.
    fn property(&self, node: NodeHandle, name: &str) -> Option<PropValue>;

    /// Set an attribute. Used for SVG elements.
    fn set_attribute(&self, node: NodeHandle, name: &str, value: &PropValue);

    /// Remove an attribute. Used for SVG elements.
    fn remove_attribute(&self, node: NodeHandle, name: &str);

    /// Set one entry of a nested property bag.
    fn set_nested(&self, node: NodeHandle, bag: NestedBag, name: &str, value: &PropValue);

    /// Delete one entry of a nested property bag.
    fn remove_nested(&self, node: NodeHandle, bag: NestedBag, name: &str);

    /// Insert `child` into `parent` before `anchor`, or append it when
    /// `anchor` is `None`. A child that already has a parent is moved.
    fn insert_before(&self, parent: NodeHandle, child: NodeHandle, anchor: Option<NodeHandle>);

    /// Detach a node from its parent. Detached nodes are ignored.
    fn remove(&self, node: NodeHandle);

    /// Current parent of a node.
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Sibling following a node in its parent.
    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// Attach a listener. The same listener may later be passed to
    /// [`Platform::remove_listener`]; listeners compare by identity.
    fn add_listener(&self, node: NodeHandle, event: &str, listener: &Listener);

    /// Detach a listener previously added with [`Platform::add_listener`].
    fn remove_listener(&self, node: NodeHandle, event: &str, listener: &Listener);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_handles_are_unique() {
        let a = NodeHandle::new();
        let b = NodeHandle::new();
        assert_ne!(a, b);
        assert_eq!(NodeHandle::from(a.raw()), a);
    }

    #[test]
    fn nested_bag_names() {
        assert_eq!(NestedBag::Style.prop_name(), "style");
        assert_eq!(NestedBag::Dataset.prop_name(), "dataset");
    }
}
