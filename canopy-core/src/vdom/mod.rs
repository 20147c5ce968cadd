//! Virtual Nodes
//!
//! A [`VNode`] is an immutable description of one position in a UI tree.
//! Components produce a fresh tree on every render; the reconciler compares
//! it with the previous tree and edits the live nodes accordingly.
//!
//! # Concepts
//!
//! ## Tags
//!
//! A node is a text node, an element (named by an [`ElementTag`]) or a
//! component (identified by a [`ComponentTag`]). The variant is decided once
//! when the node is built and never re-checked.
//!
//! ## Equivalence
//!
//! Two nodes at the same position are *equivalent* when their keys are equal
//! and their tags are identical. Equivalent nodes reuse the live node and get
//! patched; anything else is replaced wholesale. See [`equivalent`].
//!
//! ## Authoring
//!
//! [`dom`] builds a node from heterogeneous [`Child`] values, flattening
//! nested lists and dropping `null`/`false` entries the same way every render
//! so that positions stay comparable.

mod child;
mod node;
mod props;

pub use child::{dom, flatten, Child};
pub use node::{ElementTag, Key, NodeKind, Tag, VNode};
pub use props::{event_name_for_prop, Listener, PropValue, Props};

pub use crate::component::ComponentTag;

/// Whether two nodes at the same position may share a live node.
///
/// Only the key and the tag are considered; every other difference is
/// patched in place.
pub fn equivalent(old: &VNode, new: &VNode) -> bool {
    old.key() == new.key() && old.same_tag(new)
}
