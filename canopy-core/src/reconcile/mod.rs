//! Reconciliation
//!
//! Turns a change between two virtual trees into platform mutations.
//!
//! # Concepts
//!
//! - **Render**: build live nodes for a tree that has none yet.
//! - **Patch**: given the previous tree (with its live nodes) and a new
//!   description, mutate the live nodes in place. Equivalent nodes (same key
//!   and same tag) keep their live node; anything else is removed and
//!   rendered from scratch at the same position.
//! - **Remove**: tear down a subtree, destroying every nested component
//!   exactly once and unregistering references.
//!
//! All three run inside a [`RenderContext`], which carries the reference
//! stack and the owner used to bind listeners. A patch never yields: it runs
//! to completion, possibly updating nested components synchronously.

mod children;
mod props;

use std::ops::{Deref, DerefMut};

use tracing::trace;

use crate::component::{ComponentRef, Runtime, WeakComponentRef};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::{NodeHandle, Platform};
use crate::refs::{update_ref, RefStack, RefTable, RefTarget};
use crate::vdom::{equivalent, NodeKind, VNode};

/// State threaded through one render, patch or removal.
pub(crate) struct RenderContext<'r> {
    runtime: &'r Runtime,
    refs: RefStack,
    owners: Vec<WeakComponentRef>,
}

impl<'r> RenderContext<'r> {
    pub(crate) fn new(runtime: &'r Runtime) -> Self {
        Self {
            runtime,
            refs: RefStack::new(),
            owners: Vec::new(),
        }
    }

    pub(crate) fn runtime(&self) -> &'r Runtime {
        self.runtime
    }

    pub(crate) fn platform(&self) -> &'r dyn Platform {
        self.runtime.platform()
    }

    pub(crate) fn config(&self) -> &'r Config {
        self.runtime.config()
    }

    pub(crate) fn refs(&self) -> &RefStack {
        &self.refs
    }

    /// Component whose listeners are being wired.
    pub(crate) fn owner(&self) -> Option<&WeakComponentRef> {
        self.owners.last()
    }

    /// Make `owner` current: its reference table receives new entries and
    /// listeners are bound to it until the returned scope drops.
    pub(crate) fn enter(&mut self, owner: &ComponentRef) -> OwnerScope<'_, 'r> {
        let table = owner.refs().clone();
        self.refs.push(table.clone());
        self.owners.push(owner.downgrade());
        OwnerScope { cx: self, table }
    }
}

/// Guard returned by [`RenderContext::enter`].
pub(crate) struct OwnerScope<'a, 'r> {
    cx: &'a mut RenderContext<'r>,
    table: RefTable,
}

impl<'r> Deref for OwnerScope<'_, 'r> {
    type Target = RenderContext<'r>;

    fn deref(&self) -> &RenderContext<'r> {
        self.cx
    }
}

impl<'r> DerefMut for OwnerScope<'_, 'r> {
    fn deref_mut(&mut self) -> &mut RenderContext<'r> {
        self.cx
    }
}

impl Drop for OwnerScope<'_, '_> {
    fn drop(&mut self) {
        self.cx.owners.pop();
        if let Some(popped) = self.cx.refs.pop() {
            debug_assert!(
                popped.ptr_eq(&self.table),
                "reference stack mismatch: popped a table that was not pushed by this scope"
            );
        }
    }
}

fn context_owner(node: &VNode) -> Option<ComponentRef> {
    node.context().and_then(WeakComponentRef::upgrade)
}

/// Build live nodes for `node` and its subtree.
pub(crate) fn render(cx: &mut RenderContext<'_>, node: &mut VNode) -> Result<NodeHandle> {
    match context_owner(node) {
        Some(owner) => render_node(&mut cx.enter(&owner), node),
        None => render_node(cx, node),
    }
}

fn render_node(cx: &mut RenderContext<'_>, node: &mut VNode) -> Result<NodeHandle> {
    let platform = cx.platform();
    let output = match node.kind().clone() {
        NodeKind::Text(text) => platform.create_text(&text),
        NodeKind::Element(tag) => {
            let element = platform.create_element(&tag);
            for child in node.children_mut() {
                let child_output = render(cx, child)?;
                platform.insert_before(element, child_output, None);
            }
            props::patch_properties(cx, element, &tag, None, node);
            element
        }
        NodeKind::Component(tag) => {
            let runtime = cx.runtime();
            let component = runtime.instantiate(&tag, node.props(), node.children())?;
            let element = runtime.build(cx, &component)?;
            if let Some(reference) = node.props().reference() {
                cx.refs()
                    .hook(reference, &RefTarget::Component(component.clone()));
            }
            node.component = Some(component);
            element
        }
    };
    node.output = Some(output);
    Ok(output)
}

/// Bring the live nodes of `old` in line with `new` and return the live
/// node now representing `new`.
pub(crate) fn patch(cx: &mut RenderContext<'_>, old: &VNode, new: &mut VNode) -> Result<NodeHandle> {
    match context_owner(new) {
        Some(owner) => patch_node(&mut cx.enter(&owner), old, new),
        None => patch_node(cx, old, new),
    }
}

fn patch_node(cx: &mut RenderContext<'_>, old: &VNode, new: &mut VNode) -> Result<NodeHandle> {
    let old_output = old.output.ok_or(Error::Unrendered)?;
    if !equivalent(old, new) {
        return replace(cx, old, new, old_output);
    }

    let output = match new.kind().clone() {
        NodeKind::Text(text) => {
            if old.text_value() != Some(text.as_str()) {
                cx.platform().set_text(old_output, &text);
            }
            old_output
        }
        NodeKind::Element(tag) => {
            children::update_children(cx, old_output, old.children(), new.children_mut())?;
            props::patch_properties(cx, old_output, &tag, Some(old), new);
            old_output
        }
        NodeKind::Component(_) => patch_component(cx, old, new)?,
    };
    new.output = Some(output);
    Ok(output)
}

/// Forward new props and children to the existing component instance.
fn patch_component(cx: &mut RenderContext<'_>, old: &VNode, new: &mut VNode) -> Result<NodeHandle> {
    let component = old.component.clone().ok_or(Error::Unrendered)?;
    new.component = Some(component.clone());

    let target = RefTarget::Component(component.clone());
    update_ref(
        cx.refs().top(),
        old.props().reference(),
        new.props().reference(),
        &target,
    );

    if component.forward_update(new.props(), new.children()) {
        cx.runtime().update_sync(&component)?;
    }
    component.element().ok_or(Error::Unrendered)
}

/// Remove `old` and render `new` in its place.
fn replace(
    cx: &mut RenderContext<'_>,
    old: &VNode,
    new: &mut VNode,
    old_output: NodeHandle,
) -> Result<NodeHandle> {
    trace!(old = %old.tag_label(), new = %new.tag_label(), "replacing node");
    let platform = cx.platform();
    let parent = platform.parent(old_output);
    let anchor = platform.next_sibling(old_output);

    remove(cx, old, true);
    let output = render_node(cx, new)?;
    if let Some(parent) = parent {
        platform.insert_before(parent, output, anchor);
    }
    Ok(output)
}

/// Tear down `node`: unregister its references, destroy nested components and,
/// when `detach` is set, remove its live node from the parent. Descendants of
/// a removed element are not detached individually.
pub(crate) fn remove(cx: &mut RenderContext<'_>, node: &VNode, detach: bool) {
    match context_owner(node) {
        Some(owner) => remove_node(&mut cx.enter(&owner), node, detach),
        None => remove_node(cx, node, detach),
    }
}

fn remove_node(cx: &mut RenderContext<'_>, node: &VNode, detach: bool) {
    match node.kind() {
        NodeKind::Text(_) => {}
        NodeKind::Element(_) => {
            if let (Some(reference), Some(output)) = (node.props().reference(), node.output) {
                cx.refs().unhook(reference, &RefTarget::Node(output));
            }
            for child in node.children() {
                remove(cx, child, false);
            }
        }
        NodeKind::Component(_) => {
            if let Some(component) = node.instance() {
                if let Some(reference) = node.props().reference() {
                    cx.refs()
                        .unhook(reference, &RefTarget::Component(component.clone()));
                }
                cx.runtime().destroy_sync(component);
            }
        }
    }

    if detach {
        if let Some(output) = node.output {
            cx.platform().remove(output);
        }
    }
}
