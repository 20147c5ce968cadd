//! Headless in-memory platform.
//!
//! Keeps an arena of live nodes and a log of every mutation the reconciler
//! performs. Tests assert on the resulting tree, on the log (to check that
//! unchanged nodes were not touched) and dispatch events to wired listeners.

use std::collections::HashMap;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{Event, NestedBag, NodeHandle, Platform};
use crate::vdom::{ElementTag, Listener, PropValue};

/// One mutation applied to the live tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(NodeHandle),
    Insert { parent: NodeHandle, child: NodeHandle },
    /// A node that already had a parent was inserted again.
    Move { parent: NodeHandle, child: NodeHandle },
    Remove(NodeHandle),
    SetText(NodeHandle),
    SetProperty { node: NodeHandle, name: String },
    RemoveProperty { node: NodeHandle, name: String },
    SetAttribute { node: NodeHandle, name: String },
    RemoveAttribute { node: NodeHandle, name: String },
    SetNested { node: NodeHandle, bag: NestedBag, name: String },
    RemoveNested { node: NodeHandle, bag: NestedBag, name: String },
    AddListener { node: NodeHandle, event: String },
    RemoveListener { node: NodeHandle, event: String },
}

impl Mutation {
    /// The node the mutation was applied to (the child for tree edits).
    pub fn node(&self) -> NodeHandle {
        match self {
            Mutation::Create(node)
            | Mutation::Remove(node)
            | Mutation::SetText(node)
            | Mutation::SetProperty { node, .. }
            | Mutation::RemoveProperty { node, .. }
            | Mutation::SetAttribute { node, .. }
            | Mutation::RemoveAttribute { node, .. }
            | Mutation::SetNested { node, .. }
            | Mutation::RemoveNested { node, .. }
            | Mutation::AddListener { node, .. }
            | Mutation::RemoveListener { node, .. } => *node,
            Mutation::Insert { child, .. } | Mutation::Move { child, .. } => *child,
        }
    }
}

enum LiveKind {
    Element(ElementTag),
    Text(String),
}

struct LiveNode {
    kind: LiveKind,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    properties: IndexMap<String, PropValue>,
    attributes: IndexMap<String, PropValue>,
    style: IndexMap<String, PropValue>,
    dataset: IndexMap<String, PropValue>,
    listeners: Vec<(String, Listener)>,
}

impl LiveNode {
    fn new(kind: LiveKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            properties: IndexMap::new(),
            attributes: IndexMap::new(),
            style: IndexMap::new(),
            dataset: IndexMap::new(),
            listeners: Vec::new(),
        }
    }

    fn bag(&mut self, bag: NestedBag) -> &mut IndexMap<String, PropValue> {
        match bag {
            NestedBag::Style => &mut self.style,
            NestedBag::Dataset => &mut self.dataset,
        }
    }
}

#[derive(Default)]
struct Arena {
    nodes: HashMap<NodeHandle, LiveNode>,
    log: Vec<Mutation>,
}

impl Arena {
    fn add(&mut self, kind: LiveKind) -> NodeHandle {
        let node = NodeHandle::new();
        self.nodes.insert(node, LiveNode::new(kind));
        self.log.push(Mutation::Create(node));
        node
    }

    fn detach(&mut self, node: NodeHandle) -> Option<NodeHandle> {
        let parent = self.nodes.get_mut(&node)?.parent.take()?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|c| *c != node);
        }
        Some(parent)
    }
}

/// A [`Platform`] backed by an in-memory arena.
#[derive(Default)]
pub struct MemoryPlatform {
    arena: Mutex<Arena>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element to mount trees into.
    pub fn create_root(&self, tag: &str) -> NodeHandle {
        self.create_element(&ElementTag::new(tag))
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.arena.lock().nodes.contains_key(&node)
    }

    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.arena
            .lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Element name, `None` for text nodes.
    pub fn tag(&self, node: NodeHandle) -> Option<String> {
        match &self.arena.lock().nodes.get(&node)?.kind {
            LiveKind::Element(tag) => Some(tag.name().to_owned()),
            LiveKind::Text(_) => None,
        }
    }

    /// Value of a text node.
    pub fn text(&self, node: NodeHandle) -> Option<String> {
        match &self.arena.lock().nodes.get(&node)?.kind {
            LiveKind::Text(text) => Some(text.clone()),
            LiveKind::Element(_) => None,
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: NodeHandle) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<PropValue> {
        self.arena.lock().nodes.get(&node)?.attributes.get(name).cloned()
    }

    pub fn style(&self, node: NodeHandle, name: &str) -> Option<PropValue> {
        self.arena.lock().nodes.get(&node)?.style.get(name).cloned()
    }

    pub fn dataset(&self, node: NodeHandle, name: &str) -> Option<PropValue> {
        self.arena.lock().nodes.get(&node)?.dataset.get(name).cloned()
    }

    pub fn listener_count(&self, node: NodeHandle, event: &str) -> usize {
        self.arena
            .lock()
            .nodes
            .get(&node)
            .map_or(0, |n| n.listeners.iter().filter(|(e, _)| e == event).count())
    }

    /// Deliver `event` to the listeners of its target. Returns how many
    /// listeners ran.
    pub fn dispatch(&self, event: &Event) -> usize {
        let listeners: Vec<Listener> = {
            let arena = self.arena.lock();
            match arena.nodes.get(&event.target) {
                Some(node) => node
                    .listeners
                    .iter()
                    .filter(|(name, _)| *name == event.name)
                    .map(|(_, listener)| listener.clone())
                    .collect(),
                None => Vec::new(),
            }
        };
        // The lock is released: listeners may trigger updates.
        for listener in &listeners {
            listener.call(event);
        }
        listeners.len()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.arena.lock().log.clone()
    }

    /// Return the mutation log and start a new one.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.arena.lock().log)
    }

    /// Serialize a subtree as markup, for assertions and debugging.
    pub fn markup(&self, node: NodeHandle) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        write_markup(&arena, node, &mut out);
        out
    }

    fn with_node(&self, node: NodeHandle, mutation: Mutation, f: impl FnOnce(&mut LiveNode)) {
        let mut arena = self.arena.lock();
        match arena.nodes.get_mut(&node) {
            Some(live) => {
                f(live);
                arena.log.push(mutation);
            }
            None => tracing::warn!(node = node.raw(), "mutation on unknown node"),
        }
    }
}

fn collect_text(arena: &Arena, node: NodeHandle, out: &mut String) {
    let Some(live) = arena.nodes.get(&node) else {
        return;
    };
    match &live.kind {
        LiveKind::Text(text) => out.push_str(text),
        LiveKind::Element(_) => {
            for child in &live.children {
                collect_text(arena, *child, out);
            }
        }
    }
}

fn write_markup(arena: &Arena, node: NodeHandle, out: &mut String) {
    let Some(live) = arena.nodes.get(&node) else {
        return;
    };
    let tag = match &live.kind {
        LiveKind::Text(text) => {
            out.push_str(text);
            return;
        }
        LiveKind::Element(tag) => tag.name(),
    };

    out.push('<');
    out.push_str(tag);
    for (name, value) in live.properties.iter().chain(&live.attributes) {
        out.push_str(&format!(" {name}=\"{value}\""));
    }
    if !live.style.is_empty() {
        let style: IndexMap<String, PropValue> = live.style.clone();
        out.push_str(&format!(" style=\"{}\"", PropValue::Map(style)));
    }
    for (name, value) in &live.dataset {
        out.push_str(&format!(" data-{name}=\"{value}\""));
    }
    out.push('>');
    for child in &live.children {
        write_markup(arena, *child, out);
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

impl Platform for MemoryPlatform {
    fn create_element(&self, tag: &ElementTag) -> NodeHandle {
        self.arena.lock().add(LiveKind::Element(tag.clone()))
    }

    fn create_text(&self, text: &str) -> NodeHandle {
        self.arena.lock().add(LiveKind::Text(text.to_owned()))
    }

    fn set_text(&self, node: NodeHandle, text: &str) {
        self.with_node(node, Mutation::SetText(node), |live| {
            live.kind = LiveKind::Text(text.to_owned());
        });
    }

    fn set_property(&self, node: NodeHandle, name: &str, value: &PropValue) {
        let mutation = Mutation::SetProperty {
            node,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.properties.insert(name.to_owned(), value.clone());
        });
    }

    fn remove_property(&self, node: NodeHandle, name: &str) {
        let mutation = Mutation::RemoveProperty {
            node,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.properties.shift_remove(name);
        });
    }

    fn property(&self, node: NodeHandle, name: &str) -> Option<PropValue> {
        self.arena.lock().nodes.get(&node)?.properties.get(name).cloned()
    }

    fn set_attribute(&self, node: NodeHandle, name: &str, value: &PropValue) {
        let mutation = Mutation::SetAttribute {
            node,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.attributes.insert(name.to_owned(), value.clone());
        });
    }

    fn remove_attribute(&self, node: NodeHandle, name: &str) {
        let mutation = Mutation::RemoveAttribute {
            node,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.attributes.shift_remove(name);
        });
    }

    fn set_nested(&self, node: NodeHandle, bag: NestedBag, name: &str, value: &PropValue) {
        let mutation = Mutation::SetNested {
            node,
            bag,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            let entries = live.bag(bag);
            // An empty style value clears the declaration.
            if bag == NestedBag::Style && value.as_str() == Some("") {
                entries.shift_remove(name);
            } else {
                entries.insert(name.to_owned(), value.clone());
            }
        });
    }

    fn remove_nested(&self, node: NodeHandle, bag: NestedBag, name: &str) {
        let mutation = Mutation::RemoveNested {
            node,
            bag,
            name: name.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.bag(bag).shift_remove(name);
        });
    }

    fn insert_before(&self, parent: NodeHandle, child: NodeHandle, anchor: Option<NodeHandle>) {
        if anchor == Some(child) {
            return;
        }
        let mut arena = self.arena.lock();
        if !arena.nodes.contains_key(&parent) || !arena.nodes.contains_key(&child) {
            tracing::warn!(parent = parent.raw(), child = child.raw(), "insert with unknown node");
            return;
        }

        let moved = arena.detach(child).is_some();
        let Some(parent_node) = arena.nodes.get_mut(&parent) else {
            return;
        };
        let index = anchor
            .and_then(|anchor| parent_node.children.iter().position(|c| *c == anchor))
            .unwrap_or(parent_node.children.len());
        parent_node.children.insert(index, child);
        if let Some(child_node) = arena.nodes.get_mut(&child) {
            child_node.parent = Some(parent);
        }

        arena.log.push(if moved {
            Mutation::Move { parent, child }
        } else {
            Mutation::Insert { parent, child }
        });
    }

    fn remove(&self, node: NodeHandle) {
        let mut arena = self.arena.lock();
        if arena.detach(node).is_some() {
            arena.log.push(Mutation::Remove(node));
        }
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.arena.lock().nodes.get(&node)?.parent
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let arena = self.arena.lock();
        let parent = arena.nodes.get(&node)?.parent?;
        let siblings = &arena.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    fn add_listener(&self, node: NodeHandle, event: &str, listener: &Listener) {
        let mutation = Mutation::AddListener {
            node,
            event: event.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            live.listeners.push((event.to_owned(), listener.clone()));
        });
    }

    fn remove_listener(&self, node: NodeHandle, event: &str, listener: &Listener) {
        let mutation = Mutation::RemoveListener {
            node,
            event: event.to_owned(),
        };
        self.with_node(node, mutation, |live| {
            if let Some(index) = live
                .listeners
                .iter()
                .position(|(e, l)| e == event && l.ptr_eq(listener))
            {
                live.listeners.remove(index);
            }
        });
    }
}
