//! Virtual node type and tags.

use std::fmt;

use indexmap::IndexMap;

use super::props::{Listener, Props};
use crate::component::{ComponentRef, ComponentTag, WeakComponentRef};
use crate::platform::NodeHandle;

/// Element names created in the SVG namespace.
const SVG_TAGS: &[&str] = &[
    "svg", "circle", "clipPath", "defs", "desc", "ellipse", "feBlend", "feColorMatrix",
    "feComposite", "feFlood", "feGaussianBlur", "feMerge", "feMergeNode", "feOffset", "filter",
    "foreignObject", "g", "image", "line", "linearGradient", "marker", "mask", "metadata", "path",
    "pattern", "polygon", "polyline", "radialGradient", "rect", "stop", "switch", "symbol",
    "text", "textPath", "tspan", "use", "view",
];

/// Name of a platform element, e.g. `div`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementTag(String);

impl ElementTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether the element lives in the SVG namespace.
    pub fn is_svg(&self) -> bool {
        SVG_TAGS.contains(&self.0.as_str())
    }
}

impl fmt::Display for ElementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ElementTag {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The tag of a non-text node.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Element(ElementTag),
    Component(ComponentTag),
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Element(name.into())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Element(name.into())
    }
}

impl From<ElementTag> for Tag {
    fn from(tag: ElementTag) -> Self {
        Tag::Element(tag)
    }
}

impl From<ComponentTag> for Tag {
    fn from(tag: ComponentTag) -> Self {
        Tag::Component(tag)
    }
}

/// Identity hint used to match siblings across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key)
    }
}

macro_rules! key_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(key: $ty) -> Self {
                Self(key.to_string())
            }
        })*
    };
}

key_from_integer!(i32, i64, u32, u64, usize);

/// What a virtual node describes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Text(String),
    Element(ElementTag),
    Component(ComponentTag),
}

/// One position in a virtual tree.
///
/// The authored part (kind, props, children, owner context) never changes
/// after construction. The runtime part (live node, component instance,
/// bound listeners) is filled in when the node is rendered or patched and is
/// not copied by [`Clone`].
pub struct VNode {
    kind: NodeKind,
    props: Props,
    children: Vec<VNode>,
    context: Option<WeakComponentRef>,

    pub(crate) output: Option<NodeHandle>,
    pub(crate) component: Option<ComponentRef>,
    pub(crate) bound_listeners: IndexMap<String, Listener>,
}

impl VNode {
    fn with_kind(kind: NodeKind, props: Props, children: Vec<VNode>) -> Self {
        Self {
            kind,
            props,
            children,
            context: None,
            output: None,
            component: None,
            bound_listeners: IndexMap::new(),
        }
    }

    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text(text.into()), Props::new(), Vec::new())
    }

    /// An element with already-flattened children.
    pub fn element(tag: impl Into<ElementTag>, props: Props, children: Vec<VNode>) -> Self {
        Self::with_kind(NodeKind::Element(tag.into()), props, children)
    }

    /// A component node. `props` and `children` are handed to the component.
    pub fn component(tag: ComponentTag, props: Props, children: Vec<VNode>) -> Self {
        Self::with_kind(NodeKind::Component(tag), props, children)
    }

    /// A node for any tag.
    pub fn tagged(tag: impl Into<Tag>, props: Props, children: Vec<VNode>) -> Self {
        match tag.into() {
            Tag::Element(tag) => Self::element(tag, props, children),
            Tag::Component(tag) => Self::component(tag, props, children),
        }
    }

    /// Attach an owner: refs in this subtree go to the owner's table and
    /// listeners are invoked with the owner as context.
    pub fn with_context(mut self, owner: &ComponentRef) -> Self {
        self.context = Some(owner.downgrade());
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [VNode] {
        &mut self.children
    }

    pub(crate) fn context(&self) -> Option<&WeakComponentRef> {
        self.context.as_ref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.props.key()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn text_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn element_tag(&self) -> Option<&ElementTag> {
        match &self.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn component_tag(&self) -> Option<&ComponentTag> {
        match &self.kind {
            NodeKind::Component(tag) => Some(tag),
            _ => None,
        }
    }

    /// Live node this virtual node produced, once rendered.
    pub fn output(&self) -> Option<NodeHandle> {
        self.output
    }

    /// Component instance behind a component node, once rendered.
    pub fn instance(&self) -> Option<&ComponentRef> {
        self.component.as_ref()
    }

    /// Whether both nodes carry the same tag (or are both text).
    pub(crate) fn same_tag(&self, other: &VNode) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::Text(_), NodeKind::Text(_)) => true,
            (NodeKind::Element(a), NodeKind::Element(b)) => a == b,
            (NodeKind::Component(a), NodeKind::Component(b)) => a == b,
            _ => false,
        }
    }

    /// Human-readable tag, used in errors and logs.
    pub fn tag_label(&self) -> String {
        match &self.kind {
            NodeKind::Text(_) => "#text".to_owned(),
            NodeKind::Element(tag) => tag.name().to_owned(),
            NodeKind::Component(tag) => tag.name().to_owned(),
        }
    }
}

impl Clone for VNode {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            context: self.context.clone(),
            output: None,
            component: None,
            bound_listeners: IndexMap::new(),
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("kind", &self.kind)
            .field("props", &self.props)
            .field("children", &self.children)
            .field("output", &self.output)
            .finish()
    }
}
