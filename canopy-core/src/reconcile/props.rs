//! Property, reference and listener patching for element nodes.

use indexmap::IndexMap;

use super::RenderContext;
use crate::platform::{NestedBag, NodeHandle, Platform};
use crate::refs::{update_ref, RefTarget};
use crate::vdom::{ElementTag, Listener, PropValue, VNode};

/// Property names that differ from the attribute they map to on SVG
/// elements.
const SVG_ATTRIBUTE_TRANSLATIONS: &[(&str, &str)] = &[
    ("className", "class"),
    ("htmlFor", "for"),
    ("accentHeight", "accent-height"),
    ("alignmentBaseline", "alignment-baseline"),
    ("baselineShift", "baseline-shift"),
    ("clipPath", "clip-path"),
    ("clipRule", "clip-rule"),
    ("colorInterpolation", "color-interpolation"),
    ("dominantBaseline", "dominant-baseline"),
    ("fillOpacity", "fill-opacity"),
    ("fillRule", "fill-rule"),
    ("floodColor", "flood-color"),
    ("floodOpacity", "flood-opacity"),
    ("fontFamily", "font-family"),
    ("fontSize", "font-size"),
    ("fontWeight", "font-weight"),
    ("markerEnd", "marker-end"),
    ("markerMid", "marker-mid"),
    ("markerStart", "marker-start"),
    ("pointerEvents", "pointer-events"),
    ("shapeRendering", "shape-rendering"),
    ("stopColor", "stop-color"),
    ("stopOpacity", "stop-opacity"),
    ("strokeDasharray", "stroke-dasharray"),
    ("strokeDashoffset", "stroke-dashoffset"),
    ("strokeLinecap", "stroke-linecap"),
    ("strokeLinejoin", "stroke-linejoin"),
    ("strokeMiterlimit", "stroke-miterlimit"),
    ("strokeOpacity", "stroke-opacity"),
    ("strokeWidth", "stroke-width"),
    ("textAnchor", "text-anchor"),
    ("textDecoration", "text-decoration"),
    ("textRendering", "text-rendering"),
    ("xlinkHref", "xlink:href"),
    ("xmlSpace", "xml:space"),
];

/// Set as a property even on SVG elements.
const INNER_HTML: &str = "innerHTML";

const STYLE: &str = "style";
const DATASET: &str = "dataset";

/// Apply the property, reference and listener differences between `old`
/// (absent on first render) and `new` to `element`.
pub(super) fn patch_properties(
    cx: &RenderContext<'_>,
    element: NodeHandle,
    tag: &ElementTag,
    old: Option<&VNode>,
    new: &mut VNode,
) {
    let writer = PropertyWriter {
        cx,
        platform: cx.platform(),
        element,
        tag,
    };
    writer.remove_stale(old, new);
    writer.apply(old, new);

    update_ref(
        cx.refs().top(),
        old.and_then(|old| old.props().reference()),
        new.props().reference(),
        &RefTarget::Node(element),
    );

    new.bound_listeners = update_listeners(cx, element, old, new);
}

struct PropertyWriter<'a, 'r> {
    cx: &'a RenderContext<'r>,
    platform: &'r dyn Platform,
    element: NodeHandle,
    tag: &'a ElementTag,
}

impl PropertyWriter<'_, '_> {
    fn svg_name<'n>(&'n self, name: &'n str) -> &'n str {
        self.cx
            .config()
            .svg_attribute(name)
            .or_else(|| {
                SVG_ATTRIBUTE_TRANSLATIONS
                    .iter()
                    .find(|(from, _)| *from == name)
                    .map(|(_, to)| *to)
            })
            .unwrap_or(name)
    }

    fn uses_attributes(&self, name: &str) -> bool {
        name != INNER_HTML && self.tag.is_svg()
    }

    /// Clear properties present in `old` but missing from `new`.
    fn remove_stale(&self, old: Option<&VNode>, new: &VNode) {
        let Some(old) = old else {
            return;
        };
        for (name, value) in old.props().attrs() {
            if new.props().contains(name) {
                continue;
            }
            match (name.as_str(), value) {
                (DATASET, PropValue::Map(entries)) => {
                    for key in entries.keys() {
                        self.platform.remove_nested(self.element, NestedBag::Dataset, key);
                    }
                }
                _ if self.uses_attributes(name) => {
                    self.platform.remove_attribute(self.element, self.svg_name(name));
                }
                (STYLE, PropValue::Map(entries)) => {
                    self.clear_style(entries);
                    self.reset_property(name);
                }
                _ => self.reset_property(name),
            }
        }
    }

    /// Write properties that are new or changed.
    fn apply(&self, old: Option<&VNode>, new: &VNode) {
        for (name, value) in new.props().attrs() {
            let previous = old.and_then(|old| old.props().get(name));
            match (name.as_str(), value) {
                (DATASET, PropValue::Map(entries)) => {
                    let previous = previous.and_then(PropValue::as_map);
                    self.update_nested(NestedBag::Dataset, previous, entries);
                }
                (STYLE, PropValue::Map(entries)) if !self.uses_attributes(name) => {
                    let previous = match previous {
                        Some(PropValue::Map(entries)) => Some(entries),
                        Some(PropValue::Str(_)) => {
                            self.platform
                                .set_property(self.element, STYLE, &PropValue::empty());
                            None
                        }
                        _ => None,
                    };
                    self.update_nested(NestedBag::Style, previous, entries);
                }
                _ => {
                    if let (STYLE, Some(PropValue::Map(entries))) = (name.as_str(), previous) {
                        self.clear_style(entries);
                    }
                    self.set(name, value, previous);
                }
            }
        }
    }

    fn set(&self, name: &str, value: &PropValue, previous: Option<&PropValue>) {
        if self.cx.config().is_controlled(self.tag.name(), name) {
            // Compare against what the node currently holds, which user input
            // may have changed since the last render.
            if self.platform.property(self.element, name).as_ref() != Some(value) {
                self.platform.set_property(self.element, name, value);
            }
            return;
        }
        if previous == Some(value) {
            return;
        }
        if self.uses_attributes(name) {
            self.platform
                .set_attribute(self.element, self.svg_name(name), value);
        } else {
            self.platform.set_property(self.element, name, value);
        }
    }

    /// Reset to an empty value first so platforms that cannot delete a
    /// property do not end up stringifying a null.
    fn reset_property(&self, name: &str) {
        self.platform
            .set_property(self.element, name, &PropValue::empty());
        self.platform.remove_property(self.element, name);
    }

    fn clear_style(&self, entries: &IndexMap<String, PropValue>) {
        for key in entries.keys() {
            self.platform
                .set_nested(self.element, NestedBag::Style, key, &PropValue::empty());
        }
    }

    fn update_nested(
        &self,
        bag: NestedBag,
        old: Option<&IndexMap<String, PropValue>>,
        new: &IndexMap<String, PropValue>,
    ) {
        if let Some(old) = old {
            for key in old.keys().filter(|key| !new.contains_key(*key)) {
                match bag {
                    NestedBag::Style => {
                        self.platform
                            .set_nested(self.element, bag, key, &PropValue::empty())
                    }
                    NestedBag::Dataset => self.platform.remove_nested(self.element, bag, key),
                }
            }
        }
        for (key, value) in new {
            if old.and_then(|old| old.get(key)) != Some(value) {
                self.platform.set_nested(self.element, bag, key, value);
            }
        }
    }
}

/// The listener actually attached for `event` on `node`.
fn live_listener<'a>(node: &'a VNode, event: &str, authored: &'a Listener) -> &'a Listener {
    node.bound_listeners.get(event).unwrap_or(authored)
}

/// Diff listeners by identity. Returns the bound listeners to record on the
/// new node.
fn update_listeners(
    cx: &RenderContext<'_>,
    element: NodeHandle,
    old: Option<&VNode>,
    new: &VNode,
) -> IndexMap<String, Listener> {
    let platform = cx.platform();
    let new_listeners = new.props().listeners();

    if let Some(old) = old {
        for (event, listener) in old.props().listeners() {
            if !new_listeners.contains_key(event) {
                platform.remove_listener(element, event, live_listener(old, event, listener));
            }
        }
    }

    let mut bound = IndexMap::new();
    for (event, listener) in new_listeners {
        let previous = old.and_then(|old| old.props().listeners().get(event).map(|l| (old, l)));
        if let Some((old, previous)) = previous {
            if previous == listener {
                if let Some(existing) = old.bound_listeners.get(event) {
                    bound.insert(event.clone(), existing.clone());
                }
                continue;
            }
            platform.remove_listener(element, event, live_listener(old, event, previous));
        }

        let attached = match cx.owner() {
            Some(owner) => {
                let bound_listener = listener.bind(owner.clone());
                bound.insert(event.clone(), bound_listener.clone());
                bound_listener
            }
            None => listener.clone(),
        };
        platform.add_listener(element, event, &attached);
    }
    bound
}
