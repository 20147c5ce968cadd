//! Properties, property values and listeners.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::node::Key;
use crate::component::{ComponentRef, WeakComponentRef};
use crate::platform::Event;
use crate::refs::Ref;

/// Handler props authored as `onXxx` and the event each one listens to.
const EVENT_LISTENER_PROPS: &[(&str, &str)] = &[
    ("onBlur", "blur"),
    ("onChange", "change"),
    ("onClick", "click"),
    ("onContextMenu", "contextmenu"),
    ("onDblClick", "dblclick"),
    ("onDrag", "drag"),
    ("onDragEnd", "dragend"),
    ("onDragEnter", "dragenter"),
    ("onDragLeave", "dragleave"),
    ("onDragOver", "dragover"),
    ("onDragStart", "dragstart"),
    ("onDrop", "drop"),
    ("onFocus", "focus"),
    ("onInput", "input"),
    ("onKeyDown", "keydown"),
    ("onKeyPress", "keypress"),
    ("onKeyUp", "keyup"),
    ("onMouseDown", "mousedown"),
    ("onMouseEnter", "mouseenter"),
    ("onMouseLeave", "mouseleave"),
    ("onMouseMove", "mousemove"),
    ("onMouseOut", "mouseout"),
    ("onMouseOver", "mouseover"),
    ("onMouseUp", "mouseup"),
    ("onScroll", "scroll"),
    ("onSubmit", "submit"),
    ("onWheel", "wheel"),
];

/// Event name for a known `onXxx` handler prop.
pub fn event_name_for_prop(prop: &str) -> Option<&'static str> {
    EVENT_LISTENER_PROPS
        .iter()
        .find(|(name, _)| *name == prop)
        .map(|(_, event)| *event)
}

/// A property value.
///
/// Values compare by value. `Map` is only meaningful for the nested `style`
/// and `dataset` bags; anywhere else it is set as a single value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Map(IndexMap<String, PropValue>),
}

impl PropValue {
    /// The empty string, used to reset properties before deleting them.
    pub fn empty() -> Self {
        PropValue::Str(String::new())
    }

    /// Build a map value from pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<PropValue>,
    {
        PropValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, PropValue>> {
        match self {
            PropValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("null"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Number(n) => write!(f, "{n}"),
            PropValue::Str(s) => f.write_str(s),
            PropValue::Map(map) => {
                let mut first = true;
                for (name, value) in map {
                    if !first {
                        f.write_str(" ")?;
                    }
                    first = false;
                    write!(f, "{name}: {value};")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

macro_rules! prop_from_integer {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(n: $ty) -> Self {
                PropValue::Number(n as f64)
            }
        })*
    };
}

prop_from_integer!(i32, i64, u32, u64, usize);

impl From<IndexMap<String, PropValue>> for PropValue {
    fn from(map: IndexMap<String, PropValue>) -> Self {
        PropValue::Map(map)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PropValue::Null, Into::into)
    }
}

type ListenerFn = dyn Fn(&Event, Option<&ComponentRef>);

/// An event listener. Listeners compare by identity, so re-rendering with the
/// same `Listener` value leaves the live listener alone.
#[derive(Clone)]
pub struct Listener(Rc<ListenerFn>);

impl Listener {
    /// A listener that ignores any owner context.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(move |event: &Event, _: Option<&ComponentRef>| f(event)))
    }

    /// A listener that receives the owner of the node it is attached to.
    /// It is skipped when the node has no owner context.
    pub fn contextual<F>(f: F) -> Self
    where
        F: Fn(&Event, &ComponentRef) + 'static,
    {
        Self(Rc::new(move |event: &Event, owner: Option<&ComponentRef>| {
            if let Some(owner) = owner {
                f(event, owner);
            }
        }))
    }

    /// Invoke the listener without context.
    pub fn call(&self, event: &Event) {
        (self.0)(event, None)
    }

    /// A new listener invoking this one with `owner` as context. The binding
    /// holds the owner weakly.
    pub(crate) fn bind(&self, owner: WeakComponentRef) -> Listener {
        let inner = Rc::clone(&self.0);
        Self(Rc::new(move |event: &Event, _: Option<&ComponentRef>| {
            match owner.upgrade() {
                Some(owner) => inner(event, Some(&owner)),
                None => inner(event, None),
            }
        }))
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Properties of a virtual node.
///
/// `key`, `ref` and `on` are reserved: they are stored apart from the
/// ordinary properties and never reach the generic property diff.
#[derive(Debug, Clone, Default)]
pub struct Props {
    attrs: IndexMap<String, PropValue>,
    key: Option<Key>,
    reference: Option<Ref>,
    on: IndexMap<String, Listener>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, builder style. See [`Props::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a property.
    ///
    /// `key` and `ref` are routed to their reserved slots, and `class` is an
    /// alias of `className`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        let name = name.into();
        let value = value.into();
        match name.as_str() {
            "key" => self.key = key_from_value(&value),
            "ref" => self.reference = value.as_str().map(Ref::named),
            "class" => {
                self.attrs.insert("className".to_owned(), value);
            }
            _ => {
                self.attrs.insert(name, value);
            }
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_ref(mut self, reference: impl Into<Ref>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Listen to `event` (e.g. `click`).
    pub fn on(mut self, event: impl Into<String>, listener: Listener) -> Self {
        self.on.insert(event.into(), listener);
        self
    }

    /// Listen through an `onXxx` handler prop such as `onClick`.
    ///
    /// Unknown handler names fall back to the lowercased name without the
    /// `on` prefix.
    pub fn with_handler(self, prop: &str, listener: Listener) -> Self {
        let event = match event_name_for_prop(prop) {
            Some(event) => event.to_owned(),
            None => {
                tracing::debug!(prop, "unknown handler prop, deriving event name");
                prop.strip_prefix("on").unwrap_or(prop).to_ascii_lowercase()
            }
        };
        self.on(event, listener)
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Ordinary properties in authoring order.
    pub fn attrs(&self) -> &IndexMap<String, PropValue> {
        &self.attrs
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn reference(&self) -> Option<&Ref> {
        self.reference.as_ref()
    }

    pub fn listeners(&self) -> &IndexMap<String, Listener> {
        &self.on
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.key.is_none() && self.reference.is_none() && self.on.is_empty()
    }
}

fn key_from_value(value: &PropValue) -> Option<Key> {
    match value {
        PropValue::Str(s) => Some(Key::from(s.as_str())),
        PropValue::Number(n) => Some(Key::from(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn reserved_names_are_routed() {
        let props = Props::new()
            .with("key", "row-1")
            .with("ref", "input")
            .with("class", "wide")
            .with("id", "main");

        assert_eq!(props.key(), Some(&Key::from("row-1")));
        assert_eq!(props.reference(), Some(&Ref::named("input")));
        assert_eq!(props.get("className"), Some(&PropValue::from("wide")));
        assert!(!props.contains("class"));
        assert!(!props.contains("key"));
        assert_eq!(props.attrs().len(), 2);
    }

    #[test]
    fn numeric_keys_match_integer_keys() {
        let props = Props::new().with("key", 3);
        assert_eq!(props.key(), Some(&Key::from(3usize)));
    }

    #[test]
    fn handler_props_map_to_events() {
        let listener = Listener::new(|_| {});
        let props = Props::new()
            .with_handler("onClick", listener.clone())
            .with_handler("onCustomThing", listener.clone());

        assert!(props.listeners().contains_key("click"));
        assert!(props.listeners().contains_key("customthing"));
        assert_eq!(event_name_for_prop("onDblClick"), Some("dblclick"));
    }

    #[test]
    fn listeners_compare_by_identity() {
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn contextual_listener_skips_without_owner() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let listener = Listener::contextual(move |_, _| seen.set(seen.get() + 1));

        listener.call(&Event::new("click", crate::platform::NodeHandle::new()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn map_values_display_as_declarations() {
        let style = PropValue::map([("color", "red"), ("width", "4px")]);
        assert_eq!(style.to_string(), "color: red; width: 4px;");
    }
}
