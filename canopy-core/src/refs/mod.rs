//! References
//!
//! A component gets hold of the live nodes (and child components) it renders
//! through named references. Each component owns a [`RefTable`]; nodes that
//! carry a `ref` prop register themselves into the table of the component
//! currently being built or patched.
//!
//! # The Reference Stack
//!
//! Which table is "current" is tracked by a [`RefStack`]. Initializing or
//! updating a component pushes its table; nodes created while it is on top
//! register into it. Nested components push their own table on top and pop
//! it when done. The stack is an explicit value threaded through the
//! reconciler, never a global. The reconciler pairs every push with a pop in
//! a drop guard, so an error in the middle of a render cannot leave a stale
//! table behind.
//!
//! # Forms
//!
//! - A plain name: `table["input"] = node`.
//! - A nested path, `"fields/name"` or `"fields[name]"`: intermediate maps
//!   are created on demand and pruned once their last leaf is gone.
//! - A callback: invoked with the target when attached and with `None` when
//!   detached.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::component::ComponentRef;
use crate::platform::NodeHandle;

/// What a reference points at.
#[derive(Debug, Clone)]
pub enum RefTarget {
    Node(NodeHandle),
    Component(ComponentRef),
}

impl RefTarget {
    pub fn node(&self) -> Option<NodeHandle> {
        match self {
            RefTarget::Node(node) => Some(*node),
            RefTarget::Component(_) => None,
        }
    }

    pub fn component(&self) -> Option<&ComponentRef> {
        match self {
            RefTarget::Component(component) => Some(component),
            RefTarget::Node(_) => None,
        }
    }
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefTarget::Node(a), RefTarget::Node(b)) => a == b,
            (RefTarget::Component(a), RefTarget::Component(b)) => a == b,
            _ => false,
        }
    }
}

/// Segments of a reference name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefPath(SmallVec<[String; 2]>);

impl RefPath {
    /// Parse `a`, `a/b` or `a[b][c]`. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split(['/', '[', ']'])
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect();
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_nested(&self) -> bool {
        self.0.len() > 1
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

type RefCallbackFn = dyn Fn(Option<&RefTarget>);

/// A callback reference. Compares by identity.
#[derive(Clone)]
pub struct RefCallback(Rc<RefCallbackFn>);

impl RefCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&RefTarget>) + 'static,
    {
        Self(Rc::new(f))
    }

    fn call(&self, target: Option<&RefTarget>) {
        (self.0)(target)
    }
}

impl PartialEq for RefCallback {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for RefCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefCallback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// The value of a `ref` prop.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref {
    Name(RefPath),
    Callback(RefCallback),
}

impl Ref {
    pub fn named(path: &str) -> Self {
        Ref::Name(RefPath::parse(path))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Option<&RefTarget>) + 'static,
    {
        Ref::Callback(RefCallback::new(f))
    }

    /// Register `target` under this reference.
    pub(crate) fn attach(&self, table: Option<&RefTable>, target: &RefTarget) {
        match self {
            Ref::Callback(callback) => callback.call(Some(target)),
            Ref::Name(path) => match table {
                Some(table) => table.insert(path, target.clone()),
                None => tracing::trace!(%path, "no reference table for named ref"),
            },
        }
    }

    /// Unregister `target`. Named entries are only removed while they still
    /// point at `target`.
    pub(crate) fn detach(&self, table: Option<&RefTable>, target: &RefTarget) {
        match self {
            Ref::Callback(callback) => callback.call(None),
            Ref::Name(path) => {
                if let Some(table) = table {
                    table.remove_if(path, target);
                }
            }
        }
    }
}

impl From<&str> for Ref {
    fn from(path: &str) -> Self {
        Ref::named(path)
    }
}

impl From<String> for Ref {
    fn from(path: String) -> Self {
        Ref::named(&path)
    }
}

impl From<RefCallback> for Ref {
    fn from(callback: RefCallback) -> Self {
        Ref::Callback(callback)
    }
}

/// Move a reference from its old form to its new one.
///
/// Nothing happens when both are equal; otherwise the old form is detached
/// before the new one is attached.
pub(crate) fn update_ref(
    table: Option<&RefTable>,
    old: Option<&Ref>,
    new: Option<&Ref>,
    target: &RefTarget,
) {
    if old == new {
        return;
    }
    if let Some(old) = old {
        old.detach(table, target);
    }
    if let Some(new) = new {
        new.attach(table, target);
    }
}

/// An entry in a reference table.
#[derive(Debug, Clone, PartialEq)]
pub enum RefValue {
    Target(RefTarget),
    Nested(IndexMap<String, RefValue>),
}

/// A component's named references. Cloning yields another handle to the
/// same table.
#[derive(Debug, Clone, Default)]
pub struct RefTable(Rc<RefCell<IndexMap<String, RefValue>>>);

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a reference by name or path.
    pub fn get(&self, path: &str) -> Option<RefTarget> {
        let path = RefPath::parse(path);
        let map = self.0.borrow();
        let (last, parents) = path.segments().split_last()?;
        let mut level = &*map;
        for segment in parents {
            match level.get(segment)? {
                RefValue::Nested(inner) => level = inner,
                RefValue::Target(_) => return None,
            }
        }
        match level.get(last)? {
            RefValue::Target(target) => Some(target.clone()),
            RefValue::Nested(_) => None,
        }
    }

    pub fn node(&self, path: &str) -> Option<NodeHandle> {
        self.get(path).and_then(|target| target.node())
    }

    pub fn component(&self, path: &str) -> Option<ComponentRef> {
        self.get(path).and_then(|target| target.component().cloned())
    }

    pub fn contains(&self, path: &str) -> bool {
        let path = RefPath::parse(path);
        let map = self.0.borrow();
        let mut level = &*map;
        for (i, segment) in path.segments().iter().enumerate() {
            match level.get(segment) {
                None => return false,
                Some(RefValue::Nested(inner)) => level = inner,
                Some(RefValue::Target(_)) => return i + 1 == path.segments().len(),
            }
        }
        !path.segments().is_empty()
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &RefTable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn insert(&self, path: &RefPath, target: RefTarget) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };
        let mut map = self.0.borrow_mut();
        let mut level = &mut *map;
        for segment in parents {
            let entry = level
                .entry(segment.clone())
                .or_insert_with(|| RefValue::Nested(IndexMap::new()));
            if let RefValue::Target(_) = entry {
                *entry = RefValue::Nested(IndexMap::new());
            }
            let RefValue::Nested(inner) = entry else {
                return;
            };
            level = inner;
        }
        level.insert(last.clone(), RefValue::Target(target));
    }

    /// Remove the entry at `path` if it still points at `target`, pruning
    /// intermediate maps left empty. Returns whether anything was removed.
    pub(crate) fn remove_if(&self, path: &RefPath, target: &RefTarget) -> bool {
        remove_at(&mut self.0.borrow_mut(), path.segments(), target)
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

fn remove_at(level: &mut IndexMap<String, RefValue>, segments: &[String], target: &RefTarget) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return match level.get(first) {
            Some(RefValue::Target(current)) if current == target => {
                level.shift_remove(first);
                true
            }
            _ => false,
        };
    }
    let Some(RefValue::Nested(inner)) = level.get_mut(first) else {
        return false;
    };
    let removed = remove_at(inner, rest, target);
    if removed && inner.is_empty() {
        level.shift_remove(first);
    }
    removed
}

/// LIFO stack of reference tables. The top belongs to the component being
/// initialized or patched.
#[derive(Debug, Default)]
pub struct RefStack {
    tables: Vec<RefTable>,
}

impl RefStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: RefTable) {
        self.tables.push(table);
    }

    pub fn pop(&mut self) -> Option<RefTable> {
        self.tables.pop()
    }

    pub fn top(&self) -> Option<&RefTable> {
        self.tables.last()
    }

    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    /// Register a newly created node or component.
    pub fn hook(&self, reference: &Ref, target: &RefTarget) {
        reference.attach(self.top(), target);
    }

    /// Unregister a destroyed node or component.
    pub fn unhook(&self, reference: &Ref, target: &RefTarget) {
        reference.detach(self.top(), target);
    }
}
