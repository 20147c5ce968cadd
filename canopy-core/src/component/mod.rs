//! Components
//!
//! A component is a stateful object that owns one live root node and
//! describes its content by rendering a [`VNode`] tree. The [`Runtime`]
//! associates the object with its root node, re-renders it on update and
//! destroys nested components when they leave the tree.
//!
//! # Contract
//!
//! [`Component::render`] is required. Everything else is optional and
//! declared once through [`Component::capabilities`]; the runtime caches the
//! declaration and never asks again.
//!
//! - `update`: receives new props and children from a parent render and
//!   decides whether to re-render. Components created from a
//!   [`ComponentTag`] must support it.
//! - `destroy`: runs exactly once when the component leaves the tree.
//! - `after_update`: `write_after_update` runs right after each patch,
//!   `read_after_update` is deferred to the scheduler's read phase. An
//!   update of the component requested from inside `write_after_update` is
//!   performed once the hook has returned.
//!
//! # Lifecycle
//!
//! `Uninitialized → Initialized → (Updating)* → Destroyed`. Updating is
//! reentrant (a parent patch can update its children synchronously) but a
//! component is never rendered while it is already being rendered.

mod registry;
mod runtime;

pub use registry::ElementRegistry;
pub use runtime::Runtime;

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::platform::NodeHandle;
use crate::refs::RefTable;
use crate::vdom::{Props, VNode};

/// Optional parts of the component contract a component implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts new props and children through [`Component::update`].
    pub update: bool,
    /// Has teardown work in [`Component::destroy`].
    pub destroy: bool,
    /// Wants the `*_after_update` hooks.
    pub after_update: bool,
}

impl Capabilities {
    /// Render only.
    pub const RENDER: Capabilities = Capabilities {
        update: false,
        destroy: false,
        after_update: false,
    };

    /// Render plus update and destroy, the usual set for nested components.
    pub const STATEFUL: Capabilities = Capabilities {
        update: true,
        destroy: true,
        after_update: false,
    };

    pub const fn with_after_update(mut self) -> Self {
        self.after_update = true;
        self
    }
}

/// A stateful UI component.
pub trait Component: 'static {
    /// Describe the component's content.
    fn render(&self) -> Result<VNode>;

    /// The optional hooks this component implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::RENDER
    }

    /// Receive new props and children from a parent render. Return `true` to
    /// request a re-render.
    fn update(&mut self, _props: &Props, _children: &[VNode]) -> bool {
        false
    }

    /// Release resources. Called once, when the component is destroyed.
    fn destroy(&mut self) {}

    /// Called synchronously after each successful patch.
    fn write_after_update(&mut self) {}

    /// Called from the scheduler's read phase after each successful patch.
    fn read_after_update(&self) {}
}

/// A component that can be instantiated from a [`ComponentTag`].
pub trait ComponentType: Component + Sized {
    /// Display name used in errors and logs.
    const NAME: &'static str;

    /// Build the component from the props and children of its virtual node.
    fn create(props: &Props, children: &[VNode]) -> Result<Self>;
}

/// Object-safe view of a component that can also be downcast.
trait AnyComponent: Component {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Unique identifier of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Where a component is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Updating,
    Destroyed,
}

/// Runtime bookkeeping for one component.
pub(crate) struct ComponentState {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) vnode: Option<VNode>,
    pub(crate) element: Option<NodeHandle>,
}

/// A component instance together with its runtime state.
pub struct ComponentCell {
    id: ComponentId,
    name: String,
    capabilities: Capabilities,
    refs: RefTable,
    component: RefCell<Box<dyn AnyComponent>>,
    state: RefCell<ComponentState>,
    rendering: Cell<bool>,
    in_write_hook: Cell<bool>,
    rerender_requested: Cell<bool>,
}

/// Holds a flag raised for as long as it is alive.
struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> FlagGuard<'a> {
    /// Raise `flag`, or return `None` when it is already raised.
    fn raise(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self { flag })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Shared handle to a component instance. Compares by identity.
#[derive(Clone)]
pub struct ComponentRef(Rc<ComponentCell>);

/// Weak counterpart of [`ComponentRef`].
#[derive(Clone)]
pub struct WeakComponentRef(Weak<ComponentCell>);

impl ComponentRef {
    /// Wrap a component. Its capabilities are read here, once.
    pub fn new<C: Component>(name: impl Into<String>, component: C) -> Self {
        let capabilities = component.capabilities();
        Self(Rc::new(ComponentCell {
            id: ComponentId::new(),
            name: name.into(),
            capabilities,
            refs: RefTable::new(),
            component: RefCell::new(Box::new(component)),
            state: RefCell::new(ComponentState {
                lifecycle: Lifecycle::Uninitialized,
                vnode: None,
                element: None,
            }),
            rendering: Cell::new(false),
            in_write_hook: Cell::new(false),
            rerender_requested: Cell::new(false),
        }))
    }

    pub fn id(&self) -> ComponentId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.0.capabilities
    }

    /// The component's named references.
    pub fn refs(&self) -> &RefTable {
        &self.0.refs
    }

    /// Live root node, once initialized.
    pub fn element(&self) -> Option<NodeHandle> {
        self.0.state.borrow().element
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.0.state.borrow().lifecycle
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// Run `f` with shared access to the concrete component.
    ///
    /// Returns `None` when the component is not a `C`.
    pub fn with<C: Component, R>(&self, f: impl FnOnce(&C) -> R) -> Option<R> {
        let component = self.0.component.borrow();
        component.as_any().downcast_ref::<C>().map(f)
    }

    /// Run `f` with exclusive access to the concrete component.
    pub fn with_mut<C: Component, R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        let mut component = self.0.component.borrow_mut();
        component.as_any_mut().downcast_mut::<C>().map(f)
    }

    pub fn downgrade(&self) -> WeakComponentRef {
        WeakComponentRef(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, ComponentState> {
        self.0.state.borrow_mut()
    }

    /// Render the component. Guards against rendering a component from
    /// inside its own render or while one of its hooks holds it.
    pub(crate) fn render(&self) -> Result<VNode> {
        let Some(_rendering) = FlagGuard::raise(&self.0.rendering) else {
            return Err(Error::contract(
                self.name(),
                "render was re-entered while the component was already rendering",
            ));
        };
        let component = self.0.component.try_borrow().map_err(|_| {
            Error::contract(self.name(), "rendered while one of its own hooks was running")
        })?;
        component.render()
    }

    /// Record an update requested from inside `write_after_update`. Returns
    /// `false` when the hook is not running.
    pub(crate) fn defer_update(&self) -> bool {
        if !self.0.in_write_hook.get() {
            return false;
        }
        self.0.rerender_requested.set(true);
        true
    }

    pub(crate) fn forward_update(&self, props: &Props, children: &[VNode]) -> bool {
        self.0.component.borrow_mut().update(props, children)
    }

    pub(crate) fn run_destroy(&self) {
        if self.0.capabilities.destroy {
            self.0.component.borrow_mut().destroy();
        }
    }

    /// Run `write_after_update`. Returns whether the hook requested an
    /// update of this component.
    pub(crate) fn run_write_after_update(&self) -> bool {
        if !self.0.capabilities.after_update {
            return false;
        }
        self.0.rerender_requested.set(false);
        if let Some(_hook) = FlagGuard::raise(&self.0.in_write_hook) {
            self.0.component.borrow_mut().write_after_update();
        }
        self.0.rerender_requested.replace(false)
    }

    pub(crate) fn run_read_after_update(&self) {
        if self.0.capabilities.after_update {
            self.0.component.borrow().read_after_update();
        }
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ComponentRef {}

impl Hash for ComponentRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .finish()
    }
}

impl WeakComponentRef {
    pub fn upgrade(&self) -> Option<ComponentRef> {
        self.0.upgrade().map(ComponentRef)
    }
}

impl fmt::Debug for WeakComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakComponentRef")
    }
}

/// Stateless render function used by [`ComponentTag::stateless`].
pub type RenderFn = fn(&Props, &[VNode]) -> Result<VNode>;

type Factory = Rc<dyn Fn(&Props, &[VNode]) -> Result<ComponentRef>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagIdentity {
    Type(TypeId),
    Function(&'static str, usize),
}

/// Reference to a component constructor, the tag of a component node.
///
/// Two tags are identical when they construct the same component type. Two
/// stateless tags are identical when both their names and their render
/// functions match. Function addresses alone are not reliable: the compiler
/// may merge functions with identical bodies, so name distinct stateless
/// components distinctly.
#[derive(Clone)]
pub struct ComponentTag {
    identity: TagIdentity,
    name: &'static str,
    factory: Factory,
}

impl ComponentTag {
    /// The tag constructing `C`.
    pub fn of<C: ComponentType>() -> Self {
        Self {
            identity: TagIdentity::Type(TypeId::of::<C>()),
            name: C::NAME,
            factory: Rc::new(|props: &Props, children: &[VNode]| {
                let component = C::create(props, children)?;
                Ok(ComponentRef::new(C::NAME, component))
            }),
        }
    }

    /// A tag for a function of props and children.
    pub fn stateless(name: &'static str, render: RenderFn) -> Self {
        Self {
            identity: TagIdentity::Function(name, render as usize),
            name,
            factory: Rc::new(move |props: &Props, children: &[VNode]| {
                Ok(ComponentRef::new(
                    name,
                    Stateless {
                        props: props.clone(),
                        children: children.to_vec(),
                        render,
                    },
                ))
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn instantiate(&self, props: &Props, children: &[VNode]) -> Result<ComponentRef> {
        (self.factory)(props, children)
    }
}

impl PartialEq for ComponentTag {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Debug for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentTag").field(&self.name).finish()
    }
}

/// Component wrapping a stateless render function.
struct Stateless {
    props: Props,
    children: Vec<VNode>,
    render: RenderFn,
}

impl Component for Stateless {
    fn render(&self) -> Result<VNode> {
        (self.render)(&self.props, &self.children)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update: true,
            ..Capabilities::RENDER
        }
    }

    fn update(&mut self, props: &Props, children: &[VNode]) -> bool {
        self.props = props.clone();
        self.children = children.to_vec();
        true
    }
}
