//! Component Runtime
//!
//! The runtime owns the platform, the scheduler and the configuration, and
//! drives every component through its lifecycle.
//!
//! # Synchronous and scheduled work
//!
//! [`Runtime::update`] and [`Runtime::destroy`] normally queue their work with
//! the scheduler and return a [`Completion`]. Requests for the same component
//! within one batch are coalesced.
//!
//! While a synchronous update is running (a parent patch updating a child,
//! or an after-update hook requesting another update) new requests are
//! performed immediately instead. The same holds for destruction requests
//! made while a destruction is running. Two counters, each held by a guard
//! for the duration of the synchronous call, track this.
//!
//! A component asking for its own update from `write_after_update` is
//! re-rendered as soon as the hook returns, before the outer `update_sync`
//! returns.
//!
//! A component is destroyed at most once. Destroying a component cancels its
//! pending update, and scheduled updates of destroyed components are skipped.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, instrument};

use super::registry::ElementRegistry;
use super::{Component, ComponentId, ComponentRef, ComponentTag, Lifecycle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::{NodeHandle, Platform};
use crate::reconcile::{self, RenderContext};
use crate::scheduler::{self, Completion, FrameScheduler, Scheduler};
use crate::vdom::{dom, equivalent, Child, NodeKind, Props, VNode};

struct RuntimeInner {
    platform: Rc<dyn Platform>,
    config: Config,
    scheduler: RefCell<Rc<dyn Scheduler>>,
    pending: RefCell<HashSet<ComponentId>>,
    sync_updates: Cell<usize>,
    sync_destructions: Cell<usize>,
    registry: RefCell<ElementRegistry>,
}

/// Drives components against a platform. Cloning yields another handle to
/// the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Increments a counter for as long as it is alive.
struct DepthGuard<'a> {
    counter: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self { counter }
    }

    fn depth(&self) -> usize {
        self.counter.get()
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get() - 1);
    }
}

fn short_type_name<C>() -> &'static str {
    let full = type_name::<C>();
    full.rsplit("::").next().unwrap_or(full)
}

impl Runtime {
    /// A runtime with the default configuration and a [`FrameScheduler`].
    pub fn new(platform: Rc<dyn Platform>) -> Self {
        Self::with_config(platform, Config::default())
    }

    pub fn with_config(platform: Rc<dyn Platform>, config: Config) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                platform,
                config,
                scheduler: RefCell::new(Rc::new(FrameScheduler::new())),
                pending: RefCell::new(HashSet::new()),
                sync_updates: Cell::new(0),
                sync_destructions: Cell::new(0),
                registry: RefCell::new(ElementRegistry::new()),
            }),
        }
    }

    pub fn platform(&self) -> &dyn Platform {
        &*self.inner.platform
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.inner.scheduler.borrow().clone()
    }

    /// Replace the scheduler. Work queued with the previous one stays there.
    pub fn set_scheduler(&self, scheduler: Rc<dyn Scheduler>) {
        *self.inner.scheduler.borrow_mut() = scheduler;
    }

    /// Run a scheduled batch now.
    pub fn perform_updates(&self) -> Result<()> {
        self.scheduler().perform_updates()
    }

    /// Wrap `component` and initialize it.
    pub fn mount<C: Component>(&self, component: C) -> Result<ComponentRef> {
        let component = ComponentRef::new(short_type_name::<C>(), component);
        self.initialize(&component)?;
        Ok(component)
    }

    /// Render a component for the first time and associate it with its root
    /// node.
    #[instrument(skip_all, fields(component = %component.name()))]
    pub fn initialize(&self, component: &ComponentRef) -> Result<NodeHandle> {
        if component.lifecycle() != Lifecycle::Uninitialized {
            return Err(Error::contract(
                component.name(),
                "a component can only be initialized once",
            ));
        }
        let mut cx = RenderContext::new(self);
        self.build(&mut cx, component)
    }

    pub(crate) fn build(&self, cx: &mut RenderContext<'_>, component: &ComponentRef) -> Result<NodeHandle> {
        let mut tree = component.render()?;
        let element = reconcile::render(&mut cx.enter(component), &mut tree)?;

        let mut state = component.state_mut();
        state.vnode = Some(tree);
        state.element = Some(element);
        state.lifecycle = Lifecycle::Initialized;
        debug!(component = %component.name(), element = element.raw(), "component initialized");
        Ok(element)
    }

    /// Create the component behind a component node.
    pub(crate) fn instantiate(
        &self,
        tag: &ComponentTag,
        props: &Props,
        children: &[VNode],
    ) -> Result<ComponentRef> {
        let component = tag.instantiate(props, children)?;
        if !component.capabilities().update {
            return Err(Error::contract(
                tag.name(),
                "components rendered from a tag must implement `update`",
            ));
        }
        Ok(component)
    }

    /// Request an update. Performed immediately during a synchronous update,
    /// otherwise queued (once per batch) with the scheduler.
    pub fn update(&self, component: &ComponentRef) -> Result<Completion> {
        if component.defer_update() {
            debug!(component = %component.name(), "update requested by its write hook");
            return Ok(scheduler::ready());
        }
        if self.inner.sync_updates.get() > 0 {
            self.update_sync(component)?;
            return Ok(scheduler::ready());
        }

        let scheduler = self.scheduler();
        if self.inner.pending.borrow_mut().insert(component.id()) {
            let runtime = Rc::downgrade(&self.inner);
            let component = component.clone();
            scheduler.update_document(Box::new(move || {
                let Some(runtime) = upgrade(&runtime) else {
                    return Ok(());
                };
                runtime.inner.pending.borrow_mut().remove(&component.id());
                runtime.update_sync(&component)
            }));
        } else {
            debug!(component = %component.name(), "update already pending");
        }
        Ok(scheduler.next_update())
    }

    /// Re-render `component` and patch its live nodes now.
    ///
    /// The root node must stay equivalent across renders; otherwise
    /// [`Error::RootIdentity`] is returned and nothing is mutated. On any
    /// error the previous tree is kept.
    #[instrument(skip_all, fields(component = %component.name()))]
    pub fn update_sync(&self, component: &ComponentRef) -> Result<()> {
        match component.lifecycle() {
            Lifecycle::Initialized => {}
            Lifecycle::Destroyed => {
                debug!("skipping update of destroyed component");
                return Ok(());
            }
            Lifecycle::Uninitialized => {
                return Err(Error::contract(
                    component.name(),
                    "updated before it was initialized",
                ));
            }
            Lifecycle::Updating => {
                return Err(Error::contract(
                    component.name(),
                    "updated while its own update was in progress",
                ));
            }
        }

        let _sync = DepthGuard::enter(&self.inner.sync_updates);
        let mut tree = component.render()?;
        let previous = component.state_mut().vnode.take().ok_or(Error::Unrendered)?;

        if !equivalent(&previous, &tree) {
            let err = Error::RootIdentity {
                component: component.name().to_owned(),
                expected: previous.tag_label(),
                found: tree.tag_label(),
            };
            component.state_mut().vnode = Some(previous);
            return Err(err);
        }

        component.state_mut().lifecycle = Lifecycle::Updating;
        let result = {
            let mut cx = RenderContext::new(self);
            let mut scope = cx.enter(component);
            reconcile::patch(&mut scope, &previous, &mut tree)
        };

        {
            let mut state = component.state_mut();
            if state.lifecycle == Lifecycle::Updating {
                state.lifecycle = Lifecycle::Initialized;
            }
            match result {
                Ok(element) => {
                    state.vnode = Some(tree);
                    state.element = Some(element);
                }
                Err(err) => {
                    state.vnode = Some(previous);
                    return Err(err);
                }
            }
        }

        self.after_update(component)
    }

    fn after_update(&self, component: &ComponentRef) -> Result<()> {
        if !component.capabilities().after_update {
            return Ok(());
        }
        let rerender = component.run_write_after_update();

        let reader = component.clone();
        self.scheduler().read_document(Box::new(move || {
            if !reader.is_destroyed() {
                reader.run_read_after_update();
            }
            Ok(())
        }));

        if rerender {
            self.update_sync(component)?;
        }
        Ok(())
    }

    /// Request destruction. Performed immediately during a synchronous update
    /// or destruction, otherwise queued with the scheduler.
    pub fn destroy(&self, component: &ComponentRef) -> Completion {
        if self.inner.sync_updates.get() > 0 || self.inner.sync_destructions.get() > 0 {
            self.destroy_sync(component);
            return scheduler::ready();
        }

        let scheduler = self.scheduler();
        let runtime = Rc::downgrade(&self.inner);
        let component = component.clone();
        scheduler.update_document(Box::new(move || {
            if let Some(runtime) = upgrade(&runtime) {
                runtime.destroy_sync(&component);
            }
            Ok(())
        }));
        scheduler.next_update()
    }

    /// Destroy `component` and every component nested in its tree.
    ///
    /// The root node is detached only by the outermost destruction; nested
    /// components go away with their ancestor's node.
    #[instrument(skip_all, fields(component = %component.name()))]
    pub fn destroy_sync(&self, component: &ComponentRef) {
        if component.is_destroyed() {
            return;
        }
        let destructions = DepthGuard::enter(&self.inner.sync_destructions);
        self.inner.pending.borrow_mut().remove(&component.id());

        let (tree, element) = {
            let mut state = component.state_mut();
            state.lifecycle = Lifecycle::Destroyed;
            (state.vnode.take(), state.element)
        };

        component.run_destroy();
        if let Some(tree) = &tree {
            self.destroy_nested(tree);
        }
        if destructions.depth() == 1 {
            if let Some(element) = element {
                self.platform().remove(element);
            }
        }
        component.refs().clear();
        debug!("component destroyed");
    }

    fn destroy_nested(&self, node: &VNode) {
        match node.kind() {
            NodeKind::Component(_) => {
                if let Some(child) = node.instance() {
                    self.destroy_sync(child);
                }
            }
            _ => {
                for child in node.children() {
                    self.destroy_nested(child);
                }
            }
        }
    }

    /// Render a free-standing tree. Named references in it are not recorded.
    pub fn render(&self, tree: &mut VNode) -> Result<NodeHandle> {
        let mut cx = RenderContext::new(self);
        reconcile::render(&mut cx, tree)
    }

    /// Patch a free-standing tree rendered with [`Runtime::render`].
    pub fn patch(&self, old: &VNode, new: &mut VNode) -> Result<NodeHandle> {
        let mut cx = RenderContext::new(self);
        reconcile::patch(&mut cx, old, new)
    }

    /// Remove a free-standing tree, destroying its components.
    pub fn remove(&self, tree: &VNode) {
        let mut cx = RenderContext::new(self);
        reconcile::remove(&mut cx, tree, true);
    }

    pub fn register_element(&self, name: &str, tag: ComponentTag) -> Result<()> {
        self.inner.registry.borrow_mut().register(name, tag)
    }

    pub fn unregister_element(&self, name: &str) -> Result<ComponentTag> {
        self.inner.registry.borrow_mut().unregister(name)
    }

    /// Build a component node for a registered element name.
    pub fn element(&self, name: &str, props: Props, children: Vec<Child>) -> Result<VNode> {
        let tag = self.inner.registry.borrow().lookup(name)?;
        dom(tag, props, children)
    }
}

fn upgrade(runtime: &Weak<RuntimeInner>) -> Option<Runtime> {
    runtime.upgrade().map(|inner| Runtime { inner })
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.pending.borrow().len())
            .field("sync_updates", &self.inner.sync_updates.get())
            .field("sync_destructions", &self.inner.sync_destructions.get())
            .finish()
    }
}
