//! Canopy Core
//!
//! This crate provides the reconciliation engine for the Canopy UI runtime.
//! Given a description of the desired UI (a virtual tree) and the previously
//! rendered tree with its live nodes, it applies the mutations needed to make
//! the live nodes match, while keeping unchanged nodes in place and managing
//! nested stateful components.
//!
//! # Architecture
//!
//! - `vdom`: virtual nodes, properties and the `dom()` constructor
//! - `reconcile`: render, patch and remove, keyed child reconciliation and
//!   property/listener patching
//! - `refs`: named references and the reference stack
//! - `component`: the component contract and the runtime driving it
//! - `scheduler`: batching of updates into frames
//! - `platform`: the abstract output-node backend, plus an in-memory one
//!
//! # Example
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use canopy_core::{children, dom, Component, Props, Result, Runtime, VNode};
//! use canopy_core::platform::memory::MemoryPlatform;
//!
//! struct Greeting {
//!     name: String,
//! }
//!
//! impl Component for Greeting {
//!     fn render(&self) -> Result<VNode> {
//!         dom("p", Props::new().with("className", "greeting"), children!["Hello, ", &self.name])
//!     }
//! }
//!
//! let platform = Rc::new(MemoryPlatform::new());
//! let runtime = Runtime::new(platform.clone());
//! let greeting = runtime.mount(Greeting { name: "world".into() })?;
//!
//! greeting.with_mut(|g: &mut Greeting| g.name = "canopy".into());
//! runtime.update(&greeting)?;
//! runtime.perform_updates()?;
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod platform;
pub(crate) mod reconcile;
pub mod refs;
pub mod scheduler;
pub mod vdom;

pub use component::{
    Capabilities, Component, ComponentId, ComponentRef, ComponentTag, ComponentType,
    ElementRegistry, Lifecycle, Runtime, WeakComponentRef,
};
pub use config::{Config, ControlledProperty};
pub use error::{Error, Result};
pub use platform::{Event, NestedBag, NodeHandle, Platform};
pub use refs::{Ref, RefTable, RefTarget};
pub use scheduler::{Completion, FrameScheduler, Scheduler, Task, TaskScheduler};
pub use vdom::{dom, flatten, Child, ElementTag, Key, Listener, PropValue, Props, Tag, VNode};
