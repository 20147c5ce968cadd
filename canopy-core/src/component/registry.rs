//! Named component registry.
//!
//! Lets trees refer to components by a registered element name, e.g.
//! `runtime.element("todo-item", props, children)`.

use indexmap::IndexMap;

use super::ComponentTag;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
enum Registration {
    Active(ComponentTag),
    Unregistered,
}

/// Maps element names to component tags.
///
/// A name stays reserved once registered: registering it again requires
/// unregistering it first, and it can only be unregistered once per
/// registration.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    entries: IndexMap<String, Registration>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, tag: ComponentTag) -> Result<()> {
        if let Some(Registration::Active(_)) = self.entries.get(name) {
            return Err(Error::DuplicateRegistration(name.to_owned()));
        }
        tracing::debug!(name, component = tag.name(), "element registered");
        self.entries
            .insert(name.to_owned(), Registration::Active(tag));
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<ComponentTag> {
        match self.entries.get_mut(name) {
            None => Err(Error::NotRegistered(name.to_owned())),
            Some(Registration::Unregistered) => Err(Error::AlreadyUnregistered(name.to_owned())),
            Some(entry) => match std::mem::replace(entry, Registration::Unregistered) {
                Registration::Active(tag) => Ok(tag),
                Registration::Unregistered => Err(Error::AlreadyUnregistered(name.to_owned())),
            },
        }
    }

    pub fn lookup(&self, name: &str) -> Result<ComponentTag> {
        match self.entries.get(name) {
            Some(Registration::Active(tag)) => Ok(tag.clone()),
            _ => Err(Error::NotRegistered(name.to_owned())),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Registration::Active(_)))
    }

    /// Names currently registered, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(name, registration)| match registration {
            Registration::Active(_) => Some(name.as_str()),
            Registration::Unregistered => None,
        })
    }
}
