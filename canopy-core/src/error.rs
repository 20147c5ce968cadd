//! Error types
//!
//! Every failure in this crate is a programmer error surfaced at the call site
//! that discovered it. Nothing here is transient, so nothing is retried.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciliation and runtime errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A component does not satisfy the contract required by the call.
    #[error("component `{component}` violates the component contract: {message}")]
    Contract { component: String, message: String },

    /// A child value that cannot be turned into a virtual node.
    #[error("invalid child node: {0}")]
    InvalidChild(String),

    /// The root tag of a component changed between renders.
    #[error(
        "component `{component}` changed its root node from `{expected}` to `{found}`; \
         the root node type of a component cannot change"
    )]
    RootIdentity {
        component: String,
        expected: String,
        found: String,
    },

    /// A named element was registered again without unregistering it first.
    #[error(
        "already registered element `{0}`; unregister the previous element \
         before registering another one with the same name"
    )]
    DuplicateRegistration(String),

    /// A named element was unregistered twice.
    #[error("already unregistered element `{0}`")]
    AlreadyUnregistered(String),

    /// No element is registered under this name.
    #[error("no element registered as `{0}`")]
    NotRegistered(String),

    /// Two siblings share a key while strict key checking is enabled.
    #[error("duplicate key `{0}` among siblings")]
    DuplicateKey(String),

    /// A tree was patched or removed before it was ever rendered.
    #[error("virtual node has not been rendered")]
    Unrendered,

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn contract(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Contract {
            component: component.into(),
            message: message.into(),
        }
    }
}
