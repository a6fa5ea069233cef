//! Error types for servant registration.

use thiserror::Error;

use crate::identity::Identity;

/// Misuse of a [`ServantRegistry`](super::ServantRegistry). Reported
/// immediately and never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    /// A servant is already registered under this identity.
    #[error("identity already registered: {0}")]
    IdentityAlreadyRegistered(Identity),

    /// No servant is registered under this identity.
    #[error("identity not found: {0}")]
    IdentityNotFound(Identity),

    /// Identities with an empty name cannot be registered.
    #[error("illegal identity: {0:?}")]
    IllegalIdentity(Identity),

    #[error("default servant already registered for category `{0}`")]
    DefaultServantAlreadyRegistered(String),

    #[error("no default servant for category `{0}`")]
    DefaultServantNotFound(String),
}
