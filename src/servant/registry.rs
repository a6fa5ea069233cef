//! Identity → servant map owned by one object adapter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{RegistryError, Servant};
use crate::identity::Identity;

/// Per-adapter servant registry.
///
/// # Concurrency Model
/// The map is sharded, so `add`/`remove`/`find` on different identities do not
/// contend, while operations on the same identity are atomic with respect to
/// each other. The registry holds the only long-lived strong reference to each
/// servant; `find` hands out a clone that lives for one dispatch.
#[derive(Default)]
pub struct ServantRegistry {
    servants: DashMap<Identity, Arc<dyn Servant>>,
    defaults: DashMap<String, Arc<dyn Servant>>,
}

impl fmt::Debug for ServantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServantRegistry")
            .field("servants", &self.servants.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

impl ServantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `servant` under `identity`.
    pub fn add(&self, identity: Identity, servant: Arc<dyn Servant>) -> Result<(), RegistryError> {
        if !identity.is_valid() {
            return Err(RegistryError::IllegalIdentity(identity));
        }
        match self.servants.entry(identity) {
            Entry::Occupied(entry) => Err(RegistryError::IdentityAlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(identity = %entry.key(), "Servant added");
                entry.insert(servant);
                Ok(())
            }
        }
    }

    /// Removes and returns the servant registered under `identity`.
    pub fn remove(&self, identity: &Identity) -> Result<Arc<dyn Servant>, RegistryError> {
        match self.servants.remove(identity) {
            Some((_, servant)) => {
                debug!(%identity, "Servant removed");
                Ok(servant)
            }
            None => Err(RegistryError::IdentityNotFound(identity.clone())),
        }
    }

    /// Looks up the servant for `identity`, falling back to the default servant
    /// of its category and then to the catch-all default servant (category `""`).
    pub fn find(&self, identity: &Identity) -> Option<Arc<dyn Servant>> {
        self.find_exact(identity)
            .or_else(|| self.find_default(&identity.category))
            .or_else(|| self.find_default(""))
    }

    /// Looks up `identity` without default-servant fallback.
    pub fn find_exact(&self, identity: &Identity) -> Option<Arc<dyn Servant>> {
        self.servants.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    pub fn add_default_servant(&self, category: impl Into<String>, servant: Arc<dyn Servant>) -> Result<(), RegistryError> {
        match self.defaults.entry(category.into()) {
            Entry::Occupied(entry) => Err(RegistryError::DefaultServantAlreadyRegistered(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(category = %entry.key(), "Default servant added");
                entry.insert(servant);
                Ok(())
            }
        }
    }

    pub fn remove_default_servant(&self, category: &str) -> Result<Arc<dyn Servant>, RegistryError> {
        self.defaults
            .remove(category)
            .map(|(_, servant)| servant)
            .ok_or_else(|| RegistryError::DefaultServantNotFound(category.to_string()))
    }

    pub fn find_default(&self, category: &str) -> Option<Arc<dyn Servant>> {
        self.defaults.get(category).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of identities with a dedicated servant.
    pub fn len(&self) -> usize {
        self.servants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servants.is_empty()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.servants.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops every servant and default servant.
    pub fn clear(&self) {
        self.servants.clear();
        self.defaults.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::ApplicationException;
    use crate::servant::Current;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Tagged(&'static str);

    #[async_trait]
    impl Servant for Tagged {
        async fn dispatch(&self, _current: &Current, _args: Value) -> Result<Value, ApplicationException> {
            Ok(json!(self.0))
        }
    }

    fn tagged(tag: &'static str) -> Arc<dyn Servant> {
        Arc::new(Tagged(tag))
    }

    #[test]
    fn add_then_find_returns_same_servant() {
        let registry = ServantRegistry::new();
        let servant = tagged("a");
        registry.add(Identity::named("test"), Arc::clone(&servant)).unwrap();

        let found = registry.find(&Identity::named("test")).expect("servant should be found");
        assert!(Arc::ptr_eq(&found, &servant));
    }

    #[test]
    fn remove_then_find_is_absent() {
        let registry = ServantRegistry::new();
        let servant = tagged("a");
        registry.add(Identity::named("test"), Arc::clone(&servant)).unwrap();

        let removed = registry.remove(&Identity::named("test")).unwrap();
        assert!(Arc::ptr_eq(&removed, &servant));
        assert!(registry.find(&Identity::named("test")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn double_add_fails() {
        let registry = ServantRegistry::new();
        registry.add(Identity::named("test"), tagged("a")).unwrap();

        let err = registry.add(Identity::named("test"), tagged("b")).unwrap_err();
        assert_eq!(err, RegistryError::IdentityAlreadyRegistered(Identity::named("test")));

        // re-adding after a remove is fine
        registry.remove(&Identity::named("test")).unwrap();
        registry.add(Identity::named("test"), tagged("b")).unwrap();
    }

    #[test]
    fn remove_missing_fails() {
        let registry = ServantRegistry::new();
        let err = registry.remove(&Identity::named("ghost")).err();
        assert_eq!(err, Some(RegistryError::IdentityNotFound(Identity::named("ghost"))));
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = ServantRegistry::new();
        let err = registry.add(Identity::new("", "cat"), tagged("a")).unwrap_err();
        assert!(matches!(err, RegistryError::IllegalIdentity(_)));
    }

    #[test]
    fn default_servants_back_up_missing_identities() {
        let registry = ServantRegistry::new();
        let exact = tagged("exact");
        let by_category = tagged("category");
        let catch_all = tagged("catch-all");

        registry.add(Identity::new("one", "files"), Arc::clone(&exact)).unwrap();
        registry.add_default_servant("files", Arc::clone(&by_category)).unwrap();
        registry.add_default_servant("", Arc::clone(&catch_all)).unwrap();

        let found = registry.find(&Identity::new("one", "files")).unwrap();
        assert!(Arc::ptr_eq(&found, &exact));
        let found = registry.find(&Identity::new("two", "files")).unwrap();
        assert!(Arc::ptr_eq(&found, &by_category));
        let found = registry.find(&Identity::new("two", "other")).unwrap();
        assert!(Arc::ptr_eq(&found, &catch_all));
        assert!(registry.find_exact(&Identity::new("two", "files")).is_none());

        assert!(registry.add_default_servant("files", tagged("again")).is_err());
        registry.remove_default_servant("files").unwrap();
        assert!(registry.remove_default_servant("files").is_err());
    }

    #[test]
    fn concurrent_adds_on_one_identity_admit_exactly_one() {
        let registry = Arc::new(ServantRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.add(Identity::named("race"), tagged("x")).is_ok())
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }
}
