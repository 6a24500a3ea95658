//! The operations exposed to the HTTP layer and the CLI.
//!
//! Every call takes the acting [`Principal`] explicitly and asks the
//! configured [`AuthorizationPolicy`] before touching the store or the
//! archive tree. Validation and authorization run before any write.

mod accounts;
mod action;
mod catalog;
mod files;
mod import;
mod indexes;

pub use action::{Action, ActionOutcome};
pub use indexes::IndexSummary;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::CredentialHasher;
use crate::error::{Error, Result};
use crate::security::{AuthorizationPolicy, RoleResolver};
use crate::storage::ArchiveStorage;
use crate::store::Store;
use crate::types::role::READ_ROLES;
use crate::types::{Distribution, Principal, RoleSet};

pub struct Registry {
    store: Arc<dyn Store>,
    storage: ArchiveStorage,
    resolver: RoleResolver,
    policy: Arc<dyn AuthorizationPolicy>,
    hasher: CredentialHasher,
    self_register: bool,
    /// Held for the whole of an upstream import.
    imports: Mutex<()>,
}

impl Registry {
    pub fn new(
        store: Arc<dyn Store>,
        storage: ArchiveStorage,
        policy: Arc<dyn AuthorizationPolicy>,
    ) -> Self {
        Self {
            resolver: RoleResolver::new(store.clone()),
            store,
            storage,
            policy,
            hasher: CredentialHasher::new(),
            self_register: false,
            imports: Mutex::new(()),
        }
    }

    /// Enables or disables self-registration of new users.
    #[must_use]
    pub fn with_self_register(mut self, enabled: bool) -> Self {
        self.self_register = enabled;
        self
    }

    #[must_use]
    pub fn storage(&self) -> &ArchiveStorage {
        &self.storage
    }

    /// The effective roles of `principal`, globally or on one distribution.
    pub fn roles(&self, principal: &Principal, distro_id: Option<&str>) -> Result<RoleSet> {
        self.resolver.resolve(principal, distro_id, false)
    }

    fn permits(
        &self,
        principal: &Principal,
        distro_id: Option<&str>,
        required: &[&str],
    ) -> Result<bool> {
        self.policy
            .permits(&self.resolver, principal, distro_id, required)
    }

    /// Fails with `PermissionDenied` naming `resource` unless the policy allows.
    fn require(
        &self,
        principal: &Principal,
        distro_id: Option<&str>,
        required: &[&str],
        resource: &str,
    ) -> Result<()> {
        if self.permits(principal, distro_id, required)? {
            Ok(())
        } else {
            Err(Error::denied(principal.name(), resource))
        }
    }

    fn load_distro(&self, distro_id: &str) -> Result<Distribution> {
        self.store
            .get_distribution(distro_id)?
            .ok_or_else(|| Error::no_such_distro(distro_id))
    }

    /// Loads a distribution and checks `required` on it.
    fn authorize_distro(
        &self,
        principal: &Principal,
        distro_id: &str,
        required: &[&str],
    ) -> Result<Distribution> {
        let distro = self.load_distro(distro_id)?;
        self.require(principal, Some(distro_id), required, distro_id)?;
        Ok(distro)
    }

    fn readable(
        &self,
        principal: &Principal,
        distros: Vec<Distribution>,
    ) -> Result<Vec<Distribution>> {
        let mut visible = Vec::with_capacity(distros.len());
        for distro in distros {
            if self.permits(principal, Some(&distro.distro_id), READ_ROLES)? {
                visible.push(distro);
            }
        }
        Ok(visible)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::Registry;
    use crate::security::{AllowAllPolicy, AuthorizationPolicy, EnforcingPolicy};
    use crate::storage::ArchiveStorage;
    use crate::store::{SqliteStore, Store};

    pub struct Harness {
        pub temp: TempDir,
        pub store: Arc<SqliteStore>,
        pub registry: Registry,
    }

    impl Harness {
        /// A second registry over the same database and archive tree.
        pub fn with_policy(&self, policy: Arc<dyn AuthorizationPolicy>) -> Registry {
            Registry::new(
                self.store.clone(),
                ArchiveStorage::new(&self.temp.path().join("files")),
                policy,
            )
        }
    }

    fn build(policy: Arc<dyn AuthorizationPolicy>) -> Harness {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();
        let storage = ArchiveStorage::new(&temp.path().join("files"));
        let registry = Registry::new(store.clone(), storage, policy).with_self_register(true);
        Harness {
            temp,
            store,
            registry,
        }
    }

    pub fn enforcing() -> Harness {
        build(Arc::new(EnforcingPolicy))
    }

    pub fn allow_all() -> Harness {
        build(Arc::new(AllowAllPolicy))
    }
}
