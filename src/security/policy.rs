use super::RoleResolver;
use crate::error::Result;
use crate::types::Principal;
use crate::types::role::{AUTHENTICATED, holds_any};

/// Decides whether a principal may act on a scope. Chosen once when the
/// registry is built.
pub trait AuthorizationPolicy: Send + Sync {
    /// Returns true when `principal` holds one of `required` globally
    /// (`distro_id` is `None`) or on the given distribution.
    ///
    /// Fails with `NotFound` when the distribution does not exist.
    fn permits(
        &self,
        resolver: &RoleResolver,
        principal: &Principal,
        distro_id: Option<&str>,
        required: &[&str],
    ) -> Result<bool>;
}

/// Checks requests against the recorded grants.
///
/// Distro-scoped checks include global grants, so a global `manager`
/// manages every distribution.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnforcingPolicy;

impl AuthorizationPolicy for EnforcingPolicy {
    fn permits(
        &self,
        resolver: &RoleResolver,
        principal: &Principal,
        distro_id: Option<&str>,
        required: &[&str],
    ) -> Result<bool> {
        if required.contains(&AUTHENTICATED) && !principal.is_anonymous() {
            return Ok(true);
        }
        let roles = resolver.resolve(principal, distro_id, true)?;
        Ok(holds_any(&roles, required))
    }
}

/// Permits everything. Used by local administrative tooling that already
/// has direct access to the database.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllPolicy;

impl AuthorizationPolicy for AllowAllPolicy {
    fn permits(
        &self,
        _resolver: &RoleResolver,
        _principal: &Principal,
        _distro_id: Option<&str>,
        _required: &[&str],
    ) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;
    use crate::store::{SqliteStore, Store};
    use crate::types::role::{CREATE_ROLES, MANAGE_ROLES, READ_ROLES};
    use crate::types::{Distribution, DistroMetadata, RoleSet, Subject};

    fn setup() -> (TempDir, Arc<SqliteStore>, RoleResolver) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();
        store
            .create_distribution(&Distribution {
                distro_id: "pkg".to_string(),
                name: "pkg".to_string(),
                owner: "alice".to_string(),
                metadata: DistroMetadata::default(),
                last_updated: None,
            })
            .unwrap();
        let resolver = RoleResolver::new(store.clone());
        (temp, store, resolver)
    }

    #[test]
    fn test_enforcing_owner_and_strangers() {
        let (_temp, _store, resolver) = setup();
        let policy = EnforcingPolicy;

        assert!(
            policy
                .permits(&resolver, &Principal::new("alice"), Some("pkg"), MANAGE_ROLES)
                .unwrap()
        );
        assert!(
            !policy
                .permits(&resolver, &Principal::new("bob"), Some("pkg"), READ_ROLES)
                .unwrap()
        );
        assert!(
            !policy
                .permits(&resolver, &Principal::new("bob"), None, CREATE_ROLES)
                .unwrap()
        );
    }

    #[test]
    fn test_enforcing_global_manager_manages_everything() {
        let (_temp, store, resolver) = setup();
        let manager: RoleSet = ["manager".to_string()].into();
        store
            .set_roles("", &Subject::User("carol".to_string()), &manager)
            .unwrap();

        assert!(
            EnforcingPolicy
                .permits(&resolver, &Principal::new("carol"), Some("pkg"), MANAGE_ROLES)
                .unwrap()
        );
    }

    #[test]
    fn test_enforcing_authenticated_requirement() {
        let (_temp, _store, resolver) = setup();

        assert!(
            EnforcingPolicy
                .permits(&resolver, &Principal::new("bob"), None, &[AUTHENTICATED])
                .unwrap()
        );
        assert!(
            !EnforcingPolicy
                .permits(&resolver, &Principal::anonymous(), None, &[AUTHENTICATED])
                .unwrap()
        );
    }

    #[test]
    fn test_enforcing_missing_distro() {
        let (_temp, _store, resolver) = setup();

        assert!(matches!(
            EnforcingPolicy.permits(&resolver, &Principal::new("bob"), Some("nope"), READ_ROLES),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_allow_all() {
        let (_temp, _store, resolver) = setup();

        assert!(
            AllowAllPolicy
                .permits(&resolver, &Principal::anonymous(), Some("pkg"), MANAGE_ROLES)
                .unwrap()
        );
    }
}
