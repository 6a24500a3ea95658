use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::role::{ANONYMOUS, AUTHENTICATED, OWNER};
use crate::types::{Distribution, Principal, RoleSet, Subject};

const GLOBAL_SCOPE: &str = "";

/// Computes effective role sets. Nothing is cached; every call re-reads
/// grants, memberships and ownership from the store.
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn Store>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolves the roles `principal` holds, globally or on `distro_id`.
    ///
    /// The result always carries exactly one baseline role, `anonymous` or
    /// `authenticated`. Authenticated principals also inherit everything the
    /// anonymous subject holds. Global grants are included when no distro is
    /// given or `bypass_scope` is set.
    ///
    /// Fails with `NotFound` when `distro_id` names no recorded distribution.
    pub fn resolve(
        &self,
        principal: &Principal,
        distro_id: Option<&str>,
        bypass_scope: bool,
    ) -> Result<RoleSet> {
        let distro = match distro_id {
            Some(id) => Some(
                self.store
                    .get_distribution(id)?
                    .ok_or_else(|| Error::no_such_distro(id))?,
            ),
            None => None,
        };

        let mut roles = RoleSet::new();
        if principal.is_anonymous() {
            roles.insert(ANONYMOUS.to_string());
        } else {
            roles.insert(AUTHENTICATED.to_string());
            self.collect(ANONYMOUS, distro.as_ref(), bypass_scope, &mut roles)?;
        }
        self.collect(principal.name(), distro.as_ref(), bypass_scope, &mut roles)?;

        Ok(roles)
    }

    fn collect(
        &self,
        username: &str,
        distro: Option<&Distribution>,
        bypass_scope: bool,
        roles: &mut RoleSet,
    ) -> Result<()> {
        let mut subjects = vec![Subject::User(username.to_string())];
        subjects.extend(
            self.store
                .list_user_groups(username)?
                .into_iter()
                .map(Subject::Group),
        );

        if distro.is_none() || bypass_scope {
            for subject in &subjects {
                roles.extend(self.store.list_roles(GLOBAL_SCOPE, subject)?);
            }
        }

        if let Some(distro) = distro {
            if distro.owner == username {
                roles.insert(OWNER.to_string());
            }
            for subject in &subjects {
                roles.extend(self.store.list_roles(&distro.distro_id, subject)?);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{DistroMetadata, make_distro_id};

    fn setup() -> (TempDir, Arc<SqliteStore>, RoleResolver) {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
        store.initialize().unwrap();
        let resolver = RoleResolver::new(store.clone());
        (temp, store, resolver)
    }

    fn create_distro(store: &SqliteStore, name: &str, owner: &str) -> String {
        let distro_id = make_distro_id(name);
        store
            .create_distribution(&Distribution {
                distro_id: distro_id.clone(),
                name: name.to_string(),
                owner: owner.to_string(),
                metadata: DistroMetadata::default(),
                last_updated: Some(Utc::now()),
            })
            .unwrap();
        distro_id
    }

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().map(|r| r.to_string()).collect()
    }

    fn user(name: &str) -> Subject {
        Subject::User(name.to_string())
    }

    #[test]
    fn test_baseline_roles() {
        let (_temp, _store, resolver) = setup();

        assert_eq!(
            resolver
                .resolve(&Principal::new("newbie"), None, false)
                .unwrap(),
            roles(&["authenticated"])
        );
        assert_eq!(
            resolver
                .resolve(&Principal::anonymous(), None, false)
                .unwrap(),
            roles(&["anonymous"])
        );
    }

    #[test]
    fn test_missing_distro_is_not_found() {
        let (_temp, store, resolver) = setup();
        create_distro(&store, "present", "alice");

        assert!(matches!(
            resolver.resolve(&Principal::new("bob"), Some("absent"), false),
            Err(Error::NotFound(_))
        ));
        assert!(
            resolver
                .resolve(&Principal::new("bob"), Some("present"), false)
                .is_ok()
        );
        assert!(resolver.resolve(&Principal::new("bob"), None, true).is_ok());
    }

    #[test]
    fn test_owner_is_implicit() {
        let (_temp, store, resolver) = setup();
        let distro_id = create_distro(&store, "Mine", "alice");

        let alice = resolver
            .resolve(&Principal::new("alice"), Some(&distro_id), false)
            .unwrap();
        assert!(alice.contains(OWNER));

        let bob = resolver
            .resolve(&Principal::new("bob"), Some(&distro_id), false)
            .unwrap();
        assert!(!bob.contains(OWNER));
    }

    #[test]
    fn test_anonymous_grants_apply_to_everyone() {
        let (_temp, store, resolver) = setup();
        let distro_id = create_distro(&store, "public", "alice");
        store
            .set_roles(&distro_id, &user(ANONYMOUS), &roles(&["reader"]))
            .unwrap();

        let anon = resolver
            .resolve(&Principal::anonymous(), Some(&distro_id), false)
            .unwrap();
        assert_eq!(anon, roles(&["anonymous", "reader"]));

        let bob = resolver
            .resolve(&Principal::new("bob"), Some(&distro_id), false)
            .unwrap();
        assert_eq!(bob, roles(&["authenticated", "reader"]));
    }

    #[test]
    fn test_global_grants_need_bypass_scope_on_distro_lookups() {
        let (_temp, store, resolver) = setup();
        let distro_id = create_distro(&store, "pkg", "alice");
        store
            .set_roles("", &user("carol"), &roles(&["manager"]))
            .unwrap();
        let carol = Principal::new("carol");

        assert!(
            resolver
                .resolve(&carol, None, false)
                .unwrap()
                .contains("manager")
        );
        assert!(
            !resolver
                .resolve(&carol, Some(&distro_id), false)
                .unwrap()
                .contains("manager")
        );
        assert!(
            resolver
                .resolve(&carol, Some(&distro_id), true)
                .unwrap()
                .contains("manager")
        );
    }

    #[test]
    fn test_group_grant_reaches_member() {
        let (_temp, store, resolver) = setup();

        let distro_id = create_distro(&store, "Distro One", "alice");
        assert_eq!(distro_id, "distro-one");

        store
            .set_roles(
                &distro_id,
                &Subject::Group("g1".to_string()),
                &roles(&["reader"]),
            )
            .unwrap();
        let groups: BTreeSet<String> = ["g1".to_string()].into();
        store.set_user_groups("bob", &groups).unwrap();

        let bob = resolver
            .resolve(&Principal::new("bob"), Some("distro-one"), false)
            .unwrap();
        assert!(bob.contains("authenticated"));
        assert!(bob.contains("reader"));
        assert!(!bob.contains("owner"));
    }

    #[test]
    fn test_revocation_visible_on_next_call() {
        let (_temp, store, resolver) = setup();
        let distro_id = create_distro(&store, "pkg", "alice");
        let bob = Principal::new("bob");

        store
            .set_roles(&distro_id, &user("bob"), &roles(&["manager"]))
            .unwrap();
        assert!(
            resolver
                .resolve(&bob, Some(&distro_id), false)
                .unwrap()
                .contains("manager")
        );

        store
            .set_roles(&distro_id, &user("bob"), &RoleSet::new())
            .unwrap();
        assert!(
            !resolver
                .resolve(&bob, Some(&distro_id), false)
                .unwrap()
                .contains("manager")
        );
    }
}
