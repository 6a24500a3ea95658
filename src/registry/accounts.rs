use std::collections::BTreeSet;

use super::Registry;
use crate::error::{Error, Result};
use crate::types::role::{ANONYMOUS, MANAGE_ROLES, MANAGER, READER};
use crate::types::{Group, Principal, RoleGrant, RoleSet, Subject, User};

impl Registry {
    /// Self-registration. Creates the user with the `authenticated` baseline
    /// only; no grants are made.
    pub fn register_user(
        &self,
        username: &str,
        password: &str,
        confirm: &str,
        email: Option<&str>,
    ) -> Result<User> {
        if !self.self_register {
            return Err(Error::Disabled(
                "server does not permit self-registration".to_string(),
            ));
        }

        let username = username.trim();
        if username.is_empty() {
            return Err(Error::invalid("username is required"));
        }
        if password.is_empty() {
            return Err(Error::invalid("password is required"));
        }
        if confirm.is_empty() {
            return Err(Error::invalid("password confirmation is required"));
        }
        if password != confirm {
            return Err(Error::Conflict(
                "password and confirmation do not match".to_string(),
            ));
        }
        if username == ANONYMOUS {
            return Err(Error::invalid(
                "cannot register reserved \"anonymous\" username",
            ));
        }

        let user = User {
            username: username.to_string(),
            password_hash: Some(self.hasher.hash(password)?),
            email: email.map(str::to_string).filter(|e| !e.is_empty()),
        };
        // Names already on record, even without a password, are never claimed.
        if !self.store.create_user(&user)? {
            return Err(Error::Conflict(format!(
                "user \"{username}\" already exists"
            )));
        }

        tracing::info!("User \"{}\" registered", username);
        Ok(user)
    }

    /// Checks a username/password pair. Returns `None` for unknown users,
    /// users without a password, and wrong passwords.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<Principal>> {
        let Some(user) = self.store.get_user(username)? else {
            return Ok(None);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Ok(None);
        };

        if self.hasher.verify(password, hash)? {
            Ok(Some(Principal::new(user.username)))
        } else {
            Ok(None)
        }
    }

    /// Creates or replaces a user. A `None` password keeps the stored one;
    /// `Some` roles reconcile the user's global grants.
    pub fn update_user(
        &self,
        principal: &Principal,
        username: &str,
        password: Option<&str>,
        email: Option<&str>,
        roles: Option<&RoleSet>,
    ) -> Result<User> {
        let username = validate_subject_name(username, "username")?;
        self.require(principal, None, &[MANAGER], username)?;

        let password_hash = match password {
            Some(password) if !password.is_empty() => Some(self.hasher.hash(password)?),
            _ => None,
        };

        let user = User {
            username: username.to_string(),
            password_hash,
            email: email.map(str::to_string).filter(|e| !e.is_empty()),
        };
        let user = self.store.update_user(&user, roles)?;
        tracing::info!("User \"{}\" updated", username);
        Ok(user)
    }

    /// Creates the group if needed; `Some` roles reconcile its global grants.
    pub fn update_group(
        &self,
        principal: &Principal,
        groupname: &str,
        roles: Option<&RoleSet>,
    ) -> Result<Group> {
        let groupname = validate_subject_name(groupname, "groupname")?;
        self.require(principal, None, &[MANAGER], groupname)?;

        self.store.update_group(groupname, roles)?;
        tracing::info!("Group \"{}\" updated", groupname);

        Ok(Group {
            groupname: groupname.to_string(),
        })
    }

    /// Reconciles one subject's grants in one scope. `None` is the global
    /// scope and needs a global `manager`; a distro scope needs `owner` or
    /// `manager` on it. Returns false when nothing changed.
    pub fn set_roles(
        &self,
        principal: &Principal,
        distro_id: Option<&str>,
        subject: &Subject,
        roles: &RoleSet,
    ) -> Result<bool> {
        validate_subject_name(subject.name(), "subject name")?;

        let scope = match distro_id.filter(|id| !id.is_empty()) {
            Some(distro_id) => {
                self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;
                distro_id
            }
            None => {
                self.require(principal, None, &[MANAGER], "global roles")?;
                ""
            }
        };

        let changed = self.store.set_roles(scope, subject, roles)?;
        if changed {
            tracing::info!("Roles for {} updated", subject);
        } else {
            tracing::info!("Roles for {} unchanged", subject);
        }
        Ok(changed)
    }

    /// Reconciles a user's group memberships. Returns false when nothing changed.
    pub fn set_groups(
        &self,
        principal: &Principal,
        username: &str,
        groups: &BTreeSet<String>,
    ) -> Result<bool> {
        let username = validate_subject_name(username, "username")?;
        for group in groups {
            validate_subject_name(group, "groupname")?;
        }
        self.require(principal, None, &[MANAGER], username)?;

        let changed = self.store.set_user_groups(username, groups)?;
        if changed {
            tracing::info!("Groups for user \"{}\" updated", username);
        } else {
            tracing::info!("Groups for user \"{}\" unchanged", username);
        }
        Ok(changed)
    }

    pub fn get_groups(&self, principal: &Principal, username: &str) -> Result<BTreeSet<String>> {
        if principal.name() != username {
            self.require(principal, None, &[MANAGER], username)?;
        }
        self.store.list_user_groups(username)
    }

    pub fn list_users(&self, principal: &Principal) -> Result<Vec<User>> {
        self.require(principal, None, &[MANAGER], "users")?;
        self.store.list_users()
    }

    pub fn list_groups(&self, principal: &Principal) -> Result<Vec<Group>> {
        self.require(principal, None, &[MANAGER], "groups")?;
        self.store.list_groups()
    }

    /// Grants of one distribution, for its owners and managers.
    pub fn list_grants(&self, principal: &Principal, distro_id: &str) -> Result<Vec<RoleGrant>> {
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;
        self.store.list_grants(Some(distro_id))
    }

    /// Lets everyone, including anonymous requests, read the distribution.
    pub fn make_public(&self, principal: &Principal, distro_id: &str) -> Result<bool> {
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;

        let anonymous = Subject::User(ANONYMOUS.to_string());
        let mut roles = self.store.list_roles(distro_id, &anonymous)?;
        roles.insert(READER.to_string());

        let changed = self.store.set_roles(distro_id, &anonymous, &roles)?;
        if changed {
            tracing::info!("Distro \"{}\" is now public", distro_id);
        }
        Ok(changed)
    }
}

fn validate_subject_name<'a>(name: &'a str, what: &str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid(format!("{what} is required")));
    }
    Ok(name)
}
