mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Sort order for distribution listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistroOrder {
    #[default]
    DistroId,
    /// Most recently updated first.
    LastUpdated,
}

/// Store defines the database interface.
///
/// Methods that reconcile a set (`set_roles`, `set_user_groups`,
/// `replace_index`, `update_user`, `update_group`) run as a single transaction.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    /// Inserts a new user. Returns false, without writing, when the name is
    /// already recorded, including rows created lazily by a grant.
    fn create_user(&self, user: &User) -> Result<bool>;
    /// Creates the user or replaces its email, and its password unless
    /// `password_hash` is `None`. `Some` roles reconcile the user's global
    /// grants in the same transaction. Returns the stored row.
    fn update_user(&self, user: &User, roles: Option<&RoleSet>) -> Result<User>;
    fn get_user(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;

    // Group operations
    /// Creates the group if needed; `Some` roles reconcile its global
    /// grants in the same transaction.
    fn update_group(&self, groupname: &str, roles: Option<&RoleSet>) -> Result<()>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn list_user_groups(&self, username: &str) -> Result<BTreeSet<String>>;
    /// Replaces the user's memberships with `groups`, creating missing users
    /// and groups. Returns false, without writing, when nothing changes.
    fn set_user_groups(&self, username: &str, groups: &BTreeSet<String>) -> Result<bool>;

    // Role grant operations
    fn list_roles(&self, distro_id: &str, subject: &Subject) -> Result<RoleSet>;
    /// All grants, or only those of one scope (`Some("")` is the global scope).
    fn list_grants(&self, distro_id: Option<&str>) -> Result<Vec<RoleGrant>>;
    /// Reconciles the grants of one (scope, subject) pair to `roles`.
    /// Returns false, without writing, when the stored set already matches.
    fn set_roles(&self, distro_id: &str, subject: &Subject, roles: &RoleSet) -> Result<bool>;

    // Distribution operations
    fn create_distribution(&self, distro: &Distribution) -> Result<()>;
    fn get_distribution(&self, distro_id: &str) -> Result<Option<Distribution>>;
    /// Updates name, metadata and last_updated. The owner is never changed.
    fn update_distribution(&self, distro: &Distribution) -> Result<()>;
    fn touch_distribution(&self, distro_id: &str, at: DateTime<Utc>) -> Result<()>;
    /// Removes the distribution together with its scoped grants and its own pins.
    fn delete_distribution(&self, distro_id: &str) -> Result<bool>;
    fn list_distributions(&self, order: DistroOrder) -> Result<Vec<Distribution>>;
    fn search_distributions(&self, needle: &str, order: DistroOrder) -> Result<Vec<Distribution>>;
    fn find_distributions(&self, distro_ids: &[String]) -> Result<Vec<Distribution>>;

    // Index pin operations
    fn add_pin(&self, pin: &IndexPin) -> Result<()>;
    fn remove_pin(&self, distro_id: &str, indexname: &str, target_distro_id: &str)
    -> Result<bool>;
    fn list_pins(&self, distro_id: &str, indexname: &str) -> Result<Vec<IndexPin>>;
    fn list_index_names(&self, distro_id: &str) -> Result<Vec<String>>;
    fn has_index(&self, distro_id: &str, indexname: &str) -> Result<bool>;
    /// Deletes every pin of the index and returns how many were removed.
    fn clear_index(&self, distro_id: &str, indexname: &str) -> Result<usize>;
    /// Atomically replaces the index with `pins`, kept in the given order.
    fn replace_index(&self, distro_id: &str, indexname: &str, pins: &[IndexPin]) -> Result<()>;

    fn close(&self) -> Result<()>;
}
