use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Distribution, DistroMetadata, FileEntry, RoleSet, Subject};

#[derive(Debug, Default, Deserialize)]
pub struct ListDistrosParams {
    /// `id` (default) or `updated`.
    #[serde(default)]
    pub order: Option<String>,
    /// Substring searched in name, description and summary.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitDistroRequest {
    pub name: String,
    #[serde(flatten)]
    pub metadata: DistroMetadata,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groupname: String,
    pub roles: Vec<String>,
}

impl GrantRequest {
    pub fn subject(&self) -> Result<Subject> {
        Subject::from_parts(self.username.trim(), self.groupname.trim())
    }

    #[must_use]
    pub fn role_set(&self) -> RoleSet {
        to_role_set(&self.roles)
    }
}

#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceIndexRequest {
    pub requirements: Vec<String>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddPinRequest {
    pub requirement: String,
}

#[derive(Debug, Deserialize)]
pub struct FindRequest {
    pub requirements: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FindResult {
    pub distro: Distribution,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub username: String,
    pub anonymous: bool,
    pub roles: RoleSet,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Global roles; omitted leaves them as they are.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct SetGroupsRequest {
    pub groups: Vec<String>,
}

#[must_use]
pub fn to_role_set(roles: &[String]) -> RoleSet {
    roles
        .iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}
