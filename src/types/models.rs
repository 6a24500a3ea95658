use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub groupname: String,
}

/// The target of a role grant. A grant names exactly one user or one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum Subject {
    User(String),
    Group(String),
}

impl Subject {
    /// Builds a subject from the legacy `(username, groupname)` pair where
    /// exactly one side must be non-empty.
    pub fn from_parts(username: &str, groupname: &str) -> Result<Self> {
        match (username.is_empty(), groupname.is_empty()) {
            (false, true) => Ok(Self::User(username.to_string())),
            (true, false) => Ok(Self::Group(groupname.to_string())),
            (true, true) => Err(Error::invalid("grant needs a username or a groupname")),
            (false, false) => Err(Error::invalid(
                "grant cannot name both a username and a groupname",
            )),
        }
    }

    /// Returns the `(username, groupname)` column pair, empty string for the unused side.
    #[must_use]
    pub fn columns(&self) -> (&str, &str) {
        match self {
            Self::User(name) => (name.as_str(), ""),
            Self::Group(name) => ("", name.as_str()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User(name) | Self::Group(name) => name,
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(name) => write!(f, "user \"{name}\""),
            Self::Group(name) => write!(f, "group \"{name}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    /// Empty string is the global scope.
    pub distro_id: String,
    pub subject: Subject,
}

/// Descriptive fields submitted with a distribution's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistroMetadata {
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub classifiers: Option<String>,
    pub description: Option<String>,
    pub download_url: Option<String>,
    pub home_page: Option<String>,
    pub keywords: Option<String>,
    pub license: Option<String>,
    pub metadata_version: Option<String>,
    pub platform: Option<String>,
    pub summary: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub distro_id: String,
    pub name: String,
    pub owner: String,
    #[serde(flatten)]
    pub metadata: DistroMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexPin {
    pub indexname: String,
    pub distro_id: String,
    pub target_distro_id: String,
    pub target_version: String,
}

/// A stored archive as seen by the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Size and digest of a stored archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub size: u64,
    pub sha256: String,
}

/// One line of a resolved index.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexEntry {
    Resolved {
        target: Distribution,
        file: FileEntry,
    },
    /// The pin's target distribution is not on record.
    Tombstone { target_distro_id: String },
}

impl IndexEntry {
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone { .. })
    }
}
