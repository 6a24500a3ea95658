use serde::Serialize;

use super::Registry;
use crate::error::{Error, Result};
use crate::types::role::{MANAGE_ROLES, READ_ROLES};
use crate::types::{FileEntry, IndexEntry, IndexPin, Principal, make_distro_id};
use crate::version::Requirement;

/// A named index with its pins rendered as `Name==version`, or `!target`
/// for pins whose target is no longer recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub indexname: String,
    pub pins: Vec<String>,
}

impl Registry {
    pub fn list_indexes(&self, principal: &Principal, distro_id: &str) -> Result<Vec<IndexSummary>> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;

        let mut summaries = Vec::new();
        for indexname in self.store.list_index_names(distro_id)? {
            let mut pins = Vec::new();
            for pin in self.store.list_pins(distro_id, &indexname)? {
                match self.store.get_distribution(&pin.target_distro_id)? {
                    Some(target) => pins.push(format!("{}=={}", target.name, pin.target_version)),
                    None => pins.push(format!("!{}", pin.target_distro_id)),
                }
            }
            summaries.push(IndexSummary { indexname, pins });
        }
        Ok(summaries)
    }

    /// Resolves every pin of the index, in insertion order, to the stored
    /// archives of the pinned version.
    ///
    /// A pin whose target is missing, or not readable by the caller, yields
    /// a tombstone. A pin whose version has no stored archive yields
    /// nothing. A pinned version stored as several archives yields one entry
    /// per archive.
    pub async fn resolve_index(
        &self,
        principal: &Principal,
        distro_id: &str,
        indexname: &str,
    ) -> Result<Vec<IndexEntry>> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;

        let mut entries = Vec::new();
        for pin in self.store.list_pins(distro_id, indexname)? {
            let target = match self.get_distro(principal, &pin.target_distro_id) {
                Ok(target) => target,
                Err(Error::NotFound(_) | Error::PermissionDenied { .. }) => {
                    tracing::warn!(
                        "Index \"{}\" of \"{}\" pins unavailable distro \"{}\"",
                        indexname,
                        distro_id,
                        pin.target_distro_id
                    );
                    entries.push(IndexEntry::Tombstone {
                        target_distro_id: pin.target_distro_id,
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let matching: Vec<FileEntry> = self
                .storage
                .list(&target.distro_id)
                .await?
                .into_iter()
                .filter(|entry| entry.version.as_deref() == Some(pin.target_version.as_str()))
                .collect();

            for file in matching {
                entries.push(IndexEntry::Resolved {
                    target: target.clone(),
                    file,
                });
            }
        }
        Ok(entries)
    }

    /// Adds `requirement` (`name==version`) to the index, or moves an
    /// existing pin of the same target to the new version.
    pub fn add_pin(
        &self,
        principal: &Principal,
        distro_id: &str,
        indexname: &str,
        requirement: &str,
    ) -> Result<IndexPin> {
        let pin = build_pin(distro_id, indexname, requirement)?;
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;

        self.store.add_pin(&pin)?;
        tracing::debug!(
            "Pinned {}=={} in index \"{}\" of \"{}\"",
            pin.target_distro_id,
            pin.target_version,
            indexname,
            distro_id
        );
        Ok(pin)
    }

    /// Removes the pin of `target` (a name or distro id). Returns false when
    /// the index had no such pin.
    pub fn remove_pin(
        &self,
        principal: &Principal,
        distro_id: &str,
        indexname: &str,
        target: &str,
    ) -> Result<bool> {
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;
        self.store
            .remove_pin(distro_id, indexname, &make_distro_id(target))
    }

    pub fn has_index(&self, principal: &Principal, distro_id: &str, indexname: &str) -> Result<bool> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;
        self.store.has_index(distro_id, indexname)
    }

    /// Deletes the whole index. Fails with `NotFound` when it has no pins.
    pub fn clear_index(&self, principal: &Principal, distro_id: &str, indexname: &str) -> Result<()> {
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;

        if self.store.clear_index(distro_id, indexname)? == 0 {
            return Err(Error::not_found(format!(
                "no index \"{indexname}\" for \"{distro_id}\""
            )));
        }
        tracing::info!("Removed index \"{}\" of \"{}\"", indexname, distro_id);
        Ok(())
    }

    /// Replaces the index with the given `name==version` pins in order.
    /// Without `overwrite`, an existing index is left alone and the call
    /// fails with `Conflict`. Every requirement is parsed before anything
    /// is written.
    pub fn replace_index<S: AsRef<str>>(
        &self,
        principal: &Principal,
        distro_id: &str,
        indexname: &str,
        requirements: &[S],
        overwrite: bool,
    ) -> Result<Vec<IndexPin>> {
        let mut pins = Vec::new();
        for input in requirements {
            for line in input.as_ref().lines() {
                let line = line.split('#').next().unwrap_or("").trim();
                if !line.is_empty() {
                    pins.push(build_pin(distro_id, indexname, line)?);
                }
            }
        }
        validate_indexname(indexname)?;
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;

        if !overwrite && self.store.has_index(distro_id, indexname)? {
            return Err(Error::Conflict(format!(
                "index \"{indexname}\" already exists for \"{distro_id}\""
            )));
        }

        self.store.replace_index(distro_id, indexname, &pins)?;
        tracing::info!(
            "Set up index \"{}\" of \"{}\" with {} pins",
            indexname,
            distro_id,
            pins.len()
        );
        Ok(pins)
    }
}

fn validate_indexname(indexname: &str) -> Result<()> {
    if indexname.trim().is_empty() || indexname.contains('/') {
        return Err(Error::invalid(format!("invalid index name \"{indexname}\"")));
    }
    Ok(())
}

fn build_pin(distro_id: &str, indexname: &str, requirement: &str) -> Result<IndexPin> {
    validate_indexname(indexname)?;
    let (name, version) = Requirement::parse_pin(requirement)?;
    Ok(IndexPin {
        indexname: indexname.to_string(),
        distro_id: distro_id.to_string(),
        target_distro_id: make_distro_id(&name),
        target_version: version,
    })
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::registry::testing::{Harness, allow_all};
    use crate::store::Store;
    use crate::types::{DistroMetadata, IndexEntry, Principal};

    async fn seeded() -> (Harness, Principal) {
        let h = allow_all();
        let admin = Principal::new("admin");
        for name in ["App", "Lib A", "Lib B"] {
            h.registry
                .upsert_metadata(&admin, name, DistroMetadata::default())
                .unwrap();
        }
        for file in ["lib-a-1.0.tar.gz", "lib-a-1.0.egg", "lib-a-2.0.tar.gz"] {
            h.registry
                .upload_file(&admin, "lib-a", file, b"x")
                .await
                .unwrap();
        }
        (h, admin)
    }

    #[tokio::test]
    async fn test_resolve_index_in_pin_order() {
        let (h, admin) = seeded().await;
        h.registry
            .add_pin(&admin, "app", "prod", "Lib B==0.1")
            .unwrap();
        h.registry
            .add_pin(&admin, "app", "prod", "Lib A==1.0")
            .unwrap();

        let entries = h
            .registry
            .resolve_index(&admin, "app", "prod")
            .await
            .unwrap();

        // lib-b has no archive for 0.1 and contributes nothing.
        let files: Vec<_> = entries
            .iter()
            .map(|e| match e {
                IndexEntry::Resolved { target, file } => {
                    (target.distro_id.as_str(), file.filename.as_str())
                }
                IndexEntry::Tombstone { .. } => panic!("unexpected tombstone"),
            })
            .collect();
        assert_eq!(
            files,
            vec![("lib-a", "lib-a-1.0.egg"), ("lib-a", "lib-a-1.0.tar.gz")]
        );
    }

    #[tokio::test]
    async fn test_pin_matches_exact_version_string() {
        let (h, admin) = seeded().await;
        h.registry
            .upload_file(&admin, "lib-b", "lib-b-1.0.0.zip", b"x")
            .await
            .unwrap();
        h.registry
            .add_pin(&admin, "app", "prod", "Lib B==1.0")
            .unwrap();
        assert!(
            h.registry
                .resolve_index(&admin, "app", "prod")
                .await
                .unwrap()
                .is_empty()
        );

        h.registry
            .add_pin(&admin, "app", "prod", "Lib B==1.0.0")
            .unwrap();
        let entries = h
            .registry
            .resolve_index(&admin, "app", "prod")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            &entries[0],
            IndexEntry::Resolved { file, .. } if file.filename == "lib-b-1.0.0.zip"
        ));
    }

    #[tokio::test]
    async fn test_deleted_target_becomes_tombstone() {
        let (h, admin) = seeded().await;
        h.registry
            .add_pin(&admin, "app", "prod", "Lib B==0.1")
            .unwrap();
        h.registry
            .add_pin(&admin, "app", "prod", "Lib A==2.0")
            .unwrap();
        h.registry.delete_distro(&admin, "lib-b").await.unwrap();

        let entries = h
            .registry
            .resolve_index(&admin, "app", "prod")
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(
            &entries[0],
            IndexEntry::Tombstone { target_distro_id } if target_distro_id == "lib-b"
        ));
        assert!(!entries[1].is_tombstone());

        let summaries = h.registry.list_indexes(&admin, "app").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].pins, vec!["!lib-b", "Lib A==2.0"]);
    }

    #[tokio::test]
    async fn test_add_pin_rejects_ranges() {
        let (h, admin) = seeded().await;

        for bad in ["Lib A>=1.0", "Lib A", "Lib A==1.0,==2.0"] {
            assert!(matches!(
                h.registry.add_pin(&admin, "app", "prod", bad),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(!h.store.has_index("app", "prod").unwrap());
    }

    #[tokio::test]
    async fn test_clear_and_remove() {
        let (h, admin) = seeded().await;
        h.registry
            .add_pin(&admin, "app", "dev", "Lib A==1.0")
            .unwrap();

        assert!(h.registry.has_index(&admin, "app", "dev").unwrap());
        assert!(h.registry.remove_pin(&admin, "app", "dev", "Lib A").unwrap());
        assert!(!h.registry.remove_pin(&admin, "app", "dev", "Lib A").unwrap());
        assert!(!h.registry.has_index(&admin, "app", "dev").unwrap());

        assert!(matches!(
            h.registry.clear_index(&admin, "app", "dev"),
            Err(Error::NotFound(_))
        ));

        h.registry
            .add_pin(&admin, "app", "dev", "Lib A==1.0")
            .unwrap();
        h.registry.clear_index(&admin, "app", "dev").unwrap();
        assert!(!h.registry.has_index(&admin, "app", "dev").unwrap());
    }

    #[tokio::test]
    async fn test_replace_index() {
        let (h, admin) = seeded().await;

        h.registry
            .replace_index(&admin, "app", "prod", &["Lib A==1.0\nLib B==0.1"], false)
            .unwrap();
        assert!(matches!(
            h.registry
                .replace_index(&admin, "app", "prod", &["Lib A==2.0"], false),
            Err(Error::Conflict(_))
        ));

        // A bad line aborts the whole replacement.
        assert!(matches!(
            h.registry
                .replace_index(&admin, "app", "prod", &["Lib A==2.0", "Lib B>1"], true),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(h.store.list_pins("app", "prod").unwrap().len(), 2);

        h.registry
            .replace_index(&admin, "app", "prod", &["Lib A==2.0"], true)
            .unwrap();
        let pins = h.store.list_pins("app", "prod").unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].target_version, "2.0");
    }

    #[tokio::test]
    async fn test_index_of_missing_distro() {
        let h = allow_all();
        let admin = Principal::new("admin");

        assert!(matches!(
            h.registry.resolve_index(&admin, "nope", "prod").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.registry.has_index(&admin, "nope", "prod"),
            Err(Error::NotFound(_))
        ));
    }
}
