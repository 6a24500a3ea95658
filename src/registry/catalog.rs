use chrono::Utc;

use super::Registry;
use crate::error::{Error, Result};
use crate::store::DistroOrder;
use crate::types::role::{CREATE_ROLES, MANAGE_ROLES, READ_ROLES};
use crate::types::{Distribution, DistroMetadata, FileEntry, Principal, make_distro_id};
use crate::version::{ArchiveName, Requirement};

impl Registry {
    /// Creates the distribution on first submission, updates it afterwards.
    ///
    /// Creation needs `add-distro` or `manager` and records the caller as
    /// owner. Updates need `owner` or `manager` and never change the owner.
    pub fn upsert_metadata(
        &self,
        principal: &Principal,
        name: &str,
        metadata: DistroMetadata,
    ) -> Result<Distribution> {
        if name.trim().is_empty() {
            return Err(Error::invalid("distribution name is required"));
        }
        let distro_id = make_distro_id(name);

        match self.store.get_distribution(&distro_id)? {
            None => {
                self.require(principal, None, CREATE_ROLES, &distro_id)?;
                let distro = Distribution {
                    distro_id: distro_id.clone(),
                    name: name.to_string(),
                    owner: principal.name().to_string(),
                    metadata,
                    last_updated: Some(Utc::now()),
                };
                self.store.create_distribution(&distro)?;
                tracing::debug!("Created distro \"{}\" owned by {}", distro_id, principal);
                Ok(distro)
            }
            Some(existing) => {
                self.require(principal, Some(&distro_id), MANAGE_ROLES, &distro_id)?;
                let distro = Distribution {
                    name: name.to_string(),
                    metadata,
                    last_updated: Some(Utc::now()),
                    ..existing
                };
                self.store.update_distribution(&distro)?;
                tracing::debug!("Updated distro \"{}\"", distro_id);
                Ok(distro)
            }
        }
    }

    pub fn get_distro(&self, principal: &Principal, distro_id: &str) -> Result<Distribution> {
        self.authorize_distro(principal, distro_id, READ_ROLES)
    }

    /// Every distribution the caller may read.
    pub fn list_distros(
        &self,
        principal: &Principal,
        order: DistroOrder,
    ) -> Result<Vec<Distribution>> {
        let distros = self.store.list_distributions(order)?;
        self.readable(principal, distros)
    }

    /// Readable distributions whose name, description or summary contains `needle`.
    pub fn search(
        &self,
        principal: &Principal,
        needle: &str,
        order: DistroOrder,
    ) -> Result<Vec<Distribution>> {
        let distros = self.store.search_distributions(needle, order)?;
        self.readable(principal, distros)
    }

    /// Resolves requirement strings to readable distributions and, for each,
    /// the stored files whose version satisfies one of its requirements.
    /// Distributions without a satisfying file are left out.
    pub async fn find_by_requirement<S: AsRef<str>>(
        &self,
        principal: &Principal,
        requirements: &[S],
    ) -> Result<Vec<(Distribution, Vec<FileEntry>)>> {
        let reqs = Requirement::parse_many(requirements)?;

        let mut distro_ids: Vec<String> = reqs.iter().map(|r| make_distro_id(&r.name)).collect();
        distro_ids.sort();
        distro_ids.dedup();

        let distros = self.store.find_distributions(&distro_ids)?;
        let distros = self.readable(principal, distros)?;

        let mut found = Vec::new();
        for distro in distros {
            let applicable: Vec<&Requirement> = reqs
                .iter()
                .filter(|r| make_distro_id(&r.name) == distro.distro_id)
                .collect();

            let files: Vec<FileEntry> = self
                .storage
                .list(&distro.distro_id)
                .await?
                .into_iter()
                .filter(|entry| {
                    ArchiveName::parse(&entry.filename).is_some_and(|archive| {
                        let version = archive.parsed_version();
                        applicable.iter().any(|r| r.matches(&version))
                    })
                })
                .collect();

            if !files.is_empty() {
                found.push((distro, files));
            }
        }

        Ok(found)
    }

    /// Removes a distribution with its grants, its own indexes and its
    /// archives. Pins elsewhere that target it turn into tombstones.
    pub async fn delete_distro(&self, principal: &Principal, distro_id: &str) -> Result<()> {
        self.authorize_distro(principal, distro_id, MANAGE_ROLES)?;

        self.store.delete_distribution(distro_id)?;
        self.storage.remove_distro(distro_id).await?;

        tracing::info!("Deleted distro \"{}\" on behalf of {}", distro_id, principal);
        Ok(())
    }
}
