use chrono::Utc;

use super::Registry;
use crate::error::{Error, Result};
use crate::types::role::CREATE_ROLES;
use crate::types::{Distribution, Principal, make_distro_id};
use crate::upstream::FetchedProject;

impl Registry {
    /// Registers a project fetched from an upstream index as a new
    /// distribution owned by the caller.
    ///
    /// Archives are placed first and the record is created last; on any
    /// failure the archives this call placed are removed again, so a
    /// distribution is never visible half imported. Imports run one at a
    /// time, and an import that finds the distribution already recorded
    /// touches nothing.
    pub async fn import_project(
        &self,
        principal: &Principal,
        project: FetchedProject,
    ) -> Result<Distribution> {
        if project.name.trim().is_empty() {
            return Err(Error::invalid("upstream project has no name"));
        }
        let distro_id = make_distro_id(&project.name);

        let _guard = self.imports.lock().await;
        if self.store.get_distribution(&distro_id)?.is_some() {
            return Err(Error::Conflict(format!(
                "distro \"{distro_id}\" already exists"
            )));
        }
        self.require(principal, None, CREATE_ROLES, &distro_id)?;

        let mut placed = Vec::new();
        for (filename, content) in &project.files {
            match self.storage.save(&distro_id, filename, content).await {
                Ok(_) => placed.push(filename.as_str()),
                // Left behind by an earlier, interrupted import.
                Err(Error::Conflict(_)) => {}
                Err(e) => {
                    self.discard_import(&distro_id, &placed).await;
                    return Err(e);
                }
            }
        }

        let distro = Distribution {
            distro_id: distro_id.clone(),
            name: project.name.clone(),
            owner: principal.name().to_string(),
            metadata: project.metadata,
            last_updated: Some(Utc::now()),
        };
        if let Err(e) = self.store.create_distribution(&distro) {
            self.discard_import(&distro_id, &placed).await;
            return Err(e);
        }

        tracing::info!(
            "Imported \"{}\" with {} files on behalf of {}",
            distro_id,
            project.files.len(),
            principal
        );
        Ok(distro)
    }

    async fn discard_import(&self, distro_id: &str, placed: &[&str]) {
        for filename in placed {
            if let Err(e) = self.storage.remove(distro_id, filename).await {
                tracing::warn!(
                    "Failed to clean up {} from partial import of \"{}\": {e}",
                    filename,
                    distro_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::error::Error;
    use crate::registry::testing::{allow_all, enforcing};
    use crate::store::Store;
    use crate::types::{DistroMetadata, Principal};
    use crate::upstream::FetchedProject;

    fn project(files: &[&str]) -> FetchedProject {
        FetchedProject {
            name: "Remote Pkg".to_string(),
            metadata: DistroMetadata {
                summary: Some("from upstream".to_string()),
                ..Default::default()
            },
            files: files
                .iter()
                .map(|f| (f.to_string(), Bytes::from_static(b"x")))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_import_project() {
        let h = allow_all();
        let admin = Principal::new("admin");

        let distro = h
            .registry
            .import_project(&admin, project(&["Remote_Pkg-1.0.tar.gz", "Remote_Pkg-2.0.tar.gz"]))
            .await
            .unwrap();
        assert_eq!(distro.distro_id, "remote-pkg");
        assert_eq!(distro.owner, "admin");

        let files = h.registry.list_files(&admin, "remote-pkg").await.unwrap();
        assert_eq!(files[0].filename, "Remote_Pkg-2.0.tar.gz");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_imports_register_once() {
        let h = allow_all();
        let admin = Principal::new("admin");
        let names: Vec<String> = (0..20)
            .map(|i| format!("Remote_Pkg-1.{i}.tar.gz"))
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let (a, b) = tokio::join!(
            h.registry.import_project(&admin, project(&names)),
            h.registry.import_project(&admin, project(&names)),
        );
        assert!(matches!(
            (a, b),
            (Ok(_), Err(Error::Conflict(_))) | (Err(Error::Conflict(_)), Ok(_))
        ));

        assert!(h.store.get_distribution("remote-pkg").unwrap().is_some());
        let files = h.registry.list_files(&admin, "remote-pkg").await.unwrap();
        assert_eq!(files.len(), 20);
    }

    #[tokio::test]
    async fn test_import_denied_leaves_nothing() {
        let h = enforcing();

        assert!(matches!(
            h.registry
                .import_project(&Principal::anonymous(), project(&["Remote_Pkg-1.0.zip"]))
                .await,
            Err(Error::PermissionDenied { .. })
        ));
        assert!(h.store.get_distribution("remote-pkg").unwrap().is_none());
        assert!(h.registry.storage().list("remote-pkg").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_bad_file_rolls_back() {
        let h = allow_all();

        assert!(matches!(
            h.registry
                .import_project(
                    &Principal::new("admin"),
                    project(&["Remote_Pkg-1.0.zip", "../evil.zip"])
                )
                .await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(h.store.get_distribution("remote-pkg").unwrap().is_none());
        assert!(h.registry.storage().list("remote-pkg").await.unwrap().is_empty());
    }
}
