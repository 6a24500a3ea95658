use chrono::Utc;
use tokio::fs::File;
use tokio::io::BufReader;

use super::Registry;
use crate::error::Result;
use crate::types::role::{MANAGE_ROLES, READ_ROLES};
use crate::types::{FileEntry, FileInfo, Principal, make_distro_id};

impl Registry {
    /// Stores an archive for an existing distribution and bumps its
    /// `last_updated`. `name` may be the display name or the distro id.
    pub async fn upload_file(
        &self,
        principal: &Principal,
        name: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<FileEntry> {
        let distro_id = make_distro_id(name);
        self.authorize_distro(principal, &distro_id, MANAGE_ROLES)?;

        let entry = self.storage.save(&distro_id, filename, data).await?;
        self.store.touch_distribution(&distro_id, Utc::now())?;

        tracing::debug!("Added file \"{}\" to \"{}\"", filename, distro_id);
        Ok(entry)
    }

    /// The distribution's archives, newest version first.
    pub async fn list_files(&self, principal: &Principal, distro_id: &str) -> Result<Vec<FileEntry>> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;
        self.storage.list(distro_id).await
    }

    pub async fn open_file(
        &self,
        principal: &Principal,
        distro_id: &str,
        filename: &str,
    ) -> Result<(BufReader<File>, u64)> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;
        self.storage.open(distro_id, filename).await
    }

    pub async fn file_info(
        &self,
        principal: &Principal,
        distro_id: &str,
        filename: &str,
    ) -> Result<FileInfo> {
        self.authorize_distro(principal, distro_id, READ_ROLES)?;
        self.storage.info(distro_id, filename).await
    }
}
