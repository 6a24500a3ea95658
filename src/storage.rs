use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{FileEntry, FileInfo};
use crate::version::{ArchiveName, Version};

/// On-disk archive store, sharded as `<base>/<first char>/<distro_id>/<filename>`.
pub struct ArchiveStorage {
    base_path: PathBuf,
}

impl ArchiveStorage {
    pub fn new(files_dir: &Path) -> Self {
        Self {
            base_path: files_dir.to_path_buf(),
        }
    }

    fn distro_dir(&self, distro_id: &str) -> Result<PathBuf> {
        validate_segment(distro_id, "distro id")?;
        let shard: String = distro_id.chars().take(1).collect();
        Ok(self.base_path.join(shard).join(distro_id))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    /// Full path of a stored archive, whether or not it exists.
    pub fn file_path(&self, distro_id: &str, filename: &str) -> Result<PathBuf> {
        validate_segment(filename, "filename")?;
        Ok(self.distro_dir(distro_id)?.join(filename))
    }

    /// Writes a new archive. An existing file of the same name is never
    /// replaced; the second writer gets `Conflict`.
    pub async fn save(&self, distro_id: &str, filename: &str, data: &[u8]) -> Result<FileEntry> {
        let final_path = self.file_path(distro_id, filename)?;
        if fs::try_exists(&final_path).await? {
            return Err(duplicate(distro_id, filename));
        }

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;
        drop(temp_file);

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let linked = fs::hard_link(&temp_path, &final_path).await;
        if let Err(e) = fs::remove_file(&temp_path).await {
            tracing::warn!("Failed to remove temp file {}: {e}", temp_path.display());
        }

        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(duplicate(distro_id, filename));
            }
            Err(e) => return Err(Error::Io(e)),
        }

        tracing::debug!("Stored {} for {}", filename, distro_id);
        Ok(entry_for(filename))
    }

    /// Lists a distribution's archives, newest parsed version first. Files
    /// that do not follow the `name-version.ext` convention sort last.
    pub async fn list(&self, distro_id: &str) -> Result<Vec<FileEntry>> {
        let dir = self.distro_dir(distro_id)?;
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut entries = Vec::new();
        while let Some(item) = read_dir.next_entry().await? {
            if !item.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = item.file_name().to_str() {
                entries.push(entry_for(name));
            }
        }

        sort_newest_first(&mut entries);
        Ok(entries)
    }

    pub async fn open(&self, distro_id: &str, filename: &str) -> Result<(BufReader<File>, u64)> {
        let path = self.file_path(distro_id, filename)?;
        let file = File::open(&path)
            .await
            .map_err(|e| from_io(e, distro_id, filename))?;
        let size = file.metadata().await?.len();
        Ok((BufReader::new(file), size))
    }

    pub async fn info(&self, distro_id: &str, filename: &str) -> Result<FileInfo> {
        let path = self.file_path(distro_id, filename)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| from_io(e, distro_id, filename))?;

        let mut hasher = Sha256::new();
        hasher.update(&data);

        Ok(FileInfo {
            filename: filename.to_string(),
            version: ArchiveName::parse(filename).map(|a| a.version),
            size: data.len() as u64,
            sha256: hex::encode(hasher.finalize()),
        })
    }

    /// Deletes one archive. Returns false when it did not exist.
    pub async fn remove(&self, distro_id: &str, filename: &str) -> Result<bool> {
        let path = self.file_path(distro_id, filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Deletes every archive of a distribution. Returns false when there was nothing to delete.
    pub async fn remove_distro(&self, distro_id: &str) -> Result<bool> {
        let dir = self.distro_dir(distro_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn entry_for(filename: &str) -> FileEntry {
    FileEntry {
        filename: filename.to_string(),
        version: ArchiveName::parse(filename).map(|a| a.version),
    }
}

fn sort_newest_first(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        let va = a.version.as_deref().map(Version::parse);
        let vb = b.version.as_deref().map(Version::parse);
        match (va, vb) {
            (Some(va), Some(vb)) => vb.cmp(&va).then_with(|| a.filename.cmp(&b.filename)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.filename.cmp(&b.filename),
        }
    });
}

fn validate_segment(segment: &str, what: &str) -> Result<()> {
    if segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
    {
        return Err(Error::invalid(format!("invalid {what} \"{segment}\"")));
    }
    Ok(())
}

fn duplicate(distro_id: &str, filename: &str) -> Error {
    Error::Conflict(format!(
        "file \"{filename}\" already exists for \"{distro_id}\""
    ))
}

fn from_io(e: std::io::Error, distro_id: &str, filename: &str) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::not_found(format!("no file \"{filename}\" for \"{distro_id}\""))
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn filenames(entries: &[FileEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.filename.as_str()).collect()
    }

    #[tokio::test]
    async fn test_save_uses_sharded_layout() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        storage
            .save("foo-bar", "foo-bar-1.0.tar.gz", b"archive")
            .await
            .unwrap();

        assert!(
            temp_dir
                .path()
                .join("f")
                .join("foo-bar")
                .join("foo-bar-1.0.tar.gz")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        for version in ["1.0", "2.0", "1.5"] {
            storage
                .save("pkg", &format!("pkg-{version}.tar.gz"), b"x")
                .await
                .unwrap();
        }
        storage.save("pkg", "README", b"x").await.unwrap();

        let entries = storage.list("pkg").await.unwrap();
        assert_eq!(
            filenames(&entries),
            vec!["pkg-2.0.tar.gz", "pkg-1.5.tar.gz", "pkg-1.0.tar.gz", "README"]
        );
        assert_eq!(entries[0].version.as_deref(), Some("2.0"));
        assert_eq!(entries[3].version, None);
    }

    #[tokio::test]
    async fn test_list_orders_numerically() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        for name in ["pkg-1.9.zip", "pkg-1.10.zip", "pkg-1.10rc1.zip"] {
            storage.save("pkg", name, b"x").await.unwrap();
        }

        let entries = storage.list("pkg").await.unwrap();
        assert_eq!(
            filenames(&entries),
            vec!["pkg-1.10.zip", "pkg-1.10rc1.zip", "pkg-1.9.zip"]
        );
    }

    #[tokio::test]
    async fn test_list_missing_distro_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        assert!(storage.list("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        storage.save("pkg", "pkg-1.0.zip", b"first").await.unwrap();
        assert!(matches!(
            storage.save("pkg", "pkg-1.0.zip", b"second").await,
            Err(Error::Conflict(_))
        ));

        let (mut reader, size) = storage.open("pkg", "pkg-1.0.zip").await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"first");
        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        for bad in ["../escape.zip", "a/b.zip", "..", ""] {
            assert!(matches!(
                storage.save("pkg", bad, b"x").await,
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            storage.list("../pkg").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_info_and_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        storage.save("pkg", "pkg-0.1.tar", b"123").await.unwrap();

        let info = storage.info("pkg", "pkg-0.1.tar").await.unwrap();
        assert_eq!(info.size, 3);
        assert_eq!(info.version.as_deref(), Some("0.1"));
        assert_eq!(
            info.sha256,
            "a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3"
        );

        assert!(matches!(
            storage.info("pkg", "pkg-9.9.tar").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_distro() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ArchiveStorage::new(temp_dir.path());

        storage.save("pkg", "pkg-1.0.zip", b"x").await.unwrap();
        storage.save("pkg", "pkg-2.0.zip", b"x").await.unwrap();
        assert!(storage.remove("pkg", "pkg-2.0.zip").await.unwrap());
        assert!(!storage.remove("pkg", "pkg-2.0.zip").await.unwrap());
        assert_eq!(filenames(&storage.list("pkg").await.unwrap()), vec!["pkg-1.0.zip"]);

        assert!(storage.remove_distro("pkg").await.unwrap());
        assert!(storage.list("pkg").await.unwrap().is_empty());
        assert!(!storage.remove_distro("pkg").await.unwrap());
    }
}
