//! ABOUTME: Local filesystem storage adapter (§4.A "Local filesystem adapter")
//! ABOUTME: One file per entity; exclusive-create backs `put_if_absent` the same way a pidfile does

use async_trait::async_trait;
use noema_core::{Error, Result, SizeEstimate, StorageAdapter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// One file per entity under `root`; directories are created lazily on
/// first write into them. `put_if_absent` is implemented via
/// `O_EXCL`-style exclusive file creation, the same primitive a pidfile
/// uses to detect an already-running process.
#[derive(Debug)]
pub struct FilesystemAdapter {
    root: PathBuf,
}

impl FilesystemAdapter {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write `bytes` to a temp file in the same directory, then rename
    /// into place, so a reader never observes a partial write (§4.A
    /// "adapters must never partially write an entity").
    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_parent(path).await?;
        let tmp_path = path.with_extension(format!(
            "tmp-{}",
            uuid::Uuid::new_v4().simple()
        ));
        {
            let mut tmp = fs::File::create(&tmp_path).await?;
            tmp.write_all(bytes).await?;
            tmp.sync_all().await?;
        }
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FilesystemAdapter {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key);
        Self::write_atomic(&path, &bytes).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.path_for(prefix);
        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    if let Some(rel) = rel.to_str() {
                        let rel = rel.replace(std::path::MAIN_SEPARATOR, "/");
                        if rel.starts_with(prefix) && !rel.ends_with(".lock.tmp") {
                            out.push(rel);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    async fn put_if_absent(&self, key: &str, bytes: Vec<u8>) -> Result<bool> {
        let path = self.path_for(key);
        Self::ensure_parent(&path).await?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(&bytes).await?;
                file.sync_all().await?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn estimate_size(&self) -> Result<SizeEstimate> {
        let mut per_folder: HashMap<String, u64> = HashMap::new();
        let mut used_bytes = 0u64;
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(path);
                } else {
                    used_bytes += meta.len();
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        let folder = rel
                            .components()
                            .next()
                            .map(|c| c.as_os_str().to_string_lossy().to_string())
                            .unwrap_or_default();
                        *per_folder.entry(folder).or_default() += meta.len();
                    }
                }
            }
        }
        Ok(SizeEstimate {
            used_bytes,
            quota_bytes: None,
            per_folder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrips_through_temp_directory() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path()).await.unwrap();
        adapter.put("nouns/a", b"v".to_vec()).await.unwrap();
        assert_eq!(adapter.get("nouns/a").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn put_if_absent_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path()).await.unwrap();
        assert!(adapter
            .put_if_absent("locks/p1.lock", b"a".to_vec())
            .await
            .unwrap());
        assert!(!adapter
            .put_if_absent("locks/p1.lock", b"b".to_vec())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn list_recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path()).await.unwrap();
        adapter.put("index/0/entry_point", vec![1]).await.unwrap();
        let keys = adapter.list("index/").await.unwrap();
        assert_eq!(keys, vec!["index/0/entry_point".to_string()]);
    }

    #[tokio::test]
    async fn delete_missing_key_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FilesystemAdapter::new(dir.path()).await.unwrap();
        adapter.delete("nouns/missing").await.unwrap();
    }
}
