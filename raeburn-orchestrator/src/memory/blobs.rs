use crate::error::MemoryError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Side-file storage for entry payloads too large or too binary for the
/// shard row. One file per handle under `<root>/blobs/<uuid>.bin`; the
/// owning entry keeps the handle in `blob_ref`.
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join("blobs"),
        }
    }

    pub fn write(&self, bytes: &[u8]) -> Result<String, MemoryError> {
        fs::create_dir_all(&self.dir)?;
        let handle = format!("{}.bin", Uuid::new_v4());
        fs::write(self.dir.join(&handle), bytes)?;
        Ok(handle)
    }

    pub fn read(&self, handle: &str) -> Result<Vec<u8>, MemoryError> {
        Ok(fs::read(self.dir.join(handle))?)
    }

    /// Remove one blob; missing files are fine (delete is idempotent).
    pub fn remove(&self, handle: &str) {
        let path = self.dir.join(handle);
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(blob = handle, error = %err, "failed to remove blob");
            }
        }
    }

    /// Delete every blob file not in the referenced set; returns how many
    /// were removed.
    pub fn remove_unreferenced(&self, referenced: &HashSet<String>) -> Result<usize, MemoryError> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in dir.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !referenced.contains(&name) {
                tracing::warn!(blob = %name, "removing orphan blob");
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn exists(&self, handle: &str) -> bool {
        self.dir.join(handle).is_file()
    }
}
