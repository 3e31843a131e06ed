//! Dataset storage
//!
//! Explicit filesystem capability handed to the dataset store: one directory
//! per dataset under a root, atomic replace-by-rename writes, restrictive
//! permissions on key files. Callers validate dataset names before any path
//! is formed here.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const SCHEMA_FILE: &str = "schema.json";
pub const KEY_FILE: &str = "private.key";
pub const INDEX_FILE: &str = "index.csv";
pub const LOG_FILE: &str = "changes.log";

/// Filesystem root for all datasets of one server instance.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn schema_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(SCHEMA_FILE)
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(KEY_FILE)
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(INDEX_FILE)
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.dataset_dir(name).join(LOG_FILE)
    }

    pub fn ensure_dataset_dir(&self, name: &str) -> io::Result<()> {
        fs::create_dir_all(self.dataset_dir(name))
    }

    /// Replace `path` atomically: stage in a sibling temp file, fsync, rename.
    /// A crash leaves either the old or the new content, never a torn file.
    pub fn atomic_write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let tmp_path = path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(contents)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)
    }

    /// Atomic write for key material, with owner-only permissions on unix.
    pub fn atomic_write_secret(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.atomic_write(path, contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Read a file, mapping "not found" to `Ok(None)`.
    pub fn read_optional(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let path = dir.path().join("file.txt");

        storage.atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        storage.atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");

        // No temp residue after a successful write.
        assert!(!path.with_extension("tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn secret_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        let path = dir.path().join("private.key");

        storage.atomic_write_secret(&path, &[0x42; 32]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn read_optional_distinguishes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path());
        assert_eq!(
            storage.read_optional(&dir.path().join("absent")).unwrap(),
            None
        );
    }
}
