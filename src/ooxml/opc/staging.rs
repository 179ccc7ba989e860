//! On-disk staging area for archive members the object model does not understand.
//!
//! A staging directory belongs to exactly one root object. Blobs are written under generated
//! names (`extra-0001.bin`, ...) so hostile archive paths never reach the file system.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::ooxml::opc::error::{OpcError, Result};

#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
    next: usize,
}

impl StagingDir {
    /// Create a staging directory, under `root` when given, else in the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("kumquat-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| OpcError::Staging {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            op: "create",
            source,
        })?;
        debug!(path = %dir.path().display(), "staging directory created");
        Ok(Self { dir, next: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a blob to a fresh file and return its location.
    pub fn stage(&mut self, data: &[u8]) -> Result<PathBuf> {
        self.next += 1;
        let path = self.dir.path().join(format!("extra-{:04}.bin", self.next));
        std::fs::write(&path, data).map_err(|source| OpcError::Staging {
            path: path.clone(),
            op: "write",
            source,
        })?;
        Ok(path)
    }

    /// Read a staged blob back.
    pub fn load(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|source| OpcError::Staging {
            path: path.to_path_buf(),
            op: "read",
            source,
        })
    }

    /// Delete the directory and everything in it. Dropping also deletes, but silently.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| OpcError::Staging {
            path,
            op: "remove",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_load() {
        let mut staging = StagingDir::create(None).unwrap();
        let a = staging.stage(b"first").unwrap();
        let b = staging.stage(b"second").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with(staging.path()));
        assert_eq!(staging.load(&b).unwrap(), b"second");
    }

    #[test]
    fn test_close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let mut staging = StagingDir::create(Some(root.path())).unwrap();
        let staged = staging.stage(b"x").unwrap();
        let dir = staging.path().to_path_buf();
        staging.close().unwrap();
        assert!(!dir.exists());
        assert!(!staged.exists());
    }

    #[test]
    fn test_missing_root_reports_context() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        match StagingDir::create(Some(&missing)) {
            Err(OpcError::Staging { path, op, .. }) => {
                assert_eq!(path, missing);
                assert_eq!(op, "create");
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
