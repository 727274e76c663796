// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Pluggable filesystem capability.
//!
//! Everything inside a view's output folder (clearing it, writing the
//! patched entry files, manifest and HTML shell reads, bundle asset
//! serving) goes through the [`FileSystem`] trait, so hosts can redirect
//! it and tests can run against [`MemoryFileSystem`].
//!
//! Resolution of views, option paths and package files, and the reading of
//! entry sources, always use the real disk: the external bundler reads
//! those files as well.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SsrError};

/// Filesystem operations used by the renderer.
///
/// `mkdir` and `rm` are recursive.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Returns true if a file or directory exists at `path`.
    fn exists(&self, path: &Path) -> bool;
    /// Reads a UTF-8 file.
    fn read(&self, path: &Path) -> Result<String>;
    /// Writes (creates or truncates) a file.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    /// Creates a directory and all missing parents.
    fn mkdir(&self, path: &Path) -> Result<()>;
    /// Removes a file or a directory tree.
    fn rm(&self, path: &Path) -> Result<()>;
}

/// Shared handle to a filesystem capability.
pub type SharedFs = Arc<dyn FileSystem>;

/// The real filesystem, via `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFileSystem;

impl RealFileSystem {
    /// Returns the real filesystem as a shared capability.
    pub fn shared() -> SharedFs {
        Arc::new(RealFileSystem)
    }
}

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| io_context(e, "read", path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).map_err(|e| io_context(e, "write", path))
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| io_context(e, "create", path))
    }

    fn rm(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| io_context(e, "remove", path))
    }
}

fn io_context(err: io::Error, action: &str, path: &Path) -> SsrError {
    SsrError::Io(io::Error::new(
        err.kind(),
        format!("failed to {} {}: {}", action, path.display(), err),
    ))
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<PathBuf, String>,
    dirs: BTreeSet<PathBuf>,
}

/// In-memory filesystem for tests and embedding.
///
/// Paths are normalized lexically, so `a/./b` and `a/b` are the same entry.
/// Writing a file implicitly creates its parent directories.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    tree: Arc<Mutex<MemoryTree>>,
}

impl MemoryFileSystem {
    /// Creates an empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, creating parent directories.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        // Writing into a fresh tree only fails on a poisoned lock.
        let _ = self.write(path.as_ref(), &contents.into());
        self
    }

    /// Adds a directory.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        let _ = self.mkdir(path.as_ref());
        self
    }

    /// Lists every file path currently stored, in order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.tree
            .lock()
            .map(|tree| tree.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryTree>> {
        self.tree
            .lock()
            .map_err(|_| SsrError::Cache("Failed to acquire memory filesystem lock".to_string()))
    }
}

fn insert_dirs(tree: &mut MemoryTree, path: &Path) {
    let mut current = PathBuf::new();
    for component in path.components() {
        current.push(component);
        tree.dirs.insert(current.clone());
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        match self.tree.lock() {
            Ok(tree) => tree.files.contains_key(&path) || tree.dirs.contains(&path),
            Err(_) => false,
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        let path = normalize(path);
        self.lock()?.files.get(&path).cloned().ok_or_else(|| {
            SsrError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("failed to read {}: no such file", path.display()),
            ))
        })
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let path = normalize(path);
        let mut tree = self.lock()?;
        if let Some(parent) = path.parent() {
            insert_dirs(&mut tree, parent);
        }
        tree.files.insert(path, contents.to_string());
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut tree = self.lock()?;
        insert_dirs(&mut tree, &path);
        Ok(())
    }

    fn rm(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut tree = self.lock()?;
        tree.files.retain(|p, _| !p.starts_with(&path));
        tree.dirs.retain(|p| !p.starts_with(&path));
        Ok(())
    }
}

/// Lexically normalizes a path: drops `.` components and folds `..` into
/// the preceding component. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Makes `path` absolute against the current directory and normalizes it.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn memory_fs_round_trips_and_removes_trees() {
        let fs = MemoryFileSystem::new().with_file("/proj/dist/a/index.html", "<html>");
        assert!(fs.exists(Path::new("/proj/dist/a")));
        assert!(fs.exists(Path::new("/proj/dist/./a/index.html")));
        assert_eq!(fs.read(Path::new("/proj/dist/a/index.html")).unwrap(), "<html>");

        fs.rm(Path::new("/proj/dist/a")).unwrap();
        assert!(!fs.exists(Path::new("/proj/dist/a/index.html")));
        assert!(!fs.exists(Path::new("/proj/dist/a")));
        assert!(fs.exists(Path::new("/proj/dist")));
        assert!(fs.read(Path::new("/proj/dist/a/index.html")).is_err());
    }

    #[test]
    fn real_fs_rm_is_recursive() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("out/views/Index");
        let fs = RealFileSystem;
        fs.mkdir(&nested).unwrap();
        fs.write(&nested.join("index.html"), "x").unwrap();

        fs.rm(&temp.path().join("out")).unwrap();
        assert!(!fs.exists(&temp.path().join("out")));
    }
}
