// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Path resolution for user-supplied files and folders.
//!
//! A path that already exists (absolute, or relative to the current
//! directory) is returned in absolute form as-is. Anything else is looked up
//! under a root folder. Folders may be created on demand; files never are.
//!
//! Package files (the default template and entry files) are compiled into
//! the crate and written out on first use, since external bundlers read
//! them from disk.

use std::path::{Path, PathBuf};

use include_dir::{include_dir, Dir};

use crate::error::{Result, SsrError};
use crate::fs::{absolutize, normalize, FileSystem};

static BUILD_FILES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/build-files");

/// Folder under the output root that package files are written to.
pub const PACKAGE_FOLDER: &str = ".ssrkit";

/// Resolves a folder, optionally creating it under `root`.
///
/// # Errors
///
/// - [`SsrError::Configuration`] when `folder` is blank, or when it does not
///   exist and no `root` was given.
/// - [`SsrError::NotFound`] when the joined path is absent and
///   `create_if_missing` is false.
pub fn resolve_folder(
    fs: &dyn FileSystem,
    folder: &str,
    root: Option<&Path>,
    create_if_missing: bool,
) -> Result<PathBuf> {
    if folder.trim().is_empty() {
        return Err(SsrError::Configuration(
            "Cannot resolve an undefined folder.".to_string(),
        ));
    }

    if fs.exists(Path::new(folder)) {
        return absolutize(Path::new(folder));
    }

    let root = root.ok_or_else(|| {
        SsrError::Configuration(format!(
            "Failed to resolve folder '{}': no root folder has been set and the folder does not exist.",
            folder
        ))
    })?;

    let joined = normalize(&root.join(folder));
    if !fs.exists(&joined) {
        if create_if_missing {
            tracing::debug!(path = %joined.display(), "creating missing folder");
            fs.mkdir(&joined)?;
        } else {
            return Err(SsrError::NotFound(format!(
                "Folder at path {} does not exist.",
                joined.display()
            )));
        }
    }

    absolutize(&joined)
}

/// Resolves a file under `root`. Files are never created.
///
/// # Errors
///
/// - [`SsrError::Configuration`] when `file` is blank, or when it does not
///   exist and no `root` was given.
/// - [`SsrError::NotFound`] when the joined path is absent.
pub fn resolve_file(fs: &dyn FileSystem, file: &str, root: Option<&Path>) -> Result<PathBuf> {
    if file.trim().is_empty() {
        return Err(SsrError::Configuration(
            "Cannot resolve an undefined file.".to_string(),
        ));
    }

    if fs.exists(Path::new(file)) {
        return absolutize(Path::new(file));
    }

    let root = root.ok_or_else(|| {
        SsrError::Configuration(format!(
            "Cannot resolve file '{}' because no root folder has been set.",
            file
        ))
    })?;

    let joined = normalize(&root.join(file));
    if !fs.exists(&joined) {
        return Err(SsrError::NotFound(format!(
            "File at path {} does not exist.",
            joined.display()
        )));
    }

    absolutize(&joined)
}

/// Contents of a file shipped with this crate, e.g. `build-files/app.js`.
pub fn package_file(file: &str) -> Option<&'static str> {
    file.strip_prefix("build-files/")
        .and_then(|name| BUILD_FILES.get_file(name))
        .and_then(|entry| entry.contents_utf8())
}

/// Resolves a file shipped with this crate by writing it to
/// `{dest}/.ssrkit/{file}`. An up-to-date copy is left untouched.
///
/// # Errors
///
/// [`SsrError::NotFound`] when no such package file exists.
pub fn resolve_package_file(fs: &dyn FileSystem, file: &str, dest: &Path) -> Result<PathBuf> {
    let contents = package_file(file).ok_or_else(|| {
        SsrError::NotFound(format!("Package file {} does not exist.", file))
    })?;

    let path = normalize(&dest.join(PACKAGE_FOLDER).join(file));
    if fs.exists(&path) && fs.read(&path).ok().as_deref() == Some(contents) {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs.mkdir(parent)?;
    }
    tracing::debug!(path = %path.display(), "writing package file");
    fs.write(&path, contents)?;
    Ok(path)
}
