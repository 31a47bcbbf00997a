//! Atomic JSON document I/O.
//!
//! Documents are written to a temporary file in the destination directory
//! and then renamed into place with `tempfile::NamedTempFile::persist()`, so
//! a reader only ever sees the previous or the next complete document. If
//! anything fails before the rename the temporary file is dropped and the
//! old document is untouched.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{AppError, Result};

/// Atomically replace `path` with the pretty JSON encoding of `value`.
///
/// # Errors
///
/// Returns `AppError::Io` if the directory, temporary file, or rename fails.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = stage(path, value)?;
    tmp.persist(path).map_err(|err| {
        AppError::Io(format!("failed to persist {}: {err}", path.display()))
    })?;
    Ok(())
}

/// Atomically create `path` with the JSON encoding of `value`, refusing to
/// overwrite an existing file.
///
/// # Errors
///
/// Returns `AppError::AlreadyExists` if `path` is taken, or `AppError::Io`
/// on any other failure.
pub fn create_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = stage(path, value)?;
    tmp.persist_noclobber(path).map_err(|err| {
        if err.error.kind() == ErrorKind::AlreadyExists {
            AppError::AlreadyExists(path.display().to_string())
        } else {
            AppError::Io(format!("failed to persist {}: {}", path.display(), err.error))
        }
    })?;
    Ok(())
}

/// Read and decode a JSON document.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the file is missing, `AppError::Io` if it
/// cannot be read, or `AppError::Decode` if its content is malformed.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            AppError::NotFound(path.display().to_string())
        } else {
            AppError::Io(format!("failed to read {}: {err}", path.display()))
        }
    })?;
    serde_json::from_str(&raw)
        .map_err(|err| AppError::Decode(format!("{}: {err}", path.display())))
}

fn stage<T: Serialize>(path: &Path, value: &T) -> Result<NamedTempFile> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Io(format!("{} has no parent directory", path.display())))?;

    fs::create_dir_all(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create directory {}: {err}",
            parent.display()
        ))
    })?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;

    let mut encoded = serde_json::to_vec_pretty(value)
        .map_err(|err| AppError::Store(format!("failed to encode document: {err}")))?;
    encoded.push(b'\n');

    tmp.write_all(&encoded)
        .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| AppError::Io(format!("failed to sync temporary file: {err}")))?;

    Ok(tmp)
}
