//! On-disk sidecar format.
//!
//! A store saved at base path `P` owns up to three files:
//!
//! | File | Content | Present |
//! |------|---------|---------|
//! | `P.meta` | JSON configuration, id/slot tables, deletions, metadata | always |
//! | `P.index` | backend-native serialized index | flat, quantized, graph |
//! | `P.raw` | dense little-endian `f32` matrix dump | fallback |
//!
//! Every file is written to a temporary sibling and renamed into place, so
//! no single sidecar is ever torn. `.meta` is written last and records a
//! SHA-256 digest of the backend sidecar it was saved with. A crash between
//! the two renames leaves a new backend sidecar next to an old `.meta`; load
//! detects the digest mismatch and fails instead of pairing them.

mod meta;
mod raw;

pub use meta::{FORMAT_VERSION, StoreMeta};
pub use raw::{RAW_MAGIC, read_matrix, write_matrix};

use crate::models::BackendKind;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// One of the files making up a persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sidecar {
    /// Configuration and mapping tables.
    Meta,
    /// Backend-native index.
    Index,
    /// Raw matrix dump.
    Raw,
}

impl Sidecar {
    /// All sidecar kinds.
    pub const ALL: [Self; 3] = [Self::Meta, Self::Index, Self::Raw];

    /// File extension appended to the base path.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Index => "index",
            Self::Raw => "raw",
        }
    }

    /// The sidecar holding the vectors of a `backend` store.
    #[must_use]
    pub const fn for_backend(backend: BackendKind) -> Self {
        match backend {
            BackendKind::Fallback => Self::Raw,
            BackendKind::Flat | BackendKind::Quantized | BackendKind::Graph => Self::Index,
        }
    }
}

/// Returns the path of a sidecar for the store rooted at `base`.
///
/// The extension is appended rather than substituted, so store names that
/// contain dots keep their full name.
#[must_use]
pub fn sidecar_path(base: &Path, sidecar: Sidecar) -> PathBuf {
    append_extension(base, sidecar.extension())
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

/// Returns true if a store has been saved at `base`.
#[must_use]
pub fn exists(base: &Path) -> bool {
    sidecar_path(base, Sidecar::Meta).is_file()
}

/// Builds a [`Error::Persistence`] for `path`.
pub fn persistence_error(path: &Path, cause: impl Display) -> Error {
    Error::Persistence {
        path: path.display().to_string(),
        cause: cause.to_string(),
    }
}

/// Temporary sibling used while writing `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    append_extension(path, "tmp")
}

/// Creates the parent directory of `path` if needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_store_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }
    Ok(())
}

/// Moves a fully written temporary file over its destination.
///
/// # Errors
///
/// Returns an error if the rename fails.
pub fn commit(temp: &Path, path: &Path) -> Result<()> {
    fs::rename(temp, path).map_err(|e| Error::OperationFailed {
        operation: "commit_sidecar".to_string(),
        cause: format!("{}: {e}", path.display()),
    })
}

/// Writes `bytes` to `path` through a temporary file and rename.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let temp = temp_path(path);

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    write().map_err(|e| Error::OperationFailed {
        operation: "write_sidecar".to_string(),
        cause: format!("{}: {e}", temp.display()),
    })?;

    commit(&temp, path)
}

/// Reads a sidecar, mapping a missing or unreadable file to a persistence error.
///
/// # Errors
///
/// Returns [`Error::Persistence`] if the file cannot be read.
pub fn read_sidecar(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| persistence_error(path, e))
}

/// Hex-encoded SHA-256 of a sidecar's bytes.
///
/// # Errors
///
/// Returns [`Error::Persistence`] if the file cannot be read.
pub fn digest(path: &Path) -> Result<String> {
    let bytes = read_sidecar(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Removes a sidecar, ignoring files that do not exist.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub fn remove_sidecar(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::OperationFailed {
            operation: "remove_sidecar".to_string(),
            cause: format!("{}: {e}", path.display()),
        }),
    }
}

/// Removes every sidecar of the store rooted at `base`.
///
/// # Errors
///
/// Returns an error if an existing file cannot be removed.
pub fn remove_all(base: &Path) -> Result<usize> {
    let mut removed = 0;
    for sidecar in Sidecar::ALL {
        if remove_sidecar(&sidecar_path(base, sidecar))? {
            removed += 1;
        }
    }
    Ok(removed)
}
