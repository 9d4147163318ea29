//! Raw matrix dump used by the fallback backend.
//!
//! Layout: 8-byte magic, `u64` row count, `u64` dimension, then
//! `rows * dimension` little-endian `f32` values in row-major order.

use super::{persistence_error, read_sidecar, write_atomic};
use crate::Result;
use std::path::Path;

/// File magic for raw matrix dumps.
pub const RAW_MAGIC: &[u8; 8] = b"VSRAW001";

const HEADER_LEN: usize = 24;

/// Writes a row-major matrix to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_matrix(path: &Path, dimension: usize, data: &[f32]) -> Result<()> {
    let rows = if dimension == 0 { 0 } else { data.len() / dimension };
    let mut bytes = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    bytes.extend_from_slice(RAW_MAGIC);
    bytes.extend_from_slice(&(rows as u64).to_le_bytes());
    bytes.extend_from_slice(&(dimension as u64).to_le_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    write_atomic(path, &bytes)
}

/// Reads a matrix written by [`write_matrix`], returning `(dimension, data)`.
///
/// # Errors
///
/// Returns [`Error::Persistence`](crate::Error::Persistence) if the file is
/// missing, has the wrong magic, or its length disagrees with its header.
pub fn read_matrix(path: &Path) -> Result<(usize, Vec<f32>)> {
    let bytes = read_sidecar(path)?;
    if bytes.len() < HEADER_LEN || &bytes[..8] != RAW_MAGIC {
        return Err(persistence_error(path, "not a raw matrix dump"));
    }

    let rows = read_u64(&bytes[8..16]);
    let dimension = read_u64(&bytes[16..24]);
    let expected = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| persistence_error(path, "matrix header overflows"))?;

    let body = &bytes[HEADER_LEN..];
    if body.len() != expected {
        return Err(persistence_error(
            path,
            format!(
                "matrix body is {} bytes, header declares {rows}x{dimension}",
                body.len()
            ),
        ));
    }

    let data = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    let dimension =
        usize::try_from(dimension).map_err(|e| persistence_error(path, e))?;
    Ok((dimension, data))
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
