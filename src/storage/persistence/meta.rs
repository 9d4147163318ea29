//! The `.meta` sidecar.

use super::{Sidecar, digest, persistence_error, read_sidecar, sidecar_path, write_atomic};
use crate::models::{Metadata, StoreConfig};
use crate::storage::traits::Slot;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Current `.meta` format version.
pub const FORMAT_VERSION: u32 = 1;

/// Everything a store needs besides the backend itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Format version of this sidecar.
    pub format_version: u32,
    /// Store configuration, with the backend that was actually active.
    pub config: StoreConfig,
    /// Live ids to their slots.
    pub id_to_slot: BTreeMap<String, Slot>,
    /// Every allocated slot to its id, soft-deleted slots included.
    pub slot_to_id: BTreeMap<Slot, String>,
    /// Next slot the store expects the backend to assign.
    pub next_slot: Slot,
    /// Per-id metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, Metadata>,
    /// Soft-deleted slots.
    #[serde(default)]
    pub deleted: BTreeSet<Slot>,
    /// Whether the backend was trained at save time.
    pub trained: bool,
    /// SHA-256 of the backend sidecar written by the same save.
    pub backend_digest: String,
}

impl StoreMeta {
    /// Writes the sidecar for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, base: &Path) -> Result<()> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_store_meta".to_string(),
            cause: e.to_string(),
        })?;
        write_atomic(&sidecar_path(base, Sidecar::Meta), &bytes)
    }

    /// Reads the sidecar for the store rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the file is missing, unparsable, of
    /// an unknown version, or carries an invalid configuration.
    pub fn read(base: &Path) -> Result<Self> {
        let path = sidecar_path(base, Sidecar::Meta);
        let bytes = read_sidecar(&path)?;
        let meta: Self =
            serde_json::from_slice(&bytes).map_err(|e| persistence_error(&path, e))?;

        if meta.format_version != FORMAT_VERSION {
            return Err(persistence_error(
                &path,
                format!("unsupported format version {}", meta.format_version),
            ));
        }
        meta.config
            .validate()
            .map_err(|e| persistence_error(&path, e))?;

        Ok(meta)
    }

    /// Checks that the backend sidecar on disk is the one this `.meta` was
    /// saved with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if the sidecar is missing or its digest
    /// differs.
    pub fn check_backend_digest(&self, base: &Path) -> Result<()> {
        let path = sidecar_path(base, Sidecar::for_backend(self.config.backend));
        let actual = digest(&path)?;
        if actual != self.backend_digest {
            return Err(persistence_error(
                &path,
                "backend sidecar does not match .meta (interrupted save?)",
            ));
        }
        Ok(())
    }

    /// Checks the mapping tables against each other and the loaded backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] describing the first inconsistency.
    pub fn check_consistency(&self, base: &Path, backend_len: usize) -> Result<()> {
        let path = sidecar_path(base, Sidecar::Meta);
        let fail = |cause: String| Err(persistence_error(&path, cause));

        if self.next_slot as usize > backend_len {
            return fail(format!(
                "next slot {} beyond backend size {backend_len}",
                self.next_slot
            ));
        }
        for (id, slot) in &self.id_to_slot {
            if self.slot_to_id.get(slot) != Some(id) {
                return fail(format!("id '{id}' maps to slot {slot} which maps elsewhere"));
            }
            if self.deleted.contains(slot) {
                return fail(format!("live id '{id}' points at deleted slot {slot}"));
            }
        }
        if let Some(slot) = self.slot_to_id.keys().find(|s| **s >= self.next_slot) {
            return fail(format!("slot {slot} is not below next slot {}", self.next_slot));
        }
        if let Some(slot) = self.deleted.iter().find(|s| !self.slot_to_id.contains_key(*s)) {
            return fail(format!("deleted slot {slot} has no id"));
        }
        let live: BTreeSet<Slot> = self.id_to_slot.values().copied().collect();
        if let Some(slot) = self
            .slot_to_id
            .keys()
            .find(|s| !live.contains(*s) && !self.deleted.contains(*s))
        {
            return fail(format!("slot {slot} is neither live nor deleted"));
        }
        if let Some(id) = self.metadata.keys().find(|id| !self.id_to_slot.contains_key(*id)) {
            return fail(format!("metadata for unknown id '{id}'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StoreMeta {
        let mut meta = StoreMeta {
            format_version: FORMAT_VERSION,
            config: StoreConfig::new(4),
            id_to_slot: BTreeMap::new(),
            slot_to_id: BTreeMap::new(),
            next_slot: 3,
            metadata: BTreeMap::new(),
            deleted: BTreeSet::new(),
            trained: true,
            backend_digest: String::new(),
        };
        meta.id_to_slot.insert("a".to_string(), 0);
        meta.id_to_slot.insert("b".to_string(), 2);
        meta.slot_to_id.insert(0, "a".to_string());
        meta.slot_to_id.insert(1, "b".to_string());
        meta.slot_to_id.insert(2, "b".to_string());
        meta.deleted.insert(1);
        meta
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        let meta = sample();

        meta.write(&base).expect("write failed");
        let loaded = StoreMeta::read(&base).expect("read failed");
        assert_eq!(loaded, meta);
    }

    #[test]
    fn test_consistent_tables_pass() {
        let meta = sample();
        assert!(meta.check_consistency(Path::new("items"), 3).is_ok());
    }

    #[test]
    fn test_short_backend_rejected() {
        let meta = sample();
        assert!(meta.check_consistency(Path::new("items"), 2).is_err());
    }

    #[test]
    fn test_live_id_on_deleted_slot_rejected() {
        let mut meta = sample();
        meta.deleted.insert(2);
        assert!(matches!(
            meta.check_consistency(Path::new("items"), 3),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn test_orphan_slot_rejected() {
        let mut meta = sample();
        meta.deleted.remove(&1);

        let result = meta.check_consistency(Path::new("items"), 3);
        match result {
            Err(Error::Persistence { cause, .. }) => {
                assert!(cause.contains("neither live nor deleted"), "{cause}");
            },
            other => panic!("expected persistence error, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_digest_checked() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        let index = sidecar_path(&base, Sidecar::Index);
        write_atomic(&index, b"generation one").expect("write failed");

        let mut meta = sample();
        meta.backend_digest = digest(&index).expect("digest failed");
        assert!(meta.check_backend_digest(&base).is_ok());

        write_atomic(&index, b"generation two").expect("write failed");
        assert!(matches!(
            meta.check_backend_digest(&base),
            Err(Error::Persistence { .. })
        ));

        std::fs::remove_file(&index).expect("remove failed");
        assert!(meta.check_backend_digest(&base).is_err());
    }

    #[test]
    fn test_corrupt_json_rejected() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        std::fs::write(sidecar_path(&base, Sidecar::Meta), b"{not json").expect("write failed");

        assert!(matches!(
            StoreMeta::read(&base),
            Err(Error::Persistence { .. })
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let dir = TempDir::new().expect("tempdir failed");
        let base = dir.path().join("items");
        let mut meta = sample();
        meta.format_version = 99;
        meta.write(&base).expect("write failed");

        assert!(StoreMeta::read(&base).is_err());
    }
}
