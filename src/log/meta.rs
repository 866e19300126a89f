//! Peer-local metadata: current term and vote.
//!
//! The record lives in its own small file next to the log and is replaced
//! atomically on every update: write a temp file, fsync it, rename over the
//! target, fsync the directory. A torn metadata write can therefore never be
//! observed; either the old record or the new one is read back.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::LogResult,
    log::file::meta_path,
    types::PeerId,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Metadata {
    pub current_term: u64,
    pub voted_for: Option<PeerId>,
}

impl Metadata {
    pub fn serialize(&self) -> LogResult<Vec<u8>> {
        let config = bincode::config::standard();
        Ok(bincode::encode_to_vec(self, config)?)
    }

    fn deserialize(data: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let config = bincode::config::standard();
        Ok(bincode::decode_from_slice(data, config)?.0)
    }
}

pub(crate) struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: &Path, peer: &PeerId) -> Self {
        Self {
            path: meta_path(dir, peer),
        }
    }

    /// Load the metadata record, tolerating absence.
    ///
    /// A missing file next to an empty log is the normal first boot. A
    /// missing or undecodable file next to a populated log loses the vote
    /// record; that is survivable (the caller overwrites it on the next
    /// election step) but worth shouting about.
    pub fn load(&self, log_populated: bool) -> LogResult<Metadata> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if log_populated {
                    warn!(
                        path = %self.path.display(),
                        "metadata file missing but log is populated, using defaults"
                    );
                }
                return Ok(Metadata::default());
            }
            Err(e) => return Err(e.into()),
        };

        match Metadata::deserialize(&bytes) {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "metadata file corrupt ({}), using defaults", e
                );
                Ok(Metadata::default())
            }
        }
    }

    /// Durably replace the metadata record.
    pub fn store(&self, metadata: &Metadata) -> LogResult<()> {
        let bytes = metadata.serialize()?;
        let tmp_path = self.path.with_extension("meta.tmp");

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(&bytes)?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;

        // Persist the rename itself.
        if let Some(dir) = self.path.parent() {
            File::open(dir)?.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let peer = PeerId::new("meta");
        let store = MetadataStore::new(dir.path(), &peer);

        let metadata = Metadata {
            current_term: 9,
            voted_for: Some(PeerId::new("candidate")),
        };
        store.store(&metadata).unwrap();

        assert_eq!(store.load(true).unwrap(), metadata);
        // No temp file left behind.
        assert!(!dir.path().join("rafter_meta.meta.tmp").exists());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let peer = PeerId::new("fresh");
        let store = MetadataStore::new(dir.path(), &peer);

        assert_eq!(store.load(false).unwrap(), Metadata::default());
        assert_eq!(store.load(true).unwrap(), Metadata::default());
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let peer = PeerId::new("hurt");
        let store = MetadataStore::new(dir.path(), &peer);

        fs::write(meta_path(dir.path(), &peer), [0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(store.load(true).unwrap(), Metadata::default());
    }

    #[test]
    fn test_overwrite_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let peer = PeerId::new("meta");
        let store = MetadataStore::new(dir.path(), &peer);

        store
            .store(&Metadata {
                current_term: 1,
                voted_for: Some(PeerId::new("a")),
            })
            .unwrap();
        store
            .store(&Metadata {
                current_term: 2,
                voted_for: None,
            })
            .unwrap();

        let loaded = store.load(true).unwrap();
        assert_eq!(loaded.current_term, 2);
        assert_eq!(loaded.voted_for, None);
    }
}
