//! Positional file I/O for the log.

use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileExt,
    path::{Path, PathBuf},
};

use crate::types::PeerId;

/// Path of a peer's log file under `dir`.
pub fn log_path(dir: &Path, peer: &PeerId) -> PathBuf {
    dir.join(format!("rafter_{}.log", peer.name))
}

/// Path of a peer's metadata file under `dir`.
pub fn meta_path(dir: &Path, peer: &PeerId) -> PathBuf {
    dir.join(format!("rafter_{}.meta", peer.name))
}

/// A log file opened for positional reads and writes.
///
/// The single actor owning this handle is the only writer; readers go through
/// the same actor, so no locking happens at this layer.
pub struct LogFile {
    file: File,
    path: PathBuf,
}

impl LogFile {
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    pub fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        self.file.write_all_at(buf, offset)
    }

    pub fn truncate(&self, len: u64) -> io::Result<()> {
        self.file.set_len(len)
    }

    pub fn sync_data(&self) -> io::Result<()> {
        self.file.sync_data()
    }
}
