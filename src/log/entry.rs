//! On-disk entry framing.
//!
//! A single entry occupies two contiguous regions:
//!
//! ```text
//! Header+Data (variable):
//!   hash(20) || kind(1) || term(8) || index(8) || data_size(4) || data
//! Trailer (28):
//!   crc32(4) || config_offset(8) || entry_start_offset(8) || MAGIC(8)
//! ```
//!
//! All integers are big-endian. `hash` is the SHA-1 of the bytes from `kind`
//! through the end of `data`; the trailer CRC covers the 24 bytes after it.
//! The trailer's back-pointer and magic sentinel are what the recovery
//! scanner keys on when it walks the file tail after a crash.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{LogError, LogResult};

/// Sentinel terminating every trailer.
pub const MAGIC: [u8; 8] = [0xFE, 0xED, 0xFE, 0xED, 0xFE, 0xED, 0xFE, 0xED];

/// The file header is a single version byte at offset 0.
pub const FILE_HEADER_SIZE: u64 = 1;
/// hash(20) + kind(1) + term(8) + index(8) + data_size(4).
pub const HEADER_SIZE: u64 = 41;
/// crc32(4) + config_offset(8) + entry_start_offset(8) + magic(8).
pub const TRAILER_SIZE: u64 = 28;

pub const LOG_VERSION: u8 = 1;

const HASH_SIZE: usize = 20;

/// Offset of the frame following the one that starts at `loc`.
pub fn next_entry_offset(loc: u64, data_size: u32) -> u64 {
    loc + HEADER_SIZE + data_size as u64 + TRAILER_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum EntryKind {
    Noop,
    Config,
    Op,
}

impl EntryKind {
    fn to_byte(self) -> u8 {
        match self {
            EntryKind::Noop => 0,
            EntryKind::Config => 1,
            EntryKind::Op => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(EntryKind::Noop),
            1 => Some(EntryKind::Config),
            2 => Some(EntryKind::Op),
            _ => None,
        }
    }
}

/// A log record as stored on disk and returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Entry {
    pub term: u64,
    pub index: u64,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

/// An entry the log has not yet assigned an index to (leader-append input).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct NewEntry {
    pub term: u64,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

impl NewEntry {
    pub fn noop(term: u64) -> Self {
        Self {
            term,
            kind: EntryKind::Noop,
            data: Vec::new(),
        }
    }

    pub fn op(term: u64, data: Vec<u8>) -> Self {
        Self {
            term,
            kind: EntryKind::Op,
            data,
        }
    }

    pub fn config(term: u64, data: Vec<u8>) -> Self {
        Self {
            term,
            kind: EntryKind::Config,
            data,
        }
    }

    pub(crate) fn with_index(self, index: u64) -> Entry {
        Entry {
            term: self.term,
            index,
            kind: self.kind,
            data: self.data,
        }
    }
}

impl Entry {
    /// Serialize the Header+Data region, hash included.
    pub fn encode(&self) -> LogResult<Vec<u8>> {
        let data_size = u32::try_from(self.data.len())
            .map_err(|_| LogError::PayloadTooLarge {
                size: self.data.len(),
            })?;

        let mut buf = Vec::with_capacity(HEADER_SIZE as usize + self.data.len());
        buf.extend_from_slice(&[0u8; HASH_SIZE]);
        buf.push(self.kind.to_byte());
        buf.extend_from_slice(&self.term.to_be_bytes());
        buf.extend_from_slice(&self.index.to_be_bytes());
        buf.extend_from_slice(&data_size.to_be_bytes());
        buf.extend_from_slice(&self.data);

        let hash = Sha1::digest(&buf[HASH_SIZE..]);
        buf[..HASH_SIZE].copy_from_slice(&hash);
        Ok(buf)
    }

    /// Decode a complete Header+Data region and verify its hash.
    ///
    /// `loc` is the frame's file offset, used only for error reporting.
    pub fn decode(buf: &[u8], loc: u64) -> LogResult<Self> {
        let header = EntryHeader::decode(buf, loc)?;
        let expected = HEADER_SIZE as usize + header.data_size as usize;
        if buf.len() != expected {
            return Err(LogError::UnexpectedEof { offset: loc });
        }

        let hash = Sha1::digest(&buf[HASH_SIZE..]);
        if hash.as_slice() != &buf[..HASH_SIZE] {
            return Err(LogError::HashMismatch { offset: loc });
        }

        Ok(Self {
            term: header.term,
            index: header.index,
            kind: header.kind,
            data: buf[HEADER_SIZE as usize..].to_vec(),
        })
    }
}

/// The fixed-size prefix of a frame, parsed without touching the data region.
///
/// The hash cannot be verified from the header alone; forward scans use this
/// to hop frame to frame and only pay for a full read on the target entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub kind: EntryKind,
    pub term: u64,
    pub index: u64,
    pub data_size: u32,
}

impl EntryHeader {
    pub fn decode(buf: &[u8], loc: u64) -> LogResult<Self> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(LogError::UnexpectedEof { offset: loc });
        }

        let kind = EntryKind::from_byte(buf[HASH_SIZE]).ok_or(LogError::BadHeader {
            offset: loc,
            reason: "unknown entry kind",
        })?;

        let mut u64_bytes = [0u8; 8];
        u64_bytes.copy_from_slice(&buf[21..29]);
        let term = u64::from_be_bytes(u64_bytes);
        u64_bytes.copy_from_slice(&buf[29..37]);
        let index = u64::from_be_bytes(u64_bytes);

        let mut u32_bytes = [0u8; 4];
        u32_bytes.copy_from_slice(&buf[37..41]);
        let data_size = u32::from_be_bytes(u32_bytes);

        Ok(Self {
            kind,
            term,
            index,
            data_size,
        })
    }

    pub fn frame_size(&self) -> u64 {
        HEADER_SIZE + self.data_size as u64 + TRAILER_SIZE
    }
}

/// The 28-byte record closing every frame.
///
/// `config_offset` is the offset of the newest `config` entry at the time
/// this frame was written (0 if none); `entry_start` points back at the start
/// of the frame the trailer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub config_offset: u64,
    pub entry_start: u64,
}

impl Trailer {
    pub fn encode(&self) -> [u8; TRAILER_SIZE as usize] {
        let mut buf = [0u8; TRAILER_SIZE as usize];
        buf[4..12].copy_from_slice(&self.config_offset.to_be_bytes());
        buf[12..20].copy_from_slice(&self.entry_start.to_be_bytes());
        buf[20..28].copy_from_slice(&MAGIC);

        let crc = crc32fast::hash(&buf[4..]);
        buf[..4].copy_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Decode and verify a trailer. `loc` is the trailer's file offset, used
    /// only for error reporting.
    pub fn decode(buf: &[u8], loc: u64) -> LogResult<Self> {
        if buf.len() < TRAILER_SIZE as usize {
            return Err(LogError::UnexpectedEof { offset: loc });
        }

        let mut crc_bytes = [0u8; 4];
        crc_bytes.copy_from_slice(&buf[..4]);
        let crc = u32::from_be_bytes(crc_bytes);
        if crc32fast::hash(&buf[4..28]) != crc {
            return Err(LogError::TrailerCorrupt { offset: loc });
        }
        if buf[20..28] != MAGIC {
            return Err(LogError::TrailerCorrupt { offset: loc });
        }

        let mut u64_bytes = [0u8; 8];
        u64_bytes.copy_from_slice(&buf[4..12]);
        let config_offset = u64::from_be_bytes(u64_bytes);
        u64_bytes.copy_from_slice(&buf[12..20]);
        let entry_start = u64::from_be_bytes(u64_bytes);

        Ok(Self {
            config_offset,
            entry_start,
        })
    }
}
