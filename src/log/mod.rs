//! Durable log storage for a single Raft peer.
//!
//! Two files per peer: an append-only log of framed entries and a small
//! metadata file replaced atomically on every update. A single actor task
//! owns both and serializes all operations.
//!
//! # Module Structure
//!
//! - `entry`: on-disk frame codec (header, data, trailer)
//! - `file`: positional file I/O and path derivation
//! - `recovery`: backwards tail scan locating the last intact entry
//! - `hints`: bounded index→offset cache for the read path
//! - `meta`: atomic `{current_term, voted_for}` store
//! - `store`: write, seek, and reconcile paths over the log file
//! - `actor`: the serializing facade callers talk to

mod actor;
mod entry;
mod file;
mod hints;
mod meta;
mod recovery;
mod store;


pub use actor::LogStore;
pub use entry::{
    next_entry_offset, Entry, EntryHeader, EntryKind, NewEntry, Trailer, FILE_HEADER_SIZE,
    HEADER_SIZE, LOG_VERSION, MAGIC, TRAILER_SIZE,
};
pub use file::{log_path, meta_path};
pub use hints::MAX_HINTS;
pub use meta::Metadata;
pub use recovery::SCAN_BLOCK_SIZE;
pub use store::{LogStats, LogStoreOptions};
