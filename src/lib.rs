//! rafter-log: the durable log of a single Raft peer.
//!
//! A strictly-ordered, append-only sequence of consensus entries plus the
//! peer-local `{current_term, voted_for}` record, stored crash-consistently
//! in two files. The crate provides the storage mechanism only; election
//! rules, commit tracking, and replication are the caller's business.
//!
//! # Example
//!
//! ```rust,ignore
//! use rafter_log::{LogStore, LogStoreOptions, NewEntry, PeerId};
//!
//! let store = LogStore::open(
//!     PeerId::new("peer1"),
//!     LogStoreOptions::with_dir("./data"),
//! )?;
//!
//! // Leader mode: the log assigns indices.
//! let last = store.append(vec![NewEntry::noop(1)]).await?;
//! assert_eq!(last, store.get_last_index().await?);
//! ```

pub mod config;
pub mod error;
pub mod log;
pub mod types;

pub use config::{ClusterConfig, ConfigState};
pub use error::{LogError, LogResult};
pub use log::{
    Entry, EntryKind, LogStats, LogStore, LogStoreOptions, Metadata, NewEntry,
};
pub use types::PeerId;
