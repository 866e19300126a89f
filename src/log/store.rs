//! The log store proper: in-memory state plus the write, seek, and
//! reconcile paths over the on-disk file.
//!
//! `LogStoreInner` is owned by exactly one actor task (see `actor`); nothing
//! here is shared or locked. All offsets are byte offsets into the log file;
//! `write_offset` is the authoritative end of the retained prefix and any
//! bytes beyond it are logically absent even if present on disk.

use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::ClusterConfig,
    error::{LogError, LogResult},
    log::{
        entry::{
            next_entry_offset, Entry, EntryHeader, EntryKind, NewEntry, Trailer,
            FILE_HEADER_SIZE, HEADER_SIZE, LOG_VERSION, TRAILER_SIZE,
        },
        file::{log_path, LogFile},
        hints::{HintCache, MAX_HINTS},
        meta::{Metadata, MetadataStore},
        recovery::{find_last_trailer, SCAN_BLOCK_SIZE},
    },
    types::PeerId,
};

/// Tunables for a single peer's log.
#[derive(Debug, Clone)]
pub struct LogStoreOptions {
    /// Directory holding the log and metadata files.
    pub dir: PathBuf,
    /// Fsync after every write batch. Turning this off voids the durability
    /// guarantee; it exists for tests and benchmarks.
    pub sync_on_write: bool,
    /// Capacity of the index→offset hint cache.
    pub max_hints: usize,
    /// Block size used by the backwards recovery scan.
    pub scan_block_size: u64,
}

impl Default for LogStoreOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            sync_on_write: true,
            max_hints: MAX_HINTS,
            scan_block_size: SCAN_BLOCK_SIZE,
        }
    }
}

impl LogStoreOptions {
    pub fn with_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }
}

/// Observability snapshot returned by `LogStore::stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub version: u8,
    pub last_index: u64,
    pub write_offset: u64,
    pub config_offset: u64,
    pub hint_count: usize,
    pub hint_prunes: u64,
    /// Histogram of forward-scan lengths: entries scanned → occurrences.
    pub seek_counts: BTreeMap<u64, u64>,
}

/// In-memory tail state, rebuilt from disk on open.
struct LogState {
    write_offset: u64,
    last_index: u64,
    last_entry: Option<Entry>,
    config_offset: u64,
    config: ClusterConfig,
    hints: HintCache,
    version: u8,
    seek_counts: BTreeMap<u64, u64>,
}

impl LogState {
    fn empty(max_hints: usize) -> Self {
        Self {
            write_offset: FILE_HEADER_SIZE,
            last_index: 0,
            last_entry: None,
            config_offset: 0,
            config: ClusterConfig::blank(),
            hints: HintCache::new(max_hints),
            version: LOG_VERSION,
            seek_counts: BTreeMap::new(),
        }
    }
}

pub(crate) struct LogStoreInner {
    peer: PeerId,
    options: LogStoreOptions,
    file: LogFile,
    meta_store: MetadataStore,
    metadata: Metadata,
    state: LogState,
}

impl LogStoreInner {
    /// Open (or create) the peer's log, running crash recovery if needed.
    pub fn open(peer: PeerId, options: LogStoreOptions) -> LogResult<Self> {
        fs::create_dir_all(&options.dir)?;

        let file = LogFile::open(log_path(&options.dir, &peer))?;
        let file_size = file.size()?;

        let state = if file_size <= FILE_HEADER_SIZE {
            Self::bootstrap(&file, options.max_hints)?
        } else {
            Self::recover(&file, file_size, &options)?
        };

        let meta_store = MetadataStore::new(&options.dir, &peer);
        let metadata = meta_store.load(state.last_index > 0)?;

        info!(
            peer = %peer,
            file = %file.path().display(),
            last_index = state.last_index,
            write_offset = state.write_offset,
            "log opened"
        );

        Ok(Self {
            peer,
            options,
            file,
            meta_store,
            metadata,
            state,
        })
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Initialize an empty log: just the one-byte file header.
    fn bootstrap(file: &LogFile, max_hints: usize) -> LogResult<LogState> {
        file.truncate(0)?;
        file.write_all_at(&[LOG_VERSION], 0)?;
        file.sync_data()?;
        Ok(LogState::empty(max_hints))
    }

    /// Rebuild state from a non-empty file, discarding any crash garbage
    /// after the last intact trailer.
    fn recover(file: &LogFile, file_size: u64, options: &LogStoreOptions) -> LogResult<LogState> {
        let scan = match find_last_trailer(file, file_size, options.scan_block_size)? {
            Some(scan) => scan,
            None => {
                info!("no intact trailer found, reinitializing empty log");
                return Self::bootstrap(file, options.max_hints);
            }
        };

        if scan.truncate_at < file_size {
            info!(
                discarded = file_size - scan.truncate_at,
                "discarding crash garbage after last intact trailer"
            );
            file.truncate(scan.truncate_at)?;
            file.sync_data()?;
        }

        let last_entry = read_entry_at(file, scan.entry_start, scan.truncate_at)?;

        let mut version_buf = [0u8; 1];
        file.read_exact_at(&mut version_buf, 0)?;
        if version_buf[0] != LOG_VERSION {
            return Err(LogError::BadVersion {
                found: version_buf[0],
            });
        }

        let (config_offset, config) = if scan.config_offset != 0 {
            let config_entry = read_entry_at(file, scan.config_offset, scan.truncate_at)?;
            if config_entry.kind != EntryKind::Config {
                return Err(LogError::BadHeader {
                    offset: scan.config_offset,
                    reason: "config pointer does not reference a config entry",
                });
            }
            (
                scan.config_offset,
                ClusterConfig::deserialize(&config_entry.data)?,
            )
        } else {
            (0, ClusterConfig::blank())
        };

        Ok(LogState {
            write_offset: scan.truncate_at,
            last_index: last_entry.index,
            last_entry: Some(last_entry),
            config_offset,
            config,
            hints: HintCache::new(options.max_hints),
            version: version_buf[0],
            seek_counts: BTreeMap::new(),
        })
    }

    /// Leader mode: assign indices `last_index+1…` and append.
    pub fn append(&mut self, entries: Vec<NewEntry>) -> LogResult<u64> {
        if entries.is_empty() {
            return Ok(self.state.last_index);
        }

        for new_entry in entries {
            let entry = new_entry.with_index(self.state.last_index + 1);
            self.write_entry(&entry)?;
        }
        self.sync()?;
        Ok(self.state.last_index)
    }

    /// Follower mode: verify overlap with the local log, truncate any
    /// divergent suffix, and append the new tail.
    pub fn check_and_append(&mut self, entries: Vec<Entry>, start_index: u64) -> LogResult<u64> {
        let Some(first) = entries.first() else {
            return Ok(self.state.last_index);
        };
        if first.index != start_index {
            return Err(LogError::IndexMismatch {
                expected: start_index,
                found: first.index,
            });
        }

        // Locate the frame carrying start_index; EOF means the incoming
        // batch begins past our tail and everything is a pure append.
        let mut loc = self
            .state
            .hints
            .closest_forward_offset(start_index, self.state.write_offset);
        while loc < self.state.write_offset {
            let header = self.read_header(loc)?;
            if header.index == start_index {
                break;
            }
            loc = next_entry_offset(loc, header.data_size);
        }

        // Walk the overlap. Matching (index, term) pairs are kept as-is; the
        // first divergence (or our EOF) marks where the leader's tail
        // replaces ours.
        let mut matched = 0;
        while matched < entries.len() && loc < self.state.write_offset {
            let header = self.read_header(loc)?;
            let incoming = &entries[matched];
            if header.index != incoming.index || header.term != incoming.term {
                break;
            }
            loc = next_entry_offset(loc, header.data_size);
            matched += 1;
        }

        if matched == entries.len() {
            // Everything already on disk; nothing to write.
            return Ok(self.state.last_index);
        }

        self.truncate_and_write(loc, &entries[matched..])
    }

    /// Truncate the log at `loc` and append `entries` there.
    fn truncate_and_write(&mut self, loc: u64, entries: &[Entry]) -> LogResult<u64> {
        if loc < self.state.write_offset {
            debug!(
                truncate_at = loc,
                dropped = self.state.write_offset - loc,
                "truncating divergent suffix"
            );
            self.file.truncate(loc)?;
            self.maybe_reset_config(loc)?;
            self.state.write_offset = loc;
            self.state.hints.evict_beyond(loc);
        }

        for entry in entries {
            self.write_entry(entry)?;
        }
        self.sync()?;
        Ok(self.state.last_index)
    }

    /// Repair the config pointer after a truncation at `loc`.
    ///
    /// When the authoritative config entry sat inside the truncated region,
    /// the previous frame's trailer tells us which config (if any) was live
    /// when that frame was written; every trailer carries the then-current
    /// config offset exactly so this recovery works after any cut.
    fn maybe_reset_config(&mut self, loc: u64) -> LogResult<()> {
        if self.state.config_offset < loc {
            return Ok(());
        }

        if loc <= FILE_HEADER_SIZE {
            self.state.config_offset = 0;
            self.state.config = ClusterConfig::blank();
            return Ok(());
        }

        let trailer_start = loc - TRAILER_SIZE;
        let mut buf = [0u8; TRAILER_SIZE as usize];
        self.file.read_exact_at(&mut buf, trailer_start)?;
        let trailer = Trailer::decode(&buf, trailer_start)?;

        if trailer.config_offset == 0 {
            self.state.config_offset = 0;
            self.state.config = ClusterConfig::blank();
            return Ok(());
        }

        let config_entry = read_entry_at(&self.file, trailer.config_offset, loc)?;
        if config_entry.kind != EntryKind::Config {
            return Err(LogError::BadHeader {
                offset: trailer.config_offset,
                reason: "config pointer does not reference a config entry",
            });
        }
        self.state.config = ClusterConfig::deserialize(&config_entry.data)?;
        self.state.config_offset = trailer.config_offset;
        Ok(())
    }

    /// Write one entry frame at the current write offset and advance the
    /// in-memory tail. Does not sync; callers sync once per batch.
    fn write_entry(&mut self, entry: &Entry) -> LogResult<()> {
        let at = self.state.write_offset;

        let (config_offset, config) = if entry.kind == EntryKind::Config {
            (at, ClusterConfig::deserialize(&entry.data)?)
        } else {
            (self.state.config_offset, self.state.config.clone())
        };

        let mut frame = entry.encode()?;
        frame.extend_from_slice(
            &Trailer {
                config_offset,
                entry_start: at,
            }
            .encode(),
        );
        self.file.write_all_at(&frame, at)?;

        self.state.write_offset = at + frame.len() as u64;
        self.state.last_index = entry.index;
        self.state.last_entry = Some(entry.clone());
        self.state.config_offset = config_offset;
        self.state.config = config;
        Ok(())
    }

    fn sync(&self) -> LogResult<()> {
        if self.options.sync_on_write {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Locate the entry at `index` via the hint cache plus a forward scan.
    pub fn get_entry(&mut self, index: u64) -> LogResult<Option<Entry>> {
        if index < 1 || index > self.state.last_index {
            return Ok(None);
        }

        let mut loc = self
            .state
            .hints
            .closest_forward_offset(index, self.state.write_offset);
        let mut scanned = 0u64;

        while loc < self.state.write_offset {
            let header = self.read_header(loc)?;
            if header.index == index {
                let entry = read_entry_at(&self.file, loc, self.state.write_offset)?;
                self.state.hints.insert(index, loc);
                *self.state.seek_counts.entry(scanned).or_insert(0) += 1;
                return Ok(Some(entry));
            }
            loc = next_entry_offset(loc, header.data_size);
            scanned += 1;
        }
        Ok(None)
    }

    /// Served from the cached tail without touching disk.
    pub fn get_last_entry(&self) -> Option<Entry> {
        self.state.last_entry.clone()
    }

    pub fn get_last_index(&self) -> u64 {
        self.state.last_index
    }

    /// Term of the entry at `index`, or 0 when absent. Callers disambiguate
    /// "absent" from "term 0" via `get_last_index`.
    pub fn get_term(&mut self, index: u64) -> LogResult<u64> {
        Ok(self.get_entry(index)?.map_or(0, |entry| entry.term))
    }

    pub fn get_config(&self) -> ClusterConfig {
        self.state.config.clone()
    }

    pub fn get_metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    pub fn set_metadata(&mut self, voted_for: Option<PeerId>, current_term: u64) -> LogResult<()> {
        let metadata = Metadata {
            current_term,
            voted_for,
        };
        self.meta_store.store(&metadata)?;
        self.metadata = metadata;
        Ok(())
    }

    pub fn stats(&self) -> LogStats {
        LogStats {
            version: self.state.version,
            last_index: self.state.last_index,
            write_offset: self.state.write_offset,
            config_offset: self.state.config_offset,
            hint_count: self.state.hints.len(),
            hint_prunes: self.state.hints.prunes(),
            seek_counts: self.state.seek_counts.clone(),
        }
    }

    /// Flush outstanding writes before the actor drops the file handles.
    pub fn close(&mut self) -> LogResult<()> {
        self.file.sync_data()?;
        debug!(peer = %self.peer, "log closed");
        Ok(())
    }

    /// Read and sanity-check the fixed-size header of the frame at `loc`.
    fn read_header(&self, loc: u64) -> LogResult<EntryHeader> {
        read_header_at(&self.file, loc, self.state.write_offset)
    }
}

fn read_header_at(file: &LogFile, loc: u64, limit: u64) -> LogResult<EntryHeader> {
    if loc + HEADER_SIZE > limit {
        return Err(LogError::UnexpectedEof { offset: loc });
    }
    let mut buf = [0u8; HEADER_SIZE as usize];
    file.read_exact_at(&mut buf, loc)?;
    let header = EntryHeader::decode(&buf, loc)?;
    if next_entry_offset(loc, header.data_size) > limit {
        return Err(LogError::UnexpectedEof { offset: loc });
    }
    Ok(header)
}

/// Read and verify the full entry whose frame starts at `loc`.
fn read_entry_at(file: &LogFile, loc: u64, limit: u64) -> LogResult<Entry> {
    let header = read_header_at(file, loc, limit)?;
    let mut buf = vec![0u8; HEADER_SIZE as usize + header.data_size as usize];
    file.read_exact_at(&mut buf, loc)?;
    Entry::decode(&buf, loc)
}
