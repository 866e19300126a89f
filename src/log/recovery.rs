//! Crash recovery: locate the last intact entry from the file tail.
//!
//! After an unclean shutdown the log file may end in a partially written
//! frame or arbitrary garbage. Every complete frame ends in a trailer whose
//! last 8 bytes are the magic sentinel, so the scanner walks the tail
//! backwards in blocks looking for the rightmost magic whose surrounding
//! trailer passes its CRC. Everything after that trailer is logically absent
//! and gets truncated by the caller; everything at or below it is trusted
//! (and re-verified entry by entry as it is read).

use tracing::debug;

use crate::{
    error::LogResult,
    log::{
        entry::{Trailer, FILE_HEADER_SIZE, MAGIC, TRAILER_SIZE},
        file::LogFile,
    },
};

/// Default size of the blocks read while scanning backwards.
pub const SCAN_BLOCK_SIZE: u64 = 1024 * 1024;

/// Scans never use blocks smaller than this; tiny blocks would crawl.
const MIN_SCAN_BLOCK: u64 = 4096;

/// Result of a successful tail scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailScan {
    /// Offset of the newest config entry as recorded by the last trailer.
    pub config_offset: u64,
    /// Start offset of the last intact entry.
    pub entry_start: u64,
    /// End of the last intact trailer; the file is truncated here.
    pub truncate_at: u64,
}

/// Find the last intact trailer at or below `file_size`.
///
/// Returns `None` when no trailer survives anywhere in the file, in which
/// case the log is treated as empty. A magic sentinel whose trailer fails its
/// CRC is crash debris; the scan keeps looking below it.
pub fn find_last_trailer(
    file: &LogFile,
    file_size: u64,
    block_size: u64,
) -> LogResult<Option<TailScan>> {
    let block_size = block_size.max(MIN_SCAN_BLOCK);
    let magic_len = MAGIC.len() as u64;

    let mut upper = file_size;
    while upper > FILE_HEADER_SIZE {
        let start = upper.saturating_sub(block_size);
        let mut buf = vec![0u8; (upper - start) as usize];
        file.read_exact_at(&mut buf, start)?;

        match rightmost_magic(&buf) {
            Some(rel) => {
                let magic_at = start + rel as u64;
                let trailer_end = magic_at + magic_len;
                if trailer_end < FILE_HEADER_SIZE + TRAILER_SIZE {
                    // Too close to the file header to be a whole trailer.
                    upper = magic_at;
                    continue;
                }

                let trailer_start = trailer_end - TRAILER_SIZE;
                let mut trailer_buf = [0u8; TRAILER_SIZE as usize];
                file.read_exact_at(&mut trailer_buf, trailer_start)?;

                match Trailer::decode(&trailer_buf, trailer_start) {
                    Ok(trailer) => {
                        return Ok(Some(TailScan {
                            config_offset: trailer.config_offset,
                            entry_start: trailer.entry_start,
                            truncate_at: trailer_end,
                        }));
                    }
                    Err(_) => {
                        debug!(
                            offset = magic_at,
                            "magic candidate failed trailer CRC, scanning below"
                        );
                        upper = magic_at;
                    }
                }
            }
            None => {
                if start == 0 {
                    break;
                }
                // Keep a magic-sized overlap so a sentinel straddling the
                // block boundary is still seen.
                upper = start + magic_len;
            }
        }
    }

    Ok(None)
}

fn rightmost_magic(buf: &[u8]) -> Option<usize> {
    if buf.len() < MAGIC.len() {
        return None;
    }
    buf.windows(MAGIC.len()).rposition(|window| window == &MAGIC[..])
}
