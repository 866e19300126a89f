use thiserror::Error;

pub type LogResult<T> = Result<T, LogError>;

/// Errors surfaced by the log subsystem.
///
/// Integrity errors (`HashMismatch`, `TrailerCorrupt`, `BadHeader`,
/// `UnexpectedEof`, `BadVersion`) are fatal: they mean the retained prefix of
/// the log is damaged and the log refuses to guess at a repair. Crash garbage
/// *after* the last intact trailer is not an error; the recovery scanner
/// discards it silently on open.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("entry hash mismatch at offset {offset}")]
    HashMismatch { offset: u64 },

    #[error("trailer CRC mismatch at offset {offset}")]
    TrailerCorrupt { offset: u64 },

    #[error("malformed entry header at offset {offset}: {reason}")]
    BadHeader { offset: u64, reason: &'static str },

    #[error("unexpected end of log inside entry at offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("unsupported log format version {found}")]
    BadVersion { found: u8 },

    #[error("first entry index {found} does not match start index {expected}")]
    IndexMismatch { expected: u64, found: u64 },

    #[error("entry payload of {size} bytes exceeds the frame limit")]
    PayloadTooLarge { size: usize },

    #[error("config payload decode failed: {0}")]
    ConfigPayload(#[from] bincode::error::DecodeError),

    #[error("metadata encode failed: {0}")]
    MetadataEncode(#[from] bincode::error::EncodeError),

    #[error("log actor channel closed")]
    ChannelClosed,
}
