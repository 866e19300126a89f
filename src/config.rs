use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::LogResult, types::PeerId};

/// Lifecycle of a cluster configuration.
///
/// `Blank` is the sentinel for "no configuration has ever been logged"; the
/// log hands it back whenever the retained prefix contains no `config` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ConfigState {
    Blank,
    Stable,
    Staging,
    Transitional,
}

/// Cluster membership as carried by `config` entries.
///
/// The log never invents one of these: it only writes configs handed to it by
/// callers and reads them back. Member lists are `Vec` rather than a set so
/// the encoded payload is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ClusterConfig {
    pub state: ConfigState,
    pub old_members: Vec<PeerId>,
    pub new_members: Vec<PeerId>,
}

impl ClusterConfig {
    /// The "no configuration yet" sentinel.
    pub fn blank() -> Self {
        Self {
            state: ConfigState::Blank,
            old_members: Vec::new(),
            new_members: Vec::new(),
        }
    }

    pub fn stable(members: Vec<PeerId>) -> Self {
        Self {
            state: ConfigState::Stable,
            old_members: members,
            new_members: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.state == ConfigState::Blank
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.old_members.contains(peer) || self.new_members.contains(peer)
    }

    pub fn quorum(&self) -> usize {
        self.old_members.len() / 2 + 1
    }

    pub fn serialize(&self) -> LogResult<Vec<u8>> {
        let config = bincode::config::standard();
        Ok(bincode::encode_to_vec(self, config)?)
    }

    pub fn deserialize(data: &[u8]) -> LogResult<Self> {
        let config = bincode::config::standard();
        let (decoded, _) = bincode::decode_from_slice(data, config).map_err(|e| {
            warn!("Failed to decode config payload: {}", e);
            e
        })?;
        Ok(decoded)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::blank()
    }
}
