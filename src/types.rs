use std::fmt::{self, Display};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Identity of a Raft peer: a simple name, or a (name, node) pair when the
/// same peer name exists on several nodes.
///
/// The log and metadata files are derived from `name` only, so two peers on
/// the same node must not share a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct PeerId {
    pub name: String,
    pub node: Option<String>,
}

impl PeerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: None,
        }
    }

    pub fn with_node(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: Some(node.into()),
        }
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{}:{}", self.name, node),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
