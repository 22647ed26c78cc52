//! Peer identity: opaque string identifiers assigned by the transport.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a remote (or the local) peer. Assigned by the transport
/// collaborator; treated as opaque everywhere in the core.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display: the last 8 characters, prefixed with
    /// an ellipsis. Identifiers shorter than that are shown as-is.
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return self.0.clone();
        }
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("...{}", tail)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}
