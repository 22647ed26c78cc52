//! Local peer session: our own identifier and startup state.

use crate::identity::PeerId;

/// Wraps this process's identity against the transport collaborator.
/// The identifier is assigned by the transport once the session starts and
/// is immutable afterwards; `started` flips to true exactly once.
#[derive(Debug, Default)]
pub struct PeerSession {
    identifier: Option<PeerId>,
    started: bool,
}

impl PeerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful session bootstrap. A second call is ignored:
    /// the first assigned identifier wins.
    pub fn mark_started(&mut self, id: PeerId) {
        if self.started {
            return;
        }
        self.identifier = Some(id);
        self.started = true;
    }

    pub fn identifier(&self) -> Option<&PeerId> {
        self.identifier.as_ref()
    }

    pub fn started(&self) -> bool {
        self.started
    }
}
