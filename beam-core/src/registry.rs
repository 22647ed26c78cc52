//! Connection registry: reachable peers and broadcast-target selection.
//!
//! All transitions are pure mutations driven by transport lifecycle events
//! and user intents. Invariants held after every transition:
//! - `selected` is a subset of `reachable`.
//! - `reachable` empty implies no primary and empty selection.
//! - A removed primary is replaced by the first surviving selected peer.

use crate::identity::PeerId;

/// The set of currently reachable remote peers plus selection state.
///
/// `reachable` keeps first-discovery order (governs display order);
/// `selected` keeps selection order. The canonical broadcast destination
/// list is `selected` — `primary` is a display convenience only.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    reachable: Vec<PeerId>,
    primary: Option<PeerId>,
    selected: Vec<PeerId>,
    pending_input: String,
    connecting: bool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peer became reachable. Duplicate discovery is a no-op.
    /// The first peer added to an empty registry is auto-selected, seeding
    /// a sane default for a single-peer session; later additions are not.
    pub fn on_peer_discovered(&mut self, id: PeerId) {
        if self.reachable.contains(&id) {
            return;
        }
        let was_empty = self.reachable.is_empty();
        self.reachable.push(id.clone());
        if was_empty {
            self.primary = Some(id.clone());
            self.selected = vec![id];
        }
    }

    /// A peer became unreachable. Removes it from both lists and re-derives
    /// the primary if it was the one removed. No-op if the peer was unknown.
    pub fn on_peer_lost(&mut self, id: &PeerId) {
        if !self.reachable.contains(id) {
            return;
        }
        self.reachable.retain(|p| p != id);
        self.selected.retain(|p| p != id);
        if let Some(primary) = &self.primary {
            if !self.reachable.contains(primary) {
                self.primary = self.selected.first().cloned();
            }
        }
    }

    /// Add a reachable peer to the selection and make it primary.
    /// Silently ignored if the peer is unreachable or already selected.
    pub fn select(&mut self, id: PeerId) {
        if !self.reachable.contains(&id) || self.selected.contains(&id) {
            return;
        }
        self.selected.push(id.clone());
        self.primary = Some(id);
    }

    /// Remove a peer from the selection. The primary is left untouched even
    /// if it goes stale; only `selected` feeds the destination snapshot.
    pub fn deselect(&mut self, id: &PeerId) {
        self.selected.retain(|p| p != id);
    }

    /// Store the identifier the user is typing for an outbound connect.
    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    /// Toggle the outstanding-connect flag (drives the UI spinner).
    pub fn set_connecting(&mut self, flag: bool) {
        self.connecting = flag;
    }

    pub fn reachable(&self) -> &[PeerId] {
        &self.reachable
    }

    pub fn selected(&self) -> &[PeerId] {
        &self.selected
    }

    pub fn primary(&self) -> Option<&PeerId> {
        self.primary.as_ref()
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn connecting(&self) -> bool {
        self.connecting
    }

    pub fn is_selected(&self, id: &PeerId) -> bool {
        self.selected.contains(id)
    }
}
