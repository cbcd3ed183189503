//! # Peer List
//!
//! This module contains the [`PeerList`], which keeps track of the claimed
//! chain states of connected peers. This allows checking if we are behind and
//! which peers claim they are ahead.

use std::collections::HashMap;

use galena_wire::Status;

use crate::PeerId;

/// The recorded state of a single peer.
#[derive(Debug, Clone)]
struct PeerEntry {
    /// The peer's last announced status.
    status: Status,
    /// Set when the peer stopped answering our requests. Cleared again the
    /// next time the peer announces a status.
    unresponsive: bool,
}

/// A table of our peers' self-reported chain tips.
///
/// One record per peer, a new status announcement overwrites the previous one.
#[derive(Debug, Default)]
pub struct PeerList<A: PeerId> {
    peers: HashMap<A, PeerEntry>,
}

impl<A: PeerId> PeerList<A> {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Inserts or overwrites the record for `peer`.
    ///
    /// A re-announce restores the standing of a peer previously marked
    /// unresponsive.
    pub fn record_status(&mut self, peer: A, status: Status) {
        tracing::trace!(
            "Recording status from peer {peer}, best block: {}, total difficulty: {}",
            status.best_block_number,
            status.total_difficulty
        );

        self.peers.insert(
            peer,
            PeerEntry {
                status,
                unresponsive: false,
            },
        );
    }

    /// Returns the last announced status of `peer`, if any.
    pub fn status(&self, peer: &A) -> Option<&Status> {
        self.peers.get(peer).map(|entry| &entry.status)
    }

    /// The number of peers with a recorded status.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The number of responsive peers claiming a chain strictly heavier than
    /// `local_total_difficulty`.
    ///
    /// A peer with the same total difficulty as us is not a sync target.
    pub fn advanced_peer_count(&self, local_total_difficulty: u128) -> usize {
        self.peers
            .values()
            .filter(|entry| !entry.unresponsive)
            .filter(|entry| entry.status.total_difficulty > local_total_difficulty)
            .count()
    }

    /// Excludes `peer` from [`PeerList::advanced_peer_count`] until it
    /// announces a new status.
    pub fn mark_unresponsive(&mut self, peer: &A) {
        if let Some(entry) = self.peers.get_mut(peer) {
            entry.unresponsive = true;
        }
    }

    /// Removes the record for `peer`.
    pub fn peer_disconnected(&mut self, peer: &A) {
        let _ = self.peers.remove(peer);
    }
}
