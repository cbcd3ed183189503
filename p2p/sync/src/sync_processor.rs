//! # Sync Processor
//!
//! This module contains the [`SyncProcessor`], the engine that decides what
//! to fetch and from whom. It owns the [`PeerList`] and the
//! [`RequestTracker`], routes inbound responses back to the state that asked
//! for them and drives the per-peer [`ConnectionPointSearch`]es.
//!
//! Each inbound event is handled to completion before the next one, the
//! processor never waits on the network itself, sending is fire-and-forget
//! through the [`MessageSink`].

use std::{collections::HashMap, time::Instant};

use tower::ServiceExt;

use galena_wire::{
    BlockHash, BlockHashRequest, BlockHashResponse, BlockIdentifier, SkeletonRequest,
    SkeletonResponse, Status,
};

use crate::{
    connection_point::{ConnectionPointSearch, SearchStep},
    constants::{MAX_PROBE_RETRIES, REQUEST_TIMEOUT},
    peer_list::PeerList,
    request_tracker::{RequestContext, RequestKind, RequestTracker},
    ChainSvc, ChainSvcRequest, ChainSvcResponse, MessageSink, PeerId, SendRequest,
};

/// An error that occurred in the [`SyncProcessor`].
///
/// Protocol anomalies (stale ids, unresponsive peers) are not errors, they are
/// scoped to one peer or one request and handled in place. Only collaborator
/// failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Service error: {0}")]
    ServiceError(#[from] tower::BoxError),
}

/// The result of processing a [`BlockHashResponse`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BlockHashOutcome {
    /// The response matched no pending request and was dropped.
    Stale,
    /// A standalone request resolved to this hash.
    Resolved { hash: BlockHash },
    /// The response narrowed a search, the next probe was dispatched.
    SearchContinues { next_height: u64 },
    /// The search converged, this is the highest mutually known height.
    ConnectionPointFound { height: u64 },
}

/// The block-synchronization engine.
///
/// Drives the exchange of block-identifying messages needed to catch up with
/// peers whose chains are heavier than ours. The chain service answers what
/// our own chain knows, the message sink delivers outbound requests.
pub struct SyncProcessor<A: PeerId, C, T> {
    /// Our peers' last announced chain tips.
    peers: PeerList<A>,
    /// The in-flight requests.
    requests: RequestTracker<A>,
    /// The active connection-point searches, at most one per peer.
    searches: HashMap<A, ConnectionPointSearch>,
    /// The service that answers questions about our own chain.
    chain_svc: C,
    /// The outbound message path.
    message_sink: T,
}

impl<A, C, T> SyncProcessor<A, C, T>
where
    A: PeerId,
    C: ChainSvc,
    T: MessageSink<A>,
{
    pub fn new(chain_svc: C, message_sink: T) -> Self {
        Self {
            peers: PeerList::new(),
            requests: RequestTracker::new(),
            searches: HashMap::new(),
            chain_svc,
            message_sink,
        }
    }

    /// Records a peer's status announcement.
    ///
    /// This only updates the peer list, it never sends anything. Starting a
    /// sync against an advanced peer is a separate, explicit call to
    /// [`SyncProcessor::find_connection_point`].
    pub fn process_status(&mut self, peer: A, status: Status) {
        self.peers.record_status(peer, status);
    }

    /// The number of peers with a recorded status.
    pub fn peer_count(&self) -> usize {
        self.peers.peer_count()
    }

    /// The number of peers claiming a chain strictly heavier than ours.
    pub async fn advanced_peer_count(&mut self) -> Result<usize, SyncError> {
        let ChainSvcResponse::CumulativeDifficulty(local_total_difficulty) = self
            .chain_svc
            .ready()
            .await?
            .call(ChainSvcRequest::CumulativeDifficulty)
            .await?
        else {
            panic!("Chain service returned wrong response.");
        };

        Ok(self.peers.advanced_peer_count(local_total_difficulty))
    }

    /// The height of our own best block.
    pub async fn best_block_number(&mut self) -> Result<u64, SyncError> {
        let ChainSvcResponse::BestBlockNumber(number) = self
            .chain_svc
            .ready()
            .await?
            .call(ChainSvcRequest::BestBlockNumber)
            .await?
        else {
            panic!("Chain service returned wrong response.");
        };

        Ok(number)
    }

    /// Requests a skeleton from `peer` starting at `start_number`.
    pub async fn send_skeleton_request(
        &mut self,
        peer: A,
        start_number: u64,
    ) -> Result<(), SyncError> {
        let id = self.requests.next_id();
        self.requests
            .register(id, RequestKind::Skeleton, peer, RequestContext::Standalone, 0);

        tracing::debug!("Requesting skeleton from peer {peer}, start: {start_number}");

        self.send_message(peer, SkeletonRequest { id, start_number }.into())
            .await
    }

    /// Requests the hash of the block at `height` from `peer`.
    pub async fn send_block_hash_request(&mut self, peer: A, height: u64) -> Result<(), SyncError> {
        let id = self.requests.next_id();
        self.requests.register(
            id,
            RequestKind::BlockHash,
            peer,
            RequestContext::Standalone,
            0,
        );

        tracing::debug!("Requesting block hash at height {height} from peer {peer}");

        self.send_message(peer, BlockHashRequest { id, height }.into())
            .await
    }

    /// Starts a connection-point search against `peer`, which announced
    /// `peer_height`.
    ///
    /// Returns the connection point right away if the search converges without
    /// probing, otherwise the first probe is dispatched and the search
    /// continues through [`SyncProcessor::process_block_hash_response`].
    ///
    /// A search already active for this peer is discarded, its in-flight probe
    /// id is released.
    pub async fn find_connection_point(
        &mut self,
        peer: A,
        peer_height: u64,
    ) -> Result<Option<u64>, SyncError> {
        if let Some(old) = self.searches.remove(&peer) {
            tracing::debug!("Restarting connection point search for peer {peer}");
            if let Some(id) = old.pending_request_id() {
                let _ = self.requests.resolve(id);
            }
        }

        let (mut search, step) = ConnectionPointSearch::start(peer_height);

        match step {
            SearchStep::Converged(height) => {
                tracing::debug!("Peer {peer} is at height {height}, no search needed");
                Ok(Some(height))
            }
            SearchStep::Probe(height) => {
                self.dispatch_probe(peer, &mut search, height, 0).await?;
                self.searches.insert(peer, search);
                Ok(None)
            }
        }
    }

    /// Resolves a [`BlockHashResponse`] from `peer`.
    ///
    /// A response with an id that is not pending, or pending for a different
    /// peer, is stale, duplicate or forged and is dropped with no side
    /// effects. A forged id in particular never consumes another peer's
    /// pending request.
    pub async fn process_block_hash_response(
        &mut self,
        peer: A,
        response: BlockHashResponse,
    ) -> Result<BlockHashOutcome, SyncError> {
        let Some(pending) = self.requests.resolve_from(response.id, &peer) else {
            tracing::debug!(
                "Dropping block hash response from peer {peer} with no matching request, id: {}",
                response.id
            );
            return Ok(BlockHashOutcome::Stale);
        };

        if pending.kind != RequestKind::BlockHash {
            tracing::warn!(
                "Peer {peer} answered a {:?} request with a block hash response, dropping",
                pending.kind
            );
            return Ok(BlockHashOutcome::Stale);
        }

        tracing::trace!(
            "Block hash response from peer {peer}, id: {}, hash: {}",
            response.id,
            hex::encode(response.hash)
        );

        if pending.context == RequestContext::Standalone {
            return Ok(BlockHashOutcome::Resolved {
                hash: response.hash,
            });
        }

        let Some(mut search) = self.searches.remove(&peer) else {
            // The search was discarded while the probe was in flight.
            return Ok(BlockHashOutcome::Stale);
        };

        if search.pending_request_id() != Some(response.id) {
            // The probe belonged to a search since restarted, keep the new one.
            self.searches.insert(peer, search);
            return Ok(BlockHashOutcome::Stale);
        }

        let probed_height = search.probe_height();
        let known = self.block_known_at_height(probed_height, response.hash).await?;

        match search.record_probe_result(known) {
            SearchStep::Probe(height) => {
                self.dispatch_probe(peer, &mut search, height, 0).await?;
                self.searches.insert(peer, search);
                Ok(BlockHashOutcome::SearchContinues {
                    next_height: height,
                })
            }
            SearchStep::Converged(height) => {
                tracing::debug!("Found connection point {height} for peer {peer}");
                Ok(BlockHashOutcome::ConnectionPointFound { height })
            }
        }
    }

    /// Resolves a [`SkeletonResponse`] from `peer`, returning the block
    /// identifiers for the caller to act on.
    ///
    /// [`None`] means the response matched no pending skeleton request sent
    /// to this peer and was dropped.
    pub fn process_skeleton_response(
        &mut self,
        peer: A,
        response: SkeletonResponse,
    ) -> Option<Vec<BlockIdentifier>> {
        let Some(pending) = self.requests.resolve_from(response.id, &peer) else {
            tracing::debug!(
                "Dropping skeleton response from peer {peer} with no matching request, id: {}",
                response.id
            );
            return None;
        };

        if pending.kind != RequestKind::Skeleton {
            tracing::warn!(
                "Peer {peer} answered a {:?} request with a skeleton response, dropping",
                pending.kind
            );
            return None;
        }

        tracing::trace!(
            "Skeleton response from peer {peer}, id: {}, identifiers: {}",
            response.id,
            response.block_identifiers.len()
        );

        Some(response.block_identifiers)
    }

    /// Abandons every request that has outlived [`REQUEST_TIMEOUT`].
    ///
    /// A timed-out search probe is re-sent up to [`MAX_PROBE_RETRIES`] times,
    /// after that the search is dropped and the peer is no longer considered
    /// for syncing until it announces a new status.
    pub async fn expire_requests(&mut self) -> Result<(), SyncError> {
        self.expire_requests_at(Instant::now()).await
    }

    async fn expire_requests_at(&mut self, now: Instant) -> Result<(), SyncError> {
        for pending in self.requests.expired_at(now, REQUEST_TIMEOUT) {
            let peer = pending.peer;

            if pending.context == RequestContext::Standalone {
                tracing::debug!("Request {} to peer {peer} timed out", pending.id);
                continue;
            }

            let Some(mut search) = self.searches.remove(&peer) else {
                continue;
            };
            if search.pending_request_id() != Some(pending.id) {
                self.searches.insert(peer, search);
                continue;
            }

            if pending.retries < MAX_PROBE_RETRIES {
                tracing::debug!(
                    "Probe {} to peer {peer} timed out, re-sending",
                    pending.id
                );

                let height = search.probe_height();
                self.dispatch_probe(peer, &mut search, height, pending.retries + 1)
                    .await?;
                self.searches.insert(peer, search);
            } else {
                tracing::debug!(
                    "Peer {peer} is unresponsive, abandoning connection point search"
                );
                self.peers.mark_unresponsive(&peer);
            }
        }

        Ok(())
    }

    /// Drops everything tied to `peer`: its status record, its search and its
    /// pending request ids.
    pub fn peer_disconnected(&mut self, peer: &A) {
        self.peers.peer_disconnected(peer);
        let _ = self.searches.remove(peer);
        let cancelled = self.requests.cancel_peer(peer);

        tracing::trace!("Peer {peer} disconnected, cancelled {cancelled} pending requests");
    }

    /// Registers and sends a probe of `search` at `height`.
    async fn dispatch_probe(
        &mut self,
        peer: A,
        search: &mut ConnectionPointSearch,
        height: u64,
        retries: u32,
    ) -> Result<(), SyncError> {
        let id = self.requests.next_id();
        self.requests.register(
            id,
            RequestKind::BlockHash,
            peer,
            RequestContext::ConnectionPointSearch,
            retries,
        );
        search.probe_dispatched(id);

        tracing::debug!("Probing peer {peer} at height {height}");

        self.send_message(peer, BlockHashRequest { id, height }.into())
            .await
    }

    /// Hands `message` to the transport. Fire-and-forget, the transport gives
    /// no delivery guarantee back.
    async fn send_message(&mut self, peer: A, message: galena_wire::Message) -> Result<(), SyncError> {
        self.message_sink
            .ready()
            .await?
            .call(SendRequest { peer, message })
            .await?;

        Ok(())
    }

    /// Checks whether our chain recognizes `hash` at `height`.
    async fn block_known_at_height(
        &mut self,
        height: u64,
        hash: BlockHash,
    ) -> Result<bool, SyncError> {
        let ChainSvcResponse::BlockKnownAtHeight(known) = self
            .chain_svc
            .ready()
            .await?
            .call(ChainSvcRequest::BlockKnownAtHeight { height, hash })
            .await?
        else {
            panic!("Chain service returned wrong response.");
        };

        Ok(known)
    }
}
