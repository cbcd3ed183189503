//! # Request Tracker
//!
//! This module contains the [`RequestTracker`], which correlates outbound
//! requests with the asynchronous responses that answer them. Responses are
//! matched purely by request id, not by arrival order, so out-of-order
//! delivery across different pending requests is tolerated.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rand::Rng;

use crate::PeerId;

/// The kind of request awaiting a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Skeleton,
    BlockHash,
}

/// What issued a pending request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RequestContext {
    /// A one-off request, the resolved response is surfaced to the caller.
    Standalone,
    /// A probe of the peer's connection-point search.
    ConnectionPointSearch,
}

/// An outbound request awaiting a response.
#[derive(Debug, Clone)]
pub struct PendingRequest<A> {
    /// The correlation id, never `0` and unique among pending requests.
    pub id: u64,
    pub kind: RequestKind,
    /// The peer the request was sent to.
    pub peer: A,
    pub context: RequestContext,
    /// How many times this request has been re-sent after a timeout.
    pub retries: u32,
    /// When the request was dispatched.
    sent_at: Instant,
}

/// Tracks in-flight requests so responses can be matched back to the state
/// that issued them, and stale or duplicate responses can be detected.
#[derive(Debug)]
pub struct RequestTracker<A> {
    pending: HashMap<u64, PendingRequest<A>>,
    /// The last issued id. Starts at a random point so ids are not guessable
    /// across restarts.
    last_id: u64,
}

impl<A: PeerId> RequestTracker<A> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            last_id: rand::thread_rng().gen(),
        }
    }

    /// Returns a fresh id, guaranteed non-zero and not currently pending.
    ///
    /// `0` is reserved so a zeroed id field can never match a request.
    pub fn next_id(&mut self) -> u64 {
        loop {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != 0 && !self.pending.contains_key(&self.last_id) {
                return self.last_id;
            }
        }
    }

    /// Records a pending request.
    ///
    /// # Panics
    /// This function panics if `id` is already pending, ids must come from
    /// [`RequestTracker::next_id`].
    pub fn register(
        &mut self,
        id: u64,
        kind: RequestKind,
        peer: A,
        context: RequestContext,
        retries: u32,
    ) {
        let replaced = self.pending.insert(
            id,
            PendingRequest {
                id,
                kind,
                peer,
                context,
                retries,
                sent_at: Instant::now(),
            },
        );

        assert!(replaced.is_none(), "request id {id} was already pending");
    }

    /// Removes and returns the pending entry for `id`.
    ///
    /// [`None`] means the response is stale, duplicate or forged and must be
    /// discarded without side effects.
    pub fn resolve(&mut self, id: u64) -> Option<PendingRequest<A>> {
        self.pending.remove(&id)
    }

    /// Removes and returns the pending entry for `id`, but only if the
    /// request was sent to `peer`.
    ///
    /// A matching id arriving from the wrong peer leaves the entry pending,
    /// so the queried peer's genuine response can still resolve it.
    pub fn resolve_from(&mut self, id: u64, peer: &A) -> Option<PendingRequest<A>> {
        if self.pending.get(&id)?.peer != *peer {
            return None;
        }

        self.pending.remove(&id)
    }

    /// Removes every pending request sent to `peer`, releasing their ids.
    pub fn cancel_peer(&mut self, peer: &A) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pending| pending.peer != *peer);
        before - self.pending.len()
    }

    /// Removes and returns every request that was dispatched more than
    /// `timeout` before `now`.
    pub fn expired_at(&mut self, now: Instant, timeout: Duration) -> Vec<PendingRequest<A>> {
        let expired_ids = self
            .pending
            .values()
            .filter(|pending| now.saturating_duration_since(pending.sent_at) > timeout)
            .map(|pending| pending.id)
            .collect::<Vec<_>>();

        expired_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id))
            .collect()
    }

    /// The number of requests currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<A: PeerId> Default for RequestTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}
