//! # Connection Point Search
//!
//! This module contains the [`ConnectionPointSearch`], a per-peer binary
//! search over the height range `[0, peer_height]` for the highest block both
//! chains are known to agree on.
//!
//! The search is a pure cursor, it decides which height to probe next and the
//! orchestrator dispatches the actual block-hash requests, one probe in flight
//! at a time.

/// What the search wants done after a state change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SearchStep {
    /// Request the hash of the block at this height from the peer.
    Probe(u64),
    /// The search finished, this height is the connection point.
    Converged(u64),
}

/// A binary-search cursor narrowing in on the connection point of one peer.
///
/// Invariant: `low <= high`. `low` is a height both chains are known to agree
/// at, `high` is the highest height that could still agree.
#[derive(Debug, Clone)]
pub struct ConnectionPointSearch {
    /// Inclusive lower bound of agreement.
    low: u64,
    /// Inclusive upper bound of possible agreement.
    high: u64,
    /// The id of the in-flight probe, [`None`] between probes.
    pending_request_id: Option<u64>,
}

impl ConnectionPointSearch {
    /// Starts a search against a peer announcing `peer_height`.
    ///
    /// A peer at height `0` shares our genesis block, so the search converges
    /// immediately without probing.
    pub fn start(peer_height: u64) -> (Self, SearchStep) {
        let search = Self {
            low: 0,
            high: peer_height,
            pending_request_id: None,
        };

        let step = if peer_height == 0 {
            SearchStep::Converged(0)
        } else {
            SearchStep::Probe(search.midpoint())
        };

        (search, step)
    }

    /// The height of the current probe, rounding toward `low`.
    const fn midpoint(&self) -> u64 {
        self.low + (self.high - self.low) / 2
    }

    /// The height the in-flight (or next) probe asks about.
    pub const fn probe_height(&self) -> u64 {
        self.midpoint()
    }

    /// Records the id of the dispatched probe.
    pub fn probe_dispatched(&mut self, id: u64) {
        self.pending_request_id = Some(id);
    }

    /// The id of the in-flight probe, if one is outstanding.
    pub const fn pending_request_id(&self) -> Option<u64> {
        self.pending_request_id
    }

    /// Narrows the range with the result of the in-flight probe.
    ///
    /// `known` is whether our chain recognizes the hash the peer returned for
    /// the probed height. Every step either strictly shrinks `high - low` or
    /// converges, so the search always terminates.
    pub fn record_probe_result(&mut self, known: bool) -> SearchStep {
        let probed = self.midpoint();
        self.pending_request_id = None;

        if known {
            if probed == self.low && self.high > self.low {
                // `low` was already known to agree, re-probing it gains
                // nothing and the range cannot shrink. Settle for `low`.
                self.high = self.low;
                return SearchStep::Converged(self.low);
            }
            self.low = probed;
        } else {
            if probed == self.low {
                // An empty or inconsistent range, the peer disagrees at a
                // height we thought agreed. Settle for `low`.
                self.high = self.low;
                return SearchStep::Converged(self.low);
            }
            self.high = probed - 1;
        }

        if self.low == self.high {
            SearchStep::Converged(self.low)
        } else {
            SearchStep::Probe(self.midpoint())
        }
    }
}
