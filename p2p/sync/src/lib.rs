//! # Block Sync
//!
//! This crate contains the block-synchronization engine: it tracks what
//! chains our peers announce, finds the highest block we share with a peer
//! that is ahead of us and correlates every request it sends with the
//! response that comes back.
//!
//! The engine does not talk to the network or the database itself, both sit
//! behind [`tower::Service`] seams, see [`ChainSvcRequest`] and
//! [`SendRequest`].

use std::{fmt::Display, hash::Hash};

mod connection_point;
mod constants;
mod peer_list;
mod request_tracker;
mod services;
mod sync_processor;

pub use connection_point::{ConnectionPointSearch, SearchStep};
pub use peer_list::PeerList;
pub use request_tracker::{PendingRequest, RequestContext, RequestKind, RequestTracker};
pub use services::{ChainSvc, ChainSvcRequest, ChainSvcResponse, MessageSink, SendRequest};
pub use sync_processor::{BlockHashOutcome, SyncError, SyncProcessor};

/// An identifier for a peer connection.
///
/// Anything cheap to copy that can key a map and name the peer in logs will
/// do, the engine attaches no meaning to it beyond identity.
pub trait PeerId: Copy + Eq + Hash + Display + Send + 'static {}

impl<A: Copy + Eq + Hash + Display + Send + 'static> PeerId for A {}
