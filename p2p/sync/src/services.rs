//! The tower [`Service`](tower::Service) seams the sync engine drives.
//!
//! The engine never talks to the chain database or the network directly, it
//! goes through these request/response contracts. The embedding node decides
//! what actually sits behind them.

use galena_wire::{BlockHash, Message};

/// The request type for the chain service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSvcRequest {
    /// A request for our current cumulative difficulty.
    CumulativeDifficulty,
    /// A request for the height of our best block.
    BestBlockNumber,
    /// A request to check if our chain has `hash` at `height`.
    BlockKnownAtHeight {
        height: u64,
        hash: BlockHash,
    },
}

/// The response type for the chain service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSvcResponse {
    /// The response for [`ChainSvcRequest::CumulativeDifficulty`].
    CumulativeDifficulty(u128),
    /// The response for [`ChainSvcRequest::BestBlockNumber`].
    BestBlockNumber(u64),
    /// The response for [`ChainSvcRequest::BlockKnownAtHeight`].
    BlockKnownAtHeight(bool),
}

/// A request to deliver `message` to `peer`.
///
/// Delivery is best effort, the transport gives no confirmation beyond
/// accepting the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest<A> {
    pub peer: A,
    pub message: Message,
}

// Below here is just helper traits, so we don't have to type out tower::Service
// bounds everywhere but still get to use tower.

pub trait ChainSvc:
    tower::Service<
        ChainSvcRequest,
        Response = ChainSvcResponse,
        Error = tower::BoxError,
        Future: Send + 'static,
    > + Send
    + 'static
{
}

impl<T> ChainSvc for T where
    T: tower::Service<
            ChainSvcRequest,
            Response = ChainSvcResponse,
            Error = tower::BoxError,
            Future: Send + 'static,
        > + Send
        + 'static
{
}

pub trait MessageSink<A>:
    tower::Service<SendRequest<A>, Response = (), Error = tower::BoxError, Future: Send + 'static>
    + Send
    + 'static
{
}

impl<T, A> MessageSink<A> for T where
    T: tower::Service<
            SendRequest<A>,
            Response = (),
            Error = tower::BoxError,
            Future: Send + 'static,
        > + Send
        + 'static
{
}
