//! # Galena Wire
//!
//! This crate defines the [`Message`] enum which contains every message of
//! the galena block-sync protocol, together with the per-message payload
//! types.
//!
//! Encoding and decoding of these messages is owned by the transport layer,
//! this crate only defines the shapes that the sync engine routes on.

use std::fmt::{Display, Formatter};

/// A block hash.
pub type BlockHash = [u8; 32];

/// The discriminator for a [`Message`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MessageType {
    Status,
    SkeletonRequest,
    SkeletonResponse,
    BlockHashRequest,
    BlockHashResponse,
}

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Status => "status",
            Self::SkeletonRequest => "skeleton request",
            Self::SkeletonResponse => "skeleton response",
            Self::BlockHashRequest => "block hash request",
            Self::BlockHashResponse => "block hash response",
        })
    }
}

/// A peer's announcement of its current chain tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The height of the peer's best block.
    pub best_block_number: u64,
    /// The hash of the peer's best block.
    pub best_block_hash: BlockHash,
    /// The hash of the best block's parent.
    pub parent_hash: BlockHash,
    /// The total difficulty of the peer's chain.
    pub total_difficulty: u128,
}

/// A request for a sparse sequence of block identifiers starting at a height.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SkeletonRequest {
    /// The correlation id of this request, never `0`.
    pub id: u64,
    /// The height the skeleton should start at.
    pub start_number: u64,
}

/// A block hash paired with the height it was found at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockIdentifier {
    pub hash: BlockHash,
    pub number: u64,
}

/// The response to a [`SkeletonRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkeletonResponse {
    /// The id of the request this answers.
    pub id: u64,
    /// The skeleton, a sparse run of block identifiers.
    pub block_identifiers: Vec<BlockIdentifier>,
}

/// A request for the hash of the block at a given height.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockHashRequest {
    /// The correlation id of this request, never `0`.
    pub id: u64,
    /// The height to resolve.
    pub height: u64,
}

/// The response to a [`BlockHashRequest`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockHashResponse {
    /// The id of the request this answers.
    pub id: u64,
    /// The hash of the peer's block at the requested height.
    pub hash: BlockHash,
}

/// A message of the sync protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Status(Status),
    SkeletonRequest(SkeletonRequest),
    SkeletonResponse(SkeletonResponse),
    BlockHashRequest(BlockHashRequest),
    BlockHashResponse(BlockHashResponse),
}

impl Message {
    /// Returns the [`MessageType`] of this message.
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Status(_) => MessageType::Status,
            Self::SkeletonRequest(_) => MessageType::SkeletonRequest,
            Self::SkeletonResponse(_) => MessageType::SkeletonResponse,
            Self::BlockHashRequest(_) => MessageType::BlockHashRequest,
            Self::BlockHashResponse(_) => MessageType::BlockHashResponse,
        }
    }

    /// Returns the correlation id carried by this message.
    ///
    /// [`Status`] messages are unsolicited announcements and carry none.
    pub const fn request_id(&self) -> Option<u64> {
        match self {
            Self::Status(_) => None,
            Self::SkeletonRequest(m) => Some(m.id),
            Self::SkeletonResponse(m) => Some(m.id),
            Self::BlockHashRequest(m) => Some(m.id),
            Self::BlockHashResponse(m) => Some(m.id),
        }
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(m) => write!(
                f,
                "status, best block: {} ({})",
                m.best_block_number,
                hex::encode(m.best_block_hash)
            ),
            Self::SkeletonRequest(m) => {
                write!(f, "skeleton request, id: {}, start: {}", m.id, m.start_number)
            }
            Self::SkeletonResponse(m) => write!(
                f,
                "skeleton response, id: {}, identifiers: {}",
                m.id,
                m.block_identifiers.len()
            ),
            Self::BlockHashRequest(m) => {
                write!(f, "block hash request, id: {}, height: {}", m.id, m.height)
            }
            Self::BlockHashResponse(m) => write!(
                f,
                "block hash response, id: {}, hash: {}",
                m.id,
                hex::encode(m.hash)
            ),
        }
    }
}

impl From<Status> for Message {
    fn from(value: Status) -> Self {
        Self::Status(value)
    }
}

impl From<SkeletonRequest> for Message {
    fn from(value: SkeletonRequest) -> Self {
        Self::SkeletonRequest(value)
    }
}

impl From<SkeletonResponse> for Message {
    fn from(value: SkeletonResponse) -> Self {
        Self::SkeletonResponse(value)
    }
}

impl From<BlockHashRequest> for Message {
    fn from(value: BlockHashRequest) -> Self {
        Self::BlockHashRequest(value)
    }
}

impl From<BlockHashResponse> for Message {
    fn from(value: BlockHashResponse) -> Self {
        Self::BlockHashResponse(value)
    }
}
