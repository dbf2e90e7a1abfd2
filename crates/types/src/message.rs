use msgpacker::MsgPacker;
use serde::{Deserialize, Serialize};

use crate::{Hash, PeerId};

/// 0-based index of a piece within a shared file.
pub type PieceIndex = u64;

/// One frame of the wire protocol.
///
/// The core message-handler dispatch (see `tessera-core`) only interprets
/// [`Message::PieceRequest`] and [`Message::PieceResponse`]; [`Message::Handshake`]
/// is consumed by the transport layer before a peer session is ever handed to
/// the exchanger. The enum is kept open-ended so new kinds can be added
/// without the exchanger itself changing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, MsgPacker)]
pub enum Message {
    /// Sent once, in both directions, immediately after a connection is
    /// established. Carries the sender's peer id and, optionally, the hash
    /// of the file it currently cares about (its active download, if any).
    Handshake {
        /// Identifier of the sending peer.
        peer_id: PeerId,
        /// The file hash the sender is currently downloading, if any.
        file_hash: Option<Hash>,
    },

    /// Requests the piece at `index` from the remote peer.
    PieceRequest {
        /// Index of the requested piece.
        index: PieceIndex,
    },

    /// Replies to a [`Message::PieceRequest`] with the piece's bytes and the
    /// Merkle proof needed to verify them against the file's root hash.
    PieceResponse {
        /// Index of the returned piece.
        index: PieceIndex,
        /// Raw piece bytes.
        bytes: Vec<u8>,
        /// Hash of `bytes`, i.e. the leaf value being proven.
        leaf_hash: Hash,
        /// Sibling hashes from the leaf up to the root, in order.
        path: Vec<Hash>,
    },
}

impl Message {
    /// Short tag used for logging; avoids printing full piece payloads.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "handshake",
            Message::PieceRequest { .. } => "piece-request",
            Message::PieceResponse { .. } => "piece-response",
        }
    }
}
