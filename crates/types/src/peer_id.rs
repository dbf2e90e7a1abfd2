use core::fmt;

use msgpacker::MsgPacker;
use rand::RngCore as _;
use serde::{Deserialize, Serialize};

/// Byte width of a [`PeerId`]; 128 bits is enough entropy for uniqueness
/// within a reasonable horizon without requiring coordination.
pub const PEER_ID_LEN: usize = 16;

/// A randomly generated identifier for one node in the swarm.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, MsgPacker)]
pub struct PeerId([u8; PEER_ID_LEN]);

impl PeerId {
    /// Generates a fresh, random peer id.
    pub fn random() -> Self {
        let mut bytes = [0u8; PEER_ID_LEN];

        rand::rng().fill_bytes(&mut bytes);

        Self(bytes)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", hex::encode(self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
