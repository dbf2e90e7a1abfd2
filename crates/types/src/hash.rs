use core::fmt;

use msgpacker::MsgPacker;
use serde::{Deserialize, Serialize};

/// Byte width of a [`Hash`], fixed by the underlying hash function.
pub const HASH_LEN: usize = 32;

/// A fixed-width opaque digest used throughout the piece commitment.
///
/// The all-zero value is the *empty* sentinel: it marks a piece slot or tree
/// node that has not been populated yet and is never a valid output of
/// [`Hasher::hash`] or [`Hasher::merge`] under normal operation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, MsgPacker)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// The empty sentinel: all zero bytes.
    pub const EMPTY: Hash = Hash([0u8; HASH_LEN]);

    /// Wraps a raw digest.
    pub const fn new(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the underlying bytes.
    pub const fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns `true` if this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Computes `H(self‖other)` under the provided hasher, combining two sibling
    /// nodes into their parent.
    pub fn concat<H: Hasher>(&self, other: &Hash) -> Hash {
        H::merge(self, other)
    }

    /// Decodes a hex string into a hash.
    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; HASH_LEN] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("hash must be {HASH_LEN} bytes"))?;

        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A hash function usable to build and verify the piece commitment.
///
/// Implementations must never let [`Hash::EMPTY`] arise as the output of
/// [`Self::hash`] or [`Self::merge`] on real input; if that were possible an
/// attacker could forge an "unset" leaf as a valid piece.
pub trait Hasher: Clone {
    /// Hashes a single buffer of data into a leaf digest.
    fn hash(data: &[u8]) -> Hash;

    /// Merges two child digests into their parent digest.
    ///
    /// This is the operation backing [`Hash::concat`].
    fn merge(a: &Hash, b: &Hash) -> Hash;
}

#[cfg(feature = "blake3")]
pub use blake3_hasher::Blake3Hasher;

#[cfg(feature = "blake3")]
mod blake3_hasher {
    use super::*;

    /// The default [`Hasher`] implementation, backed by BLAKE3.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Blake3Hasher;

    impl Blake3Hasher {
        /// Domain prefix for leaf (piece) hashes.
        pub const LEAF_PREFIX: &'static [u8] = &[0x00];

        /// Domain prefix for internal (merged) node hashes.
        pub const NODE_PREFIX: &'static [u8] = &[0x01];
    }

    impl Hasher for Blake3Hasher {
        fn hash(data: &[u8]) -> Hash {
            let digest = ::blake3::Hasher::new()
                .update(Self::LEAF_PREFIX)
                .update(data)
                .finalize();

            Hash(*digest.as_bytes())
        }

        fn merge(a: &Hash, b: &Hash) -> Hash {
            let digest = ::blake3::Hasher::new()
                .update(Self::NODE_PREFIX)
                .update(a.as_ref())
                .update(b.as_ref())
                .finalize();

            Hash(*digest.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_distinct_from_hashed_empty_input() {
        let hashed_empty = Blake3Hasher::hash(&[]);

        assert_ne!(hashed_empty, Hash::EMPTY);
    }

    #[test]
    fn merge_is_order_sensitive() {
        let a = Blake3Hasher::hash(b"a");
        let b = Blake3Hasher::hash(b"b");

        assert_ne!(a.concat::<Blake3Hasher>(&b), b.concat::<Blake3Hasher>(&a));
    }

    #[test]
    fn hex_round_trips() {
        let h = Blake3Hasher::hash(b"piece");
        let s = h.to_string();

        assert_eq!(Hash::from_hex(&s).unwrap(), h);
    }
}
