//! The two-level Merkle piece commitment (C2 in the design).
//!
//! [`MerkleTree`] commits to the `N` pieces of a shared file so that a single piece can be
//! verified against the published root given only a sibling path, without holding any other
//! piece. See [`layout`] for the index arithmetic that makes the commitment tolerate piece
//! counts that are not a power of two.

pub mod layout;
mod tree;

pub use tree::MerkleTree;
