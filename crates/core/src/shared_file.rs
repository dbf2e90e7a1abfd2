use parking_lot::Mutex;
use tessera_merkle::MerkleTree;
use tessera_types::{Hash, Hasher};

/// The identity of a file shared over the swarm: its root hash and the Merkle commitment
/// that verifies individual pieces against it.
///
/// A [`SharedFile`] is owned by one peer session for the session's lifetime and is the unit
/// the hash-tree repository persists, keyed by [`SharedFile::hash`].
pub struct SharedFile<H: Hasher> {
    /// The root hash of the committed file; also its identity.
    pub hash: Hash,
    hash_tree: Mutex<MerkleTree<H>>,
}

impl<H: Hasher> SharedFile<H> {
    /// Wraps an existing tree as a shared file. `hash` and `tree.root_hash()` must agree.
    pub fn new(hash: Hash, tree: MerkleTree<H>) -> Self {
        debug_assert_eq!(hash, tree.root_hash(), "shared file hash must match its tree's root");

        Self {
            hash,
            hash_tree: Mutex::new(tree),
        }
    }

    /// Creates a seeder-side shared file from a complete set of piece hashes.
    pub fn from_pieces(piece_hashes: &[Hash]) -> Self {
        let tree = MerkleTree::build(piece_hashes);
        let hash = tree.root_hash();

        Self::new(hash, tree)
    }

    /// Creates a downloader-side shared file: the root is known, but no piece is held yet.
    pub fn empty(hash: Hash, piece_count: u64) -> Self {
        Self::new(hash, MerkleTree::new_empty(hash, piece_count))
    }

    /// Locks the hash tree for the duration of `f`.
    ///
    /// The tree is owned by exactly one peer session at a time (see the concurrency model
    /// in the design), but within a download session the receive task (verifying incoming
    /// pieces) and the send task (reading leaf states once) touch it independently, so it is
    /// still guarded by a lock rather than accessed by unique reference.
    pub fn with_tree<R>(&self, f: impl FnOnce(&mut MerkleTree<H>) -> R) -> R {
        f(&mut self.hash_tree.lock())
    }

    /// Takes a snapshot of the current tree, e.g. to hand to the hash-tree repository.
    pub fn snapshot(&self) -> MerkleTree<H>
    where
        MerkleTree<H>: Clone,
    {
        self.hash_tree.lock().clone()
    }
}
