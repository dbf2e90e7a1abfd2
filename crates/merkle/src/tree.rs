use core::marker::PhantomData;

use tessera_types::{Hash, Hasher};

use crate::layout::{self, decompose};

/// Which array a buffered write during [`MerkleTree::try_add`] targets.
#[derive(Debug, Clone, Copy)]
enum Target {
    Subtree(usize),
    Root,
}

/// The two-level Merkle commitment over a shared file's pieces.
///
/// `N` pieces are partitioned, MSB-first, into one complete subtree per set bit of `N`
/// (see [`layout`]); the subtree roots are then combined by a root tree built with the
/// exact same level-order layout, which is what lets the tree tolerate any `N` without
/// requiring it to be a power of two.
#[derive(Clone)]
pub struct MerkleTree<H: Hasher> {
    n: u64,
    leaf_counts: Vec<u64>,
    /// One array per set bit of `n`, level-order, leaves at the top half.
    trees: Vec<Vec<Hash>>,
    /// Combines the per-subtree roots; level-order, leaves at the top half.
    root_tree: Vec<Hash>,
    /// One hash per piece; [`Hash::EMPTY`] until the piece is verified-and-added.
    pieces: Vec<Hash>,
    root_hash: Hash,
    hasher: PhantomData<H>,
}

impl<H: Hasher> MerkleTree<H> {
    /// Creates a tree for a known `root_hash` and piece count, with every piece slot empty.
    ///
    /// This is the downloader-side constructor: nothing is held locally yet, but the
    /// commitment being verified against is already known.
    pub fn new_empty(root_hash: Hash, n: u64) -> Self {
        assert!(n >= 1, "a shared file must have at least one piece");

        Self::from_pieces(n, root_hash, vec![Hash::EMPTY; n as usize])
    }

    /// Builds a tree from a complete array of piece hashes, computing and fixing the root.
    ///
    /// This is the seeder-side constructor: every piece is already held, so the full
    /// commitment can be derived.
    pub fn build(piece_hashes: &[Hash]) -> Self {
        assert!(!piece_hashes.is_empty(), "a shared file must have at least one piece");

        let n = piece_hashes.len() as u64;
        let mut tree = Self::from_pieces(n, Hash::EMPTY, piece_hashes.to_vec());

        tree.root_hash = tree.computed_root();
        tree
    }

    /// Rebuilds the subtree/root-tree scaffolding from a (possibly partial) pieces array
    /// and an externally known root hash.
    ///
    /// Used by the hash-tree repository to reload persisted state: only `n`, `root_hash`,
    /// and `pieces` are durable; the scaffolding is a pure function of them.
    pub fn from_pieces(n: u64, root_hash: Hash, pieces: Vec<Hash>) -> Self {
        assert_eq!(pieces.len() as u64, n, "pieces array must have exactly n entries");

        let leaf_counts = decompose(n);
        let mut base = 0usize;
        let trees = leaf_counts
            .iter()
            .map(|&count| {
                let leaves = &pieces[base..base + count as usize];
                base += count as usize;
                build_array::<H>(leaves)
            })
            .collect::<Vec<_>>();

        let subtree_roots = trees.iter().map(|t| t[0]).collect::<Vec<_>>();
        let root_tree = build_array::<H>(&subtree_roots);

        Self {
            n,
            leaf_counts,
            trees,
            root_tree,
            pieces,
            root_hash,
            hasher: PhantomData,
        }
    }

    /// The number of pieces this tree commits to.
    pub fn len(&self) -> u64 {
        self.n
    }

    /// The published commitment.
    pub fn root_hash(&self) -> Hash {
        self.root_hash
    }

    /// Bit `i` is set iff piece `i` has been verified-and-added locally.
    pub fn get_leaf_states(&self) -> Vec<bool> {
        self.pieces.iter().map(|h| !h.is_empty()).collect()
    }

    /// Returns the hash held for piece `i`, or [`Hash::EMPTY`] if not yet added.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`; out-of-range access is a caller contract violation.
    pub fn get_piece_hash(&self, i: u64) -> Hash {
        self.pieces[i as usize]
    }

    /// The full piece-hash array, `n` entries long, [`Hash::EMPTY`] where not yet added.
    ///
    /// This plus [`Self::root_hash`] and [`Self::len`] is everything [`Self::from_pieces`]
    /// needs to reconstruct the tree, which is what a hash-tree repository persists.
    pub fn pieces(&self) -> &[Hash] {
        &self.pieces
    }

    /// Returns the sibling hashes from leaf `i` up to the root, in order.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    pub fn get_path(&self, i: u64) -> Vec<Hash> {
        assert!(i < self.n, "piece index {i} out of range for {} pieces", self.n);

        let (k, offset) = layout::locate(&self.leaf_counts, i);
        let mut path = Vec::new();

        let mut idx = layout::leaf_slot(self.leaf_counts[k], offset);
        while let Some(p) = layout::parent(idx) {
            path.push(self.trees[k][layout::sibling(idx)]);
            idx = p;
        }

        if self.root_tree.len() > 1 {
            let mut ridx = layout::leaf_slot(self.leaf_counts.len() as u64, k as u64);
            while let Some(p) = layout::parent(ridx) {
                path.push(self.root_tree[layout::sibling(ridx)]);
                ridx = p;
            }
        }

        path
    }

    /// Verifies that `item_hash` combined in order with `path` reproduces [`Self::root_hash`]
    /// and, if so, commits `item_hash` into piece `i` and caches every internal node the
    /// verification walk touched.
    ///
    /// Verification and mutation are atomic: on failure (wrong path length or root mismatch)
    /// no storage slot is touched.
    ///
    /// # Panics
    /// Panics if `i >= self.len()`.
    pub fn try_add(&mut self, i: u64, item_hash: Hash, path: &[Hash]) -> bool {
        assert!(i < self.n, "piece index {i} out of range for {} pieces", self.n);

        let (k, offset) = layout::locate(&self.leaf_counts, i);
        let mut pending = Vec::new();
        let mut pos = 0usize;

        let recomputed = match fold_path::<H>(
            &self.leaf_counts,
            k,
            layout::leaf_slot(self.leaf_counts[k], offset),
            item_hash,
            path,
            &mut pos,
            &mut pending,
        ) {
            Some(hash) => hash,
            None => return false,
        };

        if pos != path.len() || recomputed != self.root_hash {
            return false;
        }

        for (target, idx, hash) in pending {
            match target {
                Target::Subtree(k) => self.trees[k][idx] = hash,
                Target::Root => self.root_tree[idx] = hash,
            }
        }

        self.pieces[i as usize] = item_hash;

        true
    }

    fn computed_root(&self) -> Hash {
        if self.root_tree.is_empty() {
            // n == 0 is rejected by the constructors; kept only as a defensive fallback.
            Hash::EMPTY
        } else {
            self.root_tree[0]
        }
    }
}

/// Builds a level-order array tree over `leaves`, computing every internal node bottom-up.
///
/// Works for any non-zero `leaves.len()`, not just powers of two: the "leaves at the top
/// half" layout is a valid binary tree regardless of leaf count (see [`layout`]).
fn build_array<H: Hasher>(leaves: &[Hash]) -> Vec<Hash> {
    let count = leaves.len();
    assert!(count >= 1);

    let mut array = vec![Hash::EMPTY; 2 * count - 1];
    array[count - 1..].copy_from_slice(leaves);

    for idx in (0..count - 1).rev() {
        let left = array[2 * idx + 1];
        let right = array[2 * idx + 2];
        array[idx] = left.concat::<H>(&right);
    }

    array
}

/// Walks from `start_idx` (a subtree leaf) up through the subtree and then the root tree,
/// consuming one path element per level and buffering every node the walk touches.
///
/// Returns `None` as soon as `path` is exhausted before reaching the overall root, which the
/// caller treats as a verification failure (wrong path length).
#[allow(clippy::too_many_arguments)]
fn fold_path<H: Hasher>(
    leaf_counts: &[u64],
    k: usize,
    mut idx: usize,
    mut current: Hash,
    path: &[Hash],
    pos: &mut usize,
    pending: &mut Vec<(Target, usize, Hash)>,
) -> Option<Hash> {
    while let Some(p) = layout::parent(idx) {
        let sibling_hash = *path.get(*pos)?;
        *pos += 1;

        let sibling_idx = layout::sibling(idx);
        let (left, right) = if layout::is_left_child(idx) {
            (current, sibling_hash)
        } else {
            (sibling_hash, current)
        };

        pending.push((Target::Subtree(k), idx, current));
        pending.push((Target::Subtree(k), sibling_idx, sibling_hash));

        current = left.concat::<H>(&right);
        idx = p;
        pending.push((Target::Subtree(k), idx, current));
    }

    if leaf_counts.len() <= 1 {
        return Some(current);
    }

    let mut ridx = layout::leaf_slot(leaf_counts.len() as u64, k as u64);

    while let Some(p) = layout::parent(ridx) {
        let sibling_hash = *path.get(*pos)?;
        *pos += 1;

        let sibling_idx = layout::sibling(ridx);
        let (left, right) = if layout::is_left_child(ridx) {
            (current, sibling_hash)
        } else {
            (sibling_hash, current)
        };

        pending.push((Target::Root, ridx, current));
        pending.push((Target::Root, sibling_idx, sibling_hash));

        current = left.concat::<H>(&right);
        ridx = p;
        pending.push((Target::Root, ridx, current));
    }

    Some(current)
}
