use async_trait::async_trait;
use tessera_merkle::MerkleTree;
use tessera_types::{Hash, Hasher};

/// Durable storage for Merkle trees, keyed by their root hash (C3, ambient-but-contracted).
///
/// The core only needs `create_or_replace`/`load`; see `tessera-store` for the concrete,
/// embedded-database-backed implementation.
#[async_trait]
pub trait HashTreeRepository<H: Hasher>: Send + Sync {
    /// Atomically persists `tree`, keyed by its root hash. Concurrent calls for the same key
    /// serialize; the last writer wins.
    async fn create_or_replace(&self, tree: &MerkleTree<H>) -> anyhow::Result<()>;

    /// Loads the tree persisted under `root_hash`, if any.
    async fn load(&self, root_hash: &Hash) -> anyhow::Result<Option<MerkleTree<H>>>;
}
