use async_trait::async_trait;
use msgpacker::{MsgPacker, Packable as _, Unpackable as _};
use tessera_core::HashTreeRepository;
use tessera_merkle::MerkleTree;
use tessera_types::{DataBackend, Hash, Hasher};

const PREFIX: &[u8] = b"hash-tree";

/// The on-disk form of a [`MerkleTree`]: everything [`MerkleTree::from_pieces`] needs to
/// reconstruct the scaffolding, nothing derivable.
#[derive(MsgPacker)]
struct PersistedTree {
    n: u64,
    root_hash: Hash,
    pieces: Vec<Hash>,
}

/// A [`HashTreeRepository`] backed by any [`DataBackend`], keyed by root hash.
///
/// Generic over the backend so the same code runs against [`crate::MemoryBackend`] in tests
/// and [`crate::SledBackend`] in production, mirroring how the core crate is written
/// against the `HashTreeRepository` trait rather than a concrete store.
pub struct DataBackendHashTreeRepository<D> {
    backend: D,
}

impl<D: DataBackend> DataBackendHashTreeRepository<D> {
    /// Wraps `backend` as a hash-tree repository.
    pub fn new(backend: D) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<H, D> HashTreeRepository<H> for DataBackendHashTreeRepository<D>
where
    H: Hasher + Send + Sync + 'static,
    D: DataBackend,
{
    async fn create_or_replace(&self, tree: &MerkleTree<H>) -> anyhow::Result<()> {
        let record = PersistedTree {
            n: tree.len(),
            root_hash: tree.root_hash(),
            pieces: tree.pieces().to_vec(),
        };

        let key = tree.root_hash();

        self.backend.set(PREFIX, key.as_ref(), &record.pack_to_vec())?;

        Ok(())
    }

    async fn load(&self, root_hash: &Hash) -> anyhow::Result<Option<MerkleTree<H>>> {
        let Some(bytes) = self.backend.get(PREFIX, root_hash.as_ref())? else {
            return Ok(None);
        };

        let (_, record) = PersistedTree::unpack(&bytes)?;
        let tree = MerkleTree::from_pieces(record.n, record.root_hash, record.pieces);

        Ok(Some(tree))
    }
}

#[cfg(test)]
mod tests {
    use tessera_types::Blake3Hasher;

    use super::*;
    use crate::MemoryBackend;

    #[tokio::test]
    async fn a_persisted_tree_reloads_with_the_same_root_and_leaf_states() -> anyhow::Result<()> {
        let pieces = [b"alpha".to_vec(), b"bravo".to_vec(), b"charlie".to_vec()];
        let hashes = pieces.iter().map(|p| Blake3Hasher::hash(p)).collect::<Vec<_>>();
        let tree = MerkleTree::<Blake3Hasher>::build(&hashes);

        let repository = DataBackendHashTreeRepository::new(MemoryBackend::default());

        repository.create_or_replace(&tree).await?;

        let reloaded: MerkleTree<Blake3Hasher> = repository.load(&tree.root_hash()).await?.expect("tree was just persisted");

        assert_eq!(reloaded.root_hash(), tree.root_hash());
        assert_eq!(reloaded.get_leaf_states(), tree.get_leaf_states());

        Ok(())
    }

    #[tokio::test]
    async fn loading_an_unknown_root_returns_none() -> anyhow::Result<()> {
        let repository = DataBackendHashTreeRepository::new(MemoryBackend::default());
        let result: Option<MerkleTree<Blake3Hasher>> = repository.load(&Hash::EMPTY).await?;

        assert!(result.is_none());

        Ok(())
    }
}
