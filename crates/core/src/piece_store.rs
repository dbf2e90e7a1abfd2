use async_trait::async_trait;
use tessera_types::{Hash, PieceIndex};

/// Disk I/O for the piece bytes themselves, addressed by `(file hash, piece index)` (C9,
/// ambient-but-contracted).
///
/// Kept out of the Merkle commitment entirely: the tree only ever sees piece *hashes*. See
/// `tessera-store` for the concrete fixed-size-file-backed implementation.
#[async_trait]
pub trait PieceStore: Send + Sync {
    /// Reads the bytes of piece `index` of `file_hash`, if this node holds it.
    async fn read_piece(&self, file_hash: &Hash, index: PieceIndex) -> anyhow::Result<Option<Vec<u8>>>;

    /// Writes the bytes of piece `index` of `file_hash`.
    async fn write_piece(&self, file_hash: &Hash, index: PieceIndex, bytes: &[u8]) -> anyhow::Result<()>;
}
