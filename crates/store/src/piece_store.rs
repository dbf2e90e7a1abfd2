use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tessera_core::PieceStore;
use tessera_types::{Hash, PieceIndex};

/// Default slot size backing [`FilePieceStore`], chosen to comfortably hold the piece sizes
/// the hash-tree layer is exercised with; callers needing a different size construct the
/// store directly with [`FilePieceStore::with_piece_size`].
pub const DEFAULT_PIECE_SIZE: usize = 1 << 16;

/// Disk I/O for piece bytes, one fixed-stride file per shared file identity.
///
/// Each piece occupies a fixed-size slot at offset `index * slot_size`; a 4-byte
/// little-endian length prefix precedes the piece bytes within the slot so the final,
/// possibly-shorter piece of a file can still be read back exactly.
pub struct FilePieceStore {
    root_dir: PathBuf,
    piece_size: usize,
}

impl FilePieceStore {
    /// A store rooted at `root_dir` using [`DEFAULT_PIECE_SIZE`] slots.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_piece_size(root_dir, DEFAULT_PIECE_SIZE)
    }

    /// A store rooted at `root_dir` using `piece_size`-sized slots.
    pub fn with_piece_size(root_dir: impl Into<PathBuf>, piece_size: usize) -> Self {
        Self {
            root_dir: root_dir.into(),
            piece_size,
        }
    }

    fn slot_stride(&self) -> u64 {
        (self.piece_size + 4) as u64
    }

    fn path_for(&self, file_hash: &Hash) -> PathBuf {
        self.root_dir.join(file_hash.to_string())
    }
}

fn read_piece_at(path: &Path, offset: u64, piece_size: usize) -> anyhow::Result<Option<Vec<u8>>> {
    let Ok(mut file) = std::fs::File::open(path) else {
        return Ok(None);
    };

    if file.seek(SeekFrom::Start(offset)).is_err() {
        return Ok(None);
    }

    let mut len_buf = [0u8; 4];
    if file.read_exact(&mut len_buf).is_err() {
        return Ok(None);
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > piece_size {
        anyhow::bail!("corrupt piece store: slot at offset {offset} claims length {len}");
    }

    let mut bytes = vec![0u8; len];
    file.read_exact(&mut bytes)?;

    Ok(Some(bytes))
}

fn write_piece_at(path: &Path, offset: u64, piece_size: usize, bytes: &[u8]) -> anyhow::Result<()> {
    anyhow::ensure!(bytes.len() <= piece_size, "piece of {} bytes exceeds the {piece_size}-byte slot size", bytes.len());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new().create(true).write(true).read(true).open(path)?;

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&(bytes.len() as u32).to_le_bytes())?;
    file.write_all(bytes)?;

    Ok(())
}

#[async_trait]
impl PieceStore for FilePieceStore {
    async fn read_piece(&self, file_hash: &Hash, index: PieceIndex) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(file_hash);
        let offset = index * self.slot_stride();
        let piece_size = self.piece_size;

        tokio::task::spawn_blocking(move || read_piece_at(&path, offset, piece_size)).await?
    }

    async fn write_piece(&self, file_hash: &Hash, index: PieceIndex, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(file_hash);
        let offset = index * self.slot_stride();
        let piece_size = self.piece_size;
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || write_piece_at(&path, offset, piece_size, &bytes)).await?
    }
}

#[cfg(test)]
mod tests {
    use tessera_types::Hash;

    use super::*;

    #[tokio::test]
    async fn a_written_piece_reads_back_exactly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilePieceStore::with_piece_size(dir.path(), 8);
        let file_hash = Hash::from_hex("ab".repeat(32).as_str())?;

        store.write_piece(&file_hash, 0, b"full8bb!").await?;
        store.write_piece(&file_hash, 1, b"short").await?;

        assert_eq!(store.read_piece(&file_hash, 0).await?.unwrap(), b"full8bb!".to_vec());
        assert_eq!(store.read_piece(&file_hash, 1).await?.unwrap(), b"short".to_vec());

        Ok(())
    }

    #[tokio::test]
    async fn an_unwritten_piece_reads_as_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FilePieceStore::with_piece_size(dir.path(), 8);
        let file_hash = Hash::from_hex("cd".repeat(32).as_str())?;

        assert!(store.read_piece(&file_hash, 0).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn oversized_pieces_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePieceStore::with_piece_size(dir.path(), 4);
        let file_hash = Hash::from_hex(&"ef".repeat(32)).unwrap();

        assert!(store.write_piece(&file_hash, 0, b"way too long").await.is_err());
    }
}
