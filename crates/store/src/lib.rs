//! Durable and in-memory adapters for the hash-tree repository and piece store ports defined
//! in `tessera-core`.

mod memory;
mod piece_store;
mod repository;
mod sled_backend;

pub use memory::MemoryBackend;
pub use piece_store::{FilePieceStore, DEFAULT_PIECE_SIZE};
pub use repository::DataBackendHashTreeRepository;
pub use sled_backend::SledBackend;
