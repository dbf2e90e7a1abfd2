//! The piece exchanger: message handler dispatch, concurrent session orchestration, and the
//! trait ports (transport, repository, piece store) the exchanger runs against.
//!
//! Concrete adapters live in `tessera-net` (transport) and `tessera-store` (repository,
//! piece store); this crate only depends on their trait interfaces.

mod exchanger;
mod handler;
mod repository;
mod shared_file;
mod transport;

pub mod piece_store;

#[cfg(feature = "mocks")]
pub mod mocks;

pub use exchanger::Exchanger;
pub use handler::{Handler, HandlerOutcome, HandlerResolver, PieceRequestHandler, PieceResponseHandler};
pub use piece_store::PieceStore;
pub use repository::HashTreeRepository;
pub use shared_file::SharedFile;
pub use transport::{Connector, Context, Peer, Server};
